pub mod analysis;
pub mod blocks;
pub mod circuit;
pub mod cli;
pub mod device;
pub mod devices;
pub mod error;
pub mod hierarchy;
pub mod netlist;
pub mod rawfile;
pub mod resolver;
pub mod results;
pub mod runner;
pub mod simulator;
pub mod units;

// Re-export commonly used types
pub use analysis::Analysis;
pub use circuit::{Block, Component, Connection, Endpoint, Wire};
pub use device::{Device, Template};
pub use error::{Error, Result};
pub use results::ResultTree;
pub use runner::NgspiceConfig;
pub use simulator::{simulate, Compiled, OutputFormat, Simulation, Simulator, SimulatorConfig};
pub use units::{Amps, Farads, Hertz, Ohms, Seconds, Unit, Value, Volts};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
