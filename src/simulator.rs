use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::analysis::Analysis;
use crate::circuit::Component;
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::netlist::Netlist;
use crate::rawfile::{self, RawTable};
use crate::resolver::{resolve, NodeMap};
use crate::results::{project, ResultTree};
use crate::runner::{run_ngspice, NgspiceConfig};

/// Result export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::UnsupportedFormat(format!("output format `{}`", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub ngspice: NgspiceConfig,
    /// First line of every generated program.
    pub title: String,
    /// Key of the root component in instance names.
    pub root_name: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            ngspice: NgspiceConfig::default(),
            title: "autogen".to_string(),
            root_name: "top".to_string(),
        }
    }
}

/// A component tree after node resolution and netlist emission.
#[derive(Debug, Clone)]
pub struct Compiled<'a> {
    hierarchy: Hierarchy<'a>,
    nodes: NodeMap,
    netlist: Netlist,
    title: String,
}

impl<'a> Compiled<'a> {
    pub fn hierarchy(&self) -> &Hierarchy<'a> {
        &self.hierarchy
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Canonical node id of a dotted port path such as `D.R1.left`.
    pub fn node(&self, path: &str) -> Option<u32> {
        self.hierarchy
            .port_path(path)
            .and_then(|key| self.nodes.get(key))
    }

    /// The complete program for one analysis.
    pub fn program(&self, analysis: &Analysis) -> String {
        self.netlist.program(&self.title, analysis)
    }

    pub fn project(&self, table: &RawTable) -> ResultTree {
        project(&self.hierarchy, &self.nodes, &self.netlist.names, table)
    }
}

/// Everything produced by one simulate call.
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    /// Program sent to the simulator.
    pub spice: String,
    /// Raw simulator output.
    pub rawfile: String,
    pub table: RawTable,
    pub circuit: ResultTree,
}

impl Simulation {
    pub fn points(&self) -> usize {
        self.table.points()
    }

    /// Transient time axis; `None` for an operating point.
    pub fn time(&self) -> Option<&[f64]> {
        self.table.time()
    }

    /// Write the projected results to `path`.
    pub fn export<P: AsRef<Path>>(&self, path: P, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Csv => self.export_csv(path.as_ref()),
            OutputFormat::Json => self.export_json(path.as_ref()),
        }
    }

    fn export_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        let signals = self.circuit.signals();
        let time = self.time();

        let mut header: Vec<&str> = Vec::with_capacity(signals.len() + 1);
        if time.is_some() {
            header.push("time");
        }
        header.extend(signals.iter().map(|(name, _)| name.as_str()));
        writer.write_record(&header)?;

        for i in 0..self.points() {
            let mut record = Vec::with_capacity(header.len());
            if let Some(time) = time {
                record.push(time[i].to_string());
            }
            for (_, series) in &signals {
                record.push(series.get(i).map(f64::to_string).unwrap_or_default());
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        info!("Results exported to CSV: {}", path.display());
        Ok(())
    }

    fn export_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.circuit)?;
        info!("Results exported to JSON: {}", path.display());
        Ok(())
    }

    /// Print the final value of every device signal.
    pub fn print_summary(&self) {
        println!("\n=== Simulation Summary ===");
        println!("Number of points: {}", self.points());
        if let Some(time) = self.time() {
            if let Some(stop) = time.last() {
                println!("Stop time: {:.3e}s", stop);
            }
        }
        for (path, device) in self.circuit.devices() {
            let name = device.device_name.as_deref().unwrap_or_default();
            println!("\n{} ({}):", path, name);
            for (port, series) in &device.ports {
                if let Some(v) = series.last() {
                    println!("  V({}): {:.6}V", port, v);
                }
            }
            for (param, series) in &device.parameters {
                if let Some(v) = series.last() {
                    println!("  {}: {:.6e}", param, v);
                }
            }
        }
    }
}

/// Drives the compile, run, parse and project pipeline.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Default configuration with the simulator executable taken from the environment.
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig {
            ngspice: NgspiceConfig::from_env(),
            ..SimulatorConfig::default()
        })
    }

    pub fn with_config(config: SimulatorConfig) -> Self {
        Simulator { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Resolve nodes and render the netlist. No I/O.
    pub fn compile<'a>(&self, root: &'a Component) -> Result<Compiled<'a>> {
        let hierarchy = Hierarchy::elaborate(root);
        let nodes = resolve(&hierarchy)?;
        let netlist = Netlist::emit(&hierarchy, &nodes, &self.config.root_name)?;
        info!(
            "compiled {} devices onto {} nodes",
            netlist.names.len(),
            nodes.class_count()
        );
        Ok(Compiled {
            hierarchy,
            nodes,
            netlist,
            title: self.config.title.clone(),
        })
    }

    pub fn simulate(&self, root: &Component, analysis: &Analysis) -> Result<Simulation> {
        analysis.validate()?;
        let compiled = self.compile(root)?;
        let spice = compiled.program(analysis);
        debug!("program:\n{}", spice);

        info!("Running {} with {}", analysis, self.config.ngspice.executable);
        let start = Instant::now();
        let rawfile = run_ngspice(&spice, &self.config.ngspice)?;
        info!(
            "Simulator finished in {:.3}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        finish(&compiled, analysis, spice, rawfile)
    }

    /// Project an already captured simulator output instead of running the simulator.
    pub fn simulate_raw(
        &self,
        root: &Component,
        analysis: &Analysis,
        rawfile: String,
    ) -> Result<Simulation> {
        analysis.validate()?;
        let compiled = self.compile(root)?;
        let spice = compiled.program(analysis);
        finish(&compiled, analysis, spice, rawfile)
    }

    /// One independent simulation per value. Failures are returned per point, not aggregated.
    pub fn sweep<T, I, F>(&self, values: I, mut build: F, analysis: &Analysis) -> Vec<Result<Simulation>>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> Result<Component>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let result = build(value).and_then(|root| self.simulate(&root, analysis));
                if let Err(e) = &result {
                    warn!("sweep point {} failed: {}", i, e);
                }
                result
            })
            .collect()
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(
    compiled: &Compiled,
    analysis: &Analysis,
    spice: String,
    rawfile: String,
) -> Result<Simulation> {
    let table = rawfile::parse(&rawfile)?;
    if table.points() != analysis.nominal_points() {
        // ngspice may add breakpoints to a transient run.
        debug!(
            "{} points, {} nominal for {}",
            table.points(),
            analysis.nominal_points(),
            analysis
        );
    }
    let circuit = compiled.project(&table);
    Ok(Simulation {
        spice,
        rawfile,
        table,
        circuit,
    })
}

/// Simulate with the default configuration.
pub fn simulate(root: &Component, analysis: &Analysis) -> Result<Simulation> {
    Simulator::new().simulate(root, analysis)
}
