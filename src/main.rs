use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use log::{error, info};
use std::fs;

use blockspice::cli::{CliArgs, Demo};
use blockspice::simulator::{Simulator, SimulatorConfig};
use blockspice::runner::NgspiceConfig;

fn main() {
    let matches = create_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run_application(&matches) {
        error!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn create_cli() -> Command {
    Command::new("blockspice")
        .version(blockspice::VERSION)
        .about(blockspice::DESCRIPTION)
        .arg(
            Arg::new("circuit")
                .help("Built-in circuit to simulate")
                .required(true)
                .value_parser(Demo::NAMES)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for simulation results"),
        )
        .arg(
            Arg::new("tran")
                .long("tran")
                .value_names(["TSTEP", "TSTOP"])
                .num_args(2)
                .help("Transient analysis: time step and stop time"),
        )
        .arg(
            Arg::new("netlist")
                .long("netlist")
                .action(ArgAction::SetTrue)
                .help("Print the generated SPICE program and exit"),
        )
        .arg(
            Arg::new("rawfile")
                .long("rawfile")
                .value_name("FILE")
                .help("Project a saved ngspice output instead of running ngspice"),
        )
        .arg(
            Arg::new("ngspice")
                .long("ngspice")
                .value_name("PATH")
                .help("ngspice executable (default: $BLOCKSPICE_NGSPICE or ngspice)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase verbosity level"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"])
                .help("Output format"),
        )
}

fn run_application(matches: &ArgMatches) -> anyhow::Result<()> {
    let args = CliArgs::from_matches(matches)?;

    info!("{}", "Starting blockspice".green().bold());
    info!("Circuit: {}", format!("{:?}", args.circuit).bright_blue());

    let mut ngspice = NgspiceConfig::from_env();
    if let Some(path) = &args.ngspice {
        ngspice.executable = path.clone();
    }
    let simulator = Simulator::with_config(SimulatorConfig {
        ngspice,
        ..SimulatorConfig::default()
    });

    let root = args.circuit.build()?;

    if args.print_netlist {
        let compiled = simulator.compile(&root)?;
        print!("{}", compiled.program(&args.analysis));
        return Ok(());
    }

    info!("Running {}", args.analysis);
    let simulation = match &args.rawfile {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            simulator.simulate_raw(&root, &args.analysis, text)?
        }
        None => simulator.simulate(&root, &args.analysis)?,
    };

    if let Some(output_file) = &args.output_file {
        simulation.export(output_file, args.output_format)?;
        info!("Results exported to: {}", output_file.bright_green());
    } else {
        simulation.print_summary();
    }

    info!("{}", "Simulation completed successfully!".green().bold());
    Ok(())
}
