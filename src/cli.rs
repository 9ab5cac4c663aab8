use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::ArgMatches;

use crate::analysis::Analysis;
use crate::blocks::voltage_divider;
use crate::circuit::{Block, Component};
use crate::devices::{ac_voltage, capacitor, dc_voltage, mosfet, resistor};
use crate::simulator::OutputFormat;
use crate::units::{Farads, Hertz, Ohms, Volts};

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub circuit: Demo,
    pub output_file: Option<String>,
    pub analysis: Analysis,
    pub output_format: OutputFormat,
    pub print_netlist: bool,
    pub rawfile: Option<String>,
    pub ngspice: Option<String>,
    pub verbose_level: u8,
}

/// Built-in demonstration circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// 10V source across a 1:1 resistive divider.
    Divider,
    /// 5V source charging 1µF through 1Ω.
    Rc,
    /// MOSFET with its gate driven by a 2GHz sine.
    Fet,
}

impl Demo {
    pub const NAMES: [&'static str; 3] = ["divider", "rc", "fet"];

    pub fn build(&self) -> crate::Result<Component> {
        let block = match self {
            Demo::Divider => Block::builder()
                .port("out")
                .child("V", dc_voltage(Volts(10.0)))
                .child("D", voltage_divider(0.5)?)
                .connect("V.pos.to.D.in")
                .connect("D.out.to.out")
                .connect("V.neg.to.Ground")
                .build()?,
            Demo::Rc => Block::builder()
                .child("V", dc_voltage(Volts(5.0)))
                .child("R", resistor(Ohms(1.0)))
                .child("C", capacitor(Farads(1e-6)))
                .connect("V.pos.to.R.left")
                .connect("R.right.to.C.left")
                .connect("C.right.to.Ground")
                .connect("V.neg.to.Ground")
                .build()?,
            Demo::Fet => Block::builder()
                .child("V", dc_voltage(Volts(5.0)))
                .child("AC", ac_voltage(Volts(0.0), Volts(5.0), Hertz(2e9)))
                .child("T", mosfet())
                .connect_all([
                    "V.pos.to.T.source",
                    "AC.pos.to.T.gate",
                    "T.drain.to.Ground",
                    "T.base.to.Ground",
                    "AC.neg.to.Ground",
                    "V.neg.to.Ground",
                ])
                .build()?,
        };
        Ok(block.into())
    }
}

impl FromStr for Demo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "divider" => Ok(Demo::Divider),
            "rc" => Ok(Demo::Rc),
            "fet" => Ok(Demo::Fet),
            other => Err(anyhow!("Unknown circuit '{}'", other)),
        }
    }
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let circuit = matches
            .get_one::<String>("circuit")
            .ok_or_else(|| anyhow!("Circuit name is required"))?
            .parse::<Demo>()?;

        let output_file = matches.get_one::<String>("output").cloned();
        let rawfile = matches.get_one::<String>("rawfile").cloned();
        let ngspice = matches.get_one::<String>("ngspice").cloned();
        let print_netlist = matches.get_flag("netlist");
        let verbose_level = matches.get_count("verbose");

        let output_format = matches
            .get_one::<String>("format")
            .map(|f| f.parse::<OutputFormat>())
            .transpose()?
            .unwrap_or(OutputFormat::Csv);

        let analysis = if let Some(tran_values) = matches.get_many::<String>("tran") {
            let values: Vec<&String> = tran_values.collect();
            if values.len() != 2 {
                return Err(anyhow!(
                    "Transient analysis requires exactly 2 parameters: tstep and tstop"
                ));
            }

            let analysis = Analysis::transient(values[0].parse()?, values[1].parse()?);
            analysis.validate()?;
            analysis
        } else {
            Analysis::OperatingPoint
        };

        Ok(CliArgs {
            circuit,
            output_file,
            analysis,
            output_format,
            print_netlist,
            rawfile,
            ngspice,
            verbose_level,
        })
    }
}
