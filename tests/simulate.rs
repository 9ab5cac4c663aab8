use std::fs;

use approx::assert_relative_eq;
use tempfile::TempDir;

use blockspice::blocks::voltage_divider;
use blockspice::devices::{capacitor, dc_voltage, nmos, resistor};
use blockspice::runner::is_ngspice_available;
use blockspice::*;

fn divider_bench() -> Component {
    Block::builder()
        .port("out")
        .child("V", dc_voltage(Volts(10.0)))
        .child("D", voltage_divider(0.5).unwrap())
        .connect("V.pos.to.D.in")
        .connect("D.out.to.out")
        .connect("V.neg.to.Ground")
        .build()
        .unwrap()
        .into()
}

/// A simulator stand-in that discards the program and prints `output`.
fn fake_ngspice(dir: &TempDir, output: &str) -> NgspiceConfig {
    let data = dir.path().join("output.raw");
    fs::write(&data, output).unwrap();
    let script = dir.path().join("ngspice.sh");
    fs::write(
        &script,
        format!("cat > /dev/null\ncat '{}'\n", data.display()),
    )
    .unwrap();
    NgspiceConfig::default()
        .with_executable("/bin/sh")
        .with_args([script.display().to_string()])
}

fn simulator(ngspice: NgspiceConfig) -> Simulator {
    Simulator::with_config(SimulatorConfig {
        ngspice,
        ..SimulatorConfig::default()
    })
}

#[test]
fn test_divider_through_fake_simulator() {
    let root = divider_bench();
    let compiled = simulator(NgspiceConfig::default()).compile(&root).unwrap();
    let top = compiled.node("V.pos").unwrap();
    let mid = compiled.node("out").unwrap();
    assert_ne!(top, mid);
    assert_eq!(compiled.node("D.R1.right"), Some(mid));
    assert_eq!(compiled.node("D.R2.right"), Some(0));

    let raw = format!(
        "Circuit: autogen\n\
Doing analysis at TEMP = 27.000000 and TNOM = 27.000000\n\
Title: autogen\n\
Plotname: Operating Point\n\
Flags: real\n\
No. Variables: 7\n\
No. Points: 1\n\
Variables:\n\
\t0\tv({top})\tvoltage\n\
\t1\tv({mid})\tvoltage\n\
\t2\ti(@vtop.v[i])\tcurrent\n\
\t3\ti(@rtop.d.r1[i])\tcurrent\n\
\t4\ti(@rtop.d.r2[i])\tcurrent\n\
\t5\t@rtop.d.r1[p]\tpower\n\
\t6\tvtop.v#branch\tcurrent\n\
Values:\n\
 0\t1.000000000000000e+01\n\
\t5.000000000000000e+00\n\
\t-5.000000000000000e-03\n\
\t5.000000000000000e-03\n\
\t5.000000000000000e-03\n\
\t2.500000000000000e-02\n\
\t-5.000000000000000e-03\n\
\n"
    );
    let dir = TempDir::new().unwrap();
    let sim = simulator(fake_ngspice(&dir, &raw))
        .simulate(&root, &Analysis::OperatingPoint)
        .unwrap();

    assert!(sim.spice.contains(".save all @Vtop.V[i] @Vtop.V[p] @Rtop.D.R1[i]"));
    assert_eq!(sim.points(), 1);
    assert_relative_eq!(sim.circuit.signal("out").unwrap()[0], 5.0);
    assert_relative_eq!(sim.circuit.signal("D.R1.right").unwrap()[0], 5.0);
    assert_relative_eq!(sim.circuit.signal("D.R1.i").unwrap()[0], 0.005);
    assert_relative_eq!(sim.circuit.signal("D.R2.i").unwrap()[0], 0.005);
    assert_relative_eq!(sim.circuit.signal("D.R1.p").unwrap()[0], 0.025);
    assert_relative_eq!(sim.circuit.signal("V.i").unwrap()[0], -0.005);
    assert_eq!(sim.circuit.signal("V.neg"), Some(&[0.0][..]));
    assert!(sim.circuit.signal("D.R2.p").is_none());
    assert_eq!(
        sim.circuit.get("D.R1").unwrap().device_name.as_deref(),
        Some("Rtop.D.R1")
    );
}

#[test]
fn test_transient_series_lengths() {
    let root: Component = Block::builder()
        .child("V", dc_voltage(Volts(5.0)))
        .child("R", resistor(Ohms(1.0)))
        .child("C", capacitor(Farads(1e-6)))
        .connect("V.pos.to.R.left")
        .connect("R.right.to.C.left")
        .connect("C.right.to.Ground")
        .connect("V.neg.to.Ground")
        .build()
        .unwrap()
        .into();
    let analysis = Analysis::transient(units::microseconds(1.0), units::microseconds(4.0));

    let compiled = simulator(NgspiceConfig::default()).compile(&root).unwrap();
    let a = compiled.node("V.pos").unwrap();
    let b = compiled.node("C.left").unwrap();
    let mut raw = format!(
        "No. Variables: 4\nNo. Points: 5\nVariables:\n\t0\ttime\ttime\n\t1\tv({a})\tvoltage\n\
\t2\tv({b})\tvoltage\n\t3\ti(@rtop.r[i])\tcurrent\nValues:\n"
    );
    for i in 0..analysis.nominal_points() {
        let t = i as f64 * 1e-6;
        let vc = 5.0 * (1.0 - (-t / 1e-6).exp());
        raw.push_str(&format!(" {}\t{:e}\n\t5.0\n\t{:e}\n\t{:e}\n", i, t, vc, 5.0 - vc));
    }

    let dir = TempDir::new().unwrap();
    let sim = simulator(fake_ngspice(&dir, &raw))
        .simulate(&root, &analysis)
        .unwrap();

    assert!(sim.spice.contains("\n.tran 0.000001 0.000004\n"));
    assert_eq!(sim.points(), 5);
    assert_eq!(sim.time().unwrap().len(), 5);
    for (path, series) in sim.circuit.signals() {
        assert_eq!(series.len(), 5, "{} has the wrong length", path);
    }
    assert_eq!(sim.circuit.signal("C.right").unwrap(), &[0.0; 5]);
    assert_relative_eq!(sim.circuit.signal("C.left").unwrap()[0], 0.0);

    let csv_path = dir.path().join("rc.csv");
    sim.export(&csv_path, OutputFormat::Csv).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with("time,"));
    assert_eq!(text.lines().count(), 6);
}

#[test]
fn test_failures_abort_the_call() {
    let root = divider_bench();
    let dir = TempDir::new().unwrap();

    let err = simulator(fake_ngspice(&dir, "\n"))
        .simulate(&root, &Analysis::OperatingPoint)
        .unwrap_err();
    assert!(matches!(err, Error::EmptyOutput { .. }));

    let err = simulator(fake_ngspice(
        &dir,
        "Variables:\n\t0\tv(1)\tvoltage\nValues:\n0\tnan-ish\n",
    ))
    .simulate(&root, &Analysis::OperatingPoint)
    .unwrap_err();
    assert!(matches!(err, Error::MalformedSample { .. }));

    let err = simulator(NgspiceConfig::default().with_executable("/nonexistent/ngspice"))
        .simulate(&root, &Analysis::OperatingPoint)
        .unwrap_err();
    assert!(matches!(err, Error::SimulatorSpawn { .. }));
}

#[test]
fn test_sweep_reports_each_point() {
    let dir = TempDir::new().unwrap();
    let sim = simulator(fake_ngspice(
        &dir,
        "Variables:\n\t0\tv(1)\tvoltage\nValues:\n0\t1.0\n",
    ));
    let results = sim.sweep(
        [0.5, 0.0, 0.25],
        |ratio| {
            if ratio == 0.0 {
                return Err(Error::InvalidAnalysis("ratio must be positive".into()));
            }
            Ok(Block::builder()
                .child("V", dc_voltage(Volts(1.0)))
                .child("D", voltage_divider(ratio)?)
                .connect("V.pos.to.D.in")
                .connect("V.neg.to.Ground")
                .allow_floating()
                .build()?
                .into())
        },
        &Analysis::OperatingPoint,
    );
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
}

fn fet_bench(gate: &str) -> Component {
    Block::builder()
        .child("V", dc_voltage(Volts(5.0)))
        .child("T", nmos())
        .connect_all([
            "V.pos.to.T.drain",
            gate,
            "T.source.to.Ground",
            "T.base.to.Ground",
            "V.neg.to.Ground",
        ])
        .build()
        .unwrap()
        .into()
}

#[test]
#[ignore] // Requires ngspice to be installed
fn test_ngspice_divider() {
    let config = NgspiceConfig::from_env();
    if !is_ngspice_available(&config) {
        return;
    }
    let sim = simulator(config)
        .simulate(&divider_bench(), &Analysis::OperatingPoint)
        .unwrap();
    assert_relative_eq!(sim.circuit.signal("out").unwrap()[0], 5.0, epsilon = 1e-6);
    assert_relative_eq!(
        sim.circuit.signal("D.R1.i").unwrap()[0],
        0.005,
        epsilon = 1e-9
    );
    let source = sim.circuit.signal("V.i").unwrap()[0];
    assert!(source.signum() != sim.circuit.signal("D.R1.i").unwrap()[0].signum());
}

#[test]
#[ignore] // Requires ngspice to be installed
fn test_ngspice_nmos_switches() {
    let config = NgspiceConfig::from_env();
    if !is_ngspice_available(&config) {
        return;
    }
    let simulator = simulator(config);
    let on = simulator
        .simulate(&fet_bench("V.pos.to.T.gate"), &Analysis::OperatingPoint)
        .unwrap();
    let off = simulator
        .simulate(&fet_bench("Ground.to.T.gate"), &Analysis::OperatingPoint)
        .unwrap();
    let is_on = on.circuit.signal("T.is").unwrap()[0].abs();
    let is_off = off.circuit.signal("T.is").unwrap()[0].abs();
    assert!(is_on > is_off, "on {} <= off {}", is_on, is_off);
}
