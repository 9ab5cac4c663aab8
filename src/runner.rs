use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, warn};

use crate::error::{Error, Result};

/// Environment variable overriding the simulator executable.
pub const NGSPICE_ENV: &str = "BLOCKSPICE_NGSPICE";

/// How to start the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgspiceConfig {
    /// Path to the executable (default: "ngspice" in PATH).
    pub executable: String,
    /// Arguments selecting stdin/stdout mode.
    pub args: Vec<String>,
}

impl Default for NgspiceConfig {
    fn default() -> Self {
        Self {
            executable: "ngspice".to_string(),
            args: vec!["-s".to_string()],
        }
    }
}

impl NgspiceConfig {
    /// Default configuration, with the executable taken from `BLOCKSPICE_NGSPICE` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(executable) = std::env::var(NGSPICE_ENV) {
            if !executable.trim().is_empty() {
                config.executable = executable;
            }
        }
        config
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Check if ngspice is available.
pub fn is_ngspice_available(config: &NgspiceConfig) -> bool {
    Command::new(&config.executable)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// First line of `ngspice --version`.
pub fn ngspice_version(config: &NgspiceConfig) -> Result<String> {
    let output = Command::new(&config.executable)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::SimulatorSpawn {
            executable: config.executable.clone(),
            source,
        })?;

    let version = String::from_utf8_lossy(&output.stdout);
    Ok(version
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown")
        .trim()
        .to_string())
}

/// Feed `program` to the simulator and return everything it printed on standard output.
///
/// A non-zero exit status is only logged: ngspice in server mode exits non-zero on some
/// successful runs. Output without any non-blank text is an [`Error::EmptyOutput`].
pub fn run_ngspice(program: &str, config: &NgspiceConfig) -> Result<String> {
    debug!(
        "starting {} {}",
        config.executable,
        config.args.join(" ")
    );
    let mut child = Command::new(&config.executable)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| Error::SimulatorSpawn {
            executable: config.executable.clone(),
            source,
        })?;

    let stdin = child.stdin.take();
    // Write on a separate thread so a simulator that echoes while reading cannot deadlock us.
    let output = thread::scope(|scope| {
        let writer = scope.spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(program.as_bytes())?;
            }
            Ok(())
        });
        let output = child.wait_with_output();
        match writer.join() {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                warn!("failed writing program to simulator: {}", e)
            }
            Err(_) => warn!("simulator input writer panicked"),
            _ => {}
        }
        output
    })?;

    if !output.status.success() {
        warn!("{} exited with {}", config.executable, output.status);
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        return Err(Error::EmptyOutput { output: text });
    }
    debug!("simulator produced {} bytes", text.len());
    Ok(text)
}
