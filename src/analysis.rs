use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::Seconds;

/// Analysis directive appended to a netlist program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Analysis {
    /// Single DC operating point: one sample per variable.
    OperatingPoint,
    /// Time-stepped analysis over `[0, stop]`.
    Transient { step: Seconds, stop: Seconds },
}

impl Analysis {
    pub fn transient(step: Seconds, stop: Seconds) -> Self {
        Analysis::Transient { step, stop }
    }

    /// A transient needs finite times with `0 < step < stop`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Analysis::OperatingPoint => Ok(()),
            Analysis::Transient { step, stop } => {
                if !step.0.is_finite() || !stop.0.is_finite() {
                    Err(Error::InvalidAnalysis(format!(
                        "transient step {} and stop {} must be finite",
                        step, stop
                    )))
                } else if step.0 <= 0.0 || step.0 >= stop.0 {
                    Err(Error::InvalidAnalysis(format!(
                        "transient step {} must be positive and less than stop {}",
                        step, stop
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The SPICE control line, without trailing newline.
    pub fn directive(&self) -> String {
        match self {
            Analysis::OperatingPoint => ".op".to_string(),
            Analysis::Transient { step, stop } => format!(".tran {} {}", step, stop),
        }
    }

    /// Nominal number of sample points: 1 for an operating point, steps + 1 for a transient.
    /// Saturates at `usize::MAX` when the step count does not fit.
    pub fn nominal_points(&self) -> usize {
        match self {
            Analysis::OperatingPoint => 1,
            Analysis::Transient { step, stop } => {
                // float to int `as` saturates; NaN becomes 0
                ((stop.0 / step.0).round() as usize).saturating_add(1)
            }
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Analysis::OperatingPoint => write!(f, "operating point"),
            Analysis::Transient { step, stop } => write!(f, "transient (step {}s, stop {}s)", step, stop),
        }
    }
}
