use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Physical unit a device template expects for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Ohms,
    Farads,
    Volts,
    Hertz,
    Amps,
    Seconds,
    Text,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unit::Ohms => "Ohms",
            Unit::Farads => "Farads",
            Unit::Volts => "Volts",
            Unit::Hertz => "Hertz",
            Unit::Amps => "Amps",
            Unit::Seconds => "Seconds",
            Unit::Text => "string",
        };
        f.write_str(name)
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ohms" => Ok(Unit::Ohms),
            "Farads" => Ok(Unit::Farads),
            "Volts" => Ok(Unit::Volts),
            "Hertz" => Ok(Unit::Hertz),
            "Amps" => Ok(Unit::Amps),
            "Seconds" => Ok(Unit::Seconds),
            "string" => Ok(Unit::Text),
            other => Err(Error::TemplateSyntax(format!("unknown unit `{}`", other))),
        }
    }
}

macro_rules! unit_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub f64);

        impl From<$name> for Value {
            fn from(v: $name) -> Self {
                Value::Quantity { value: v.0, unit: Unit::$name }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

unit_newtype!(
    /// Resistance.
    Ohms
);
unit_newtype!(
    /// Capacitance.
    Farads
);
unit_newtype!(
    /// Potential difference.
    Volts
);
unit_newtype!(
    /// Frequency.
    Hertz
);
unit_newtype!(
    /// Current.
    Amps
);
unit_newtype!(
    /// Time.
    Seconds
);

const FEMTO: f64 = 1e-15;
const PICO: f64 = 1e-12;
const NANO: f64 = 1e-9;
const MICRO: f64 = 1e-6;
const MILLI: f64 = 1e-3;

/// Time suffixes, longest first so `ms` wins over `s`.
const TIME_SUFFIXES: [(&str, f64); 6] = [
    ("fs", FEMTO),
    ("ps", PICO),
    ("ns", NANO),
    ("us", MICRO),
    ("ms", MILLI),
    ("s", 1.0),
];

pub fn picoseconds(n: f64) -> Seconds {
    Seconds(n * PICO)
}

pub fn nanoseconds(n: f64) -> Seconds {
    Seconds(n * NANO)
}

pub fn microseconds(n: f64) -> Seconds {
    Seconds(n * MICRO)
}

pub fn milliseconds(n: f64) -> Seconds {
    Seconds(n * MILLI)
}

/// Parses `1ns`, `1.5ms`, `10us` and the like. A bare number is in seconds.
impl FromStr for Seconds {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        let (number, scale) = TIME_SUFFIXES
            .iter()
            .find_map(|(suffix, scale)| text.strip_suffix(suffix).map(|n| (n, *scale)))
            .unwrap_or((text.as_str(), 1.0));
        number
            .trim_end()
            .parse::<f64>()
            .map(|n| Seconds(n * scale))
            .map_err(|_| Error::InvalidQuantity(s.to_string()))
    }
}

/// A caller-supplied device parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Quantity { value: f64, unit: Unit },
    Text(String),
}

impl Value {
    pub fn unit(&self) -> Unit {
        match self {
            Value::Quantity { unit, .. } => *unit,
            Value::Text(_) => Unit::Text,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Quantity { value, .. } => write!(f, "{}", value),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
