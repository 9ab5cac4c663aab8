use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{debug, warn};
use nom::{
    bytes::complete::take_till1,
    character::complete::{digit1, space0, space1},
    combinator::{map_res, rest},
    sequence::tuple,
    IResult,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

lazy_static! {
    static ref NODE_VOLTAGE: Regex = Regex::new(r"^(?i)v\(([0-9]+)\)$").unwrap();
    static ref DEVICE_PARAM: Regex =
        Regex::new(r"^(?i)[a-z]\(@([^\[\]]+)\[([a-z0-9_]+)\]\)$").unwrap();
    static ref DEVICE_PARAM_ALT: Regex = Regex::new(r"^(?i)@([^\[\]]+)\[([a-z0-9_]+)\]$").unwrap();
}

/// What a declared output variable refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableRef {
    /// `v(<n>)`: voltage of canonical node `n`.
    Node(u32),
    /// `x(@<instance>[<param>])` or `@<instance>[<param>]`, names lower-cased.
    DeviceParam { instance: String, param: String },
    /// Anything else, e.g. `time` or a branch current.
    Other,
}

impl VariableRef {
    pub fn classify(name: &str) -> Self {
        if let Some(c) = NODE_VOLTAGE.captures(name) {
            if let Ok(id) = c[1].parse() {
                return VariableRef::Node(id);
            }
        }
        if let Some(c) = DEVICE_PARAM
            .captures(name)
            .or_else(|| DEVICE_PARAM_ALT.captures(name))
        {
            return VariableRef::DeviceParam {
                instance: c[1].to_lowercase(),
                param: c[2].to_lowercase(),
            };
        }
        VariableRef::Other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub index: usize,
    pub name: String,
    /// Kind column as printed by the simulator, e.g. `voltage`.
    pub kind: String,
    pub reference: VariableRef,
}

/// Column-indexed series parsed from one result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub plotname: Option<String>,
    pub variables: Vec<Variable>,
    /// One series per variable, all of the same length.
    pub series: Vec<Vec<f64>>,
}

impl RawTable {
    /// Number of samples per variable.
    pub fn points(&self) -> usize {
        self.series.first().map_or(0, Vec::len)
    }

    pub fn by_name(&self, name: &str) -> Option<&[f64]> {
        self.variables
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
            .map(|i| self.series[i].as_slice())
    }

    pub fn node(&self, id: u32) -> Option<&[f64]> {
        self.find(|r| *r == VariableRef::Node(id))
    }

    pub fn device_param(&self, instance: &str, param: &str) -> Option<&[f64]> {
        let instance = instance.to_lowercase();
        let param = param.to_lowercase();
        self.find(|r| {
            matches!(r, VariableRef::DeviceParam { instance: i, param: p } if *i == instance && *p == param)
        })
    }

    /// The analysis time axis of a transient run.
    pub fn time(&self) -> Option<&[f64]> {
        self.by_name("time")
    }

    fn find<F: Fn(&VariableRef) -> bool>(&self, pred: F) -> Option<&[f64]> {
        self.variables
            .iter()
            .position(|v| pred(&v.reference))
            .map(|i| self.series[i].as_slice())
    }

    /// Node voltage series keyed by canonical node id.
    pub fn nodes(&self) -> HashMap<u32, &[f64]> {
        self.variables
            .iter()
            .zip(&self.series)
            .filter_map(|(v, s)| match v.reference {
                VariableRef::Node(id) => Some((id, s.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Device parameter series keyed by lower-cased instance name, then parameter.
    pub fn device_params(&self) -> HashMap<&str, HashMap<&str, &[f64]>> {
        let mut out: HashMap<&str, HashMap<&str, &[f64]>> = HashMap::new();
        for (v, s) in self.variables.iter().zip(&self.series) {
            if let VariableRef::DeviceParam { instance, param } = &v.reference {
                out.entry(instance.as_str())
                    .or_default()
                    .insert(param.as_str(), s.as_slice());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Variables,
    Values,
}

/// `<ws><index><ws><name><ws><kind>`
fn variable_line(input: &str) -> IResult<&str, (usize, &str, &str)> {
    let (input, (_, index, _, name, _, kind)) = tuple((
        space0,
        map_res(digit1, |s: &str| s.parse::<usize>()),
        space1,
        take_till1(char::is_whitespace),
        space1,
        rest,
    ))(input)?;
    Ok((input, (index, name, kind.trim())))
}

/// `<index><ws><value...>`
fn record_start(input: &str) -> IResult<&str, (usize, &str)> {
    let (input, (index, _, value)) =
        tuple((map_res(digit1, |s: &str| s.parse::<usize>()), space1, rest))(input)?;
    Ok((input, (index, value)))
}

fn sample(line: usize, text: &str) -> Result<f64> {
    let field = text.split_whitespace().last().unwrap_or("");
    field.parse::<f64>().map_err(|_| Error::MalformedSample {
        line,
        text: text.trim().to_string(),
    })
}

/// Parse the first result table found in `text`.
///
/// Only ascii tables are understood. Anything before the header is ignored:
///
/// ```text
/// No. Variables: 2
/// Variables:
///     0   v(1)        voltage
///     1   @r1[i]      current
/// Values:
///  0  1.0e+00
///     2.0e-03
/// ```
///
/// Each record begins with its index and first value; the rest follow one per line. A line
/// starting with `@`, or any other unindented line, ends the table.
pub fn parse(text: &str) -> Result<RawTable> {
    let mut section = Section::Header;
    let mut plotname = None;
    let mut declared_count = None;
    let mut variables: Vec<Variable> = Vec::new();
    let mut series: Vec<Vec<f64>> = Vec::new();
    let mut column = 0usize;
    let mut records = 0usize;

    for (i, line) in text.lines().enumerate() {
        let lineno = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        if section == Section::Values {
            if line.starts_with('@') {
                break;
            }
            if let Ok((_, (_, value))) = record_start(line.trim_start()) {
                if column != 0 && column != variables.len() {
                    return Err(Error::RawfileParse {
                        line: lineno,
                        message: format!(
                            "record {} has {} of {} values",
                            records,
                            column,
                            variables.len()
                        ),
                    });
                }
                column = 0;
                records += 1;
                push_sample(&mut series, column, lineno, sample(lineno, value)?)?;
            } else if line.starts_with(char::is_whitespace) {
                push_sample(&mut series, column, lineno, sample(lineno, line)?)?;
            } else {
                // Not a record: the table is over.
                break;
            }
            column += 1;
            continue;
        }

        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("Plotname:") {
            plotname = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("No. Variables:") {
            declared_count = value.trim().parse::<usize>().ok();
        } else if trimmed.starts_with("Variables:") || trimmed.starts_with("No. of Data Columns") {
            section = Section::Variables;
        } else if trimmed.starts_with("Values:") {
            section = Section::Values;
            series = vec![Vec::new(); variables.len()];
        } else if trimmed.starts_with("Binary:") {
            return Err(Error::UnsupportedFormat(
                "binary rawfile; request `.options filetype = ascii`".to_string(),
            ));
        } else if section == Section::Variables {
            match variable_line(line) {
                Ok((_, (index, name, kind))) => variables.push(Variable {
                    index,
                    name: name.to_string(),
                    kind: kind.to_string(),
                    reference: VariableRef::classify(name),
                }),
                Err(_) => debug!("skipping rawfile line {}: {}", lineno, trimmed),
            }
        }
    }

    if variables.is_empty() || section != Section::Values {
        return Err(Error::EmptyOutput {
            output: text.to_string(),
        });
    }
    if column != 0 && column != variables.len() {
        return Err(Error::RawfileParse {
            line: text.lines().count(),
            message: format!("truncated record {}", records),
        });
    }
    if let Some(count) = declared_count {
        if count != variables.len() {
            warn!(
                "rawfile declares {} variables but lists {}",
                count,
                variables.len()
            );
        }
    }

    debug!(
        "parsed rawfile: {} variables, {} points",
        variables.len(),
        records
    );
    Ok(RawTable {
        plotname,
        variables,
        series,
    })
}

fn push_sample(series: &mut [Vec<f64>], column: usize, line: usize, value: f64) -> Result<()> {
    let count = series.len();
    let target = series.get_mut(column).ok_or_else(|| Error::RawfileParse {
        line,
        message: format!("more values than the {} declared variables", count),
    })?;
    target.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: &str = "Title: autogen\n\
Date: Thu Jan  1 00:00:00  1970\n\
Plotname: Operating Point\n\
Flags: real\n\
No. Variables: 4\n\
No. Points: 1\n\
Variables:\n\
\t0\tv(1)\tvoltage\n\
\t1\tv(2)\tvoltage\n\
\t2\ti(@rtop.r1[i])\tcurrent\n\
\t3\t@vtop.v[i]\tcurrent\n\
Values:\n\
 0\t1.000000000000000e+01\n\
\t5.000000000000000e+00\n\
\t5.000000000000000e-03\n\
\t-5.000000000000000e-03\n\
\n\
@@@ 122 5\n";

    #[test]
    fn test_classify() {
        assert_eq!(VariableRef::classify("v(12)"), VariableRef::Node(12));
        assert_eq!(VariableRef::classify("V(3)"), VariableRef::Node(3));
        assert_eq!(
            VariableRef::classify("i(@rtop.d.r1[i])"),
            VariableRef::DeviceParam {
                instance: "rtop.d.r1".to_string(),
                param: "i".to_string()
            }
        );
        assert_eq!(
            VariableRef::classify("@Mtop.T[vgs]"),
            VariableRef::DeviceParam {
                instance: "mtop.t".to_string(),
                param: "vgs".to_string()
            }
        );
        assert_eq!(VariableRef::classify("time"), VariableRef::Other);
        assert_eq!(VariableRef::classify("v(out)"), VariableRef::Other);
        assert_eq!(VariableRef::classify("i(vtop.v)"), VariableRef::Other);
    }

    #[test]
    fn test_parse_operating_point() {
        let table = parse(OP).unwrap();
        assert_eq!(table.plotname.as_deref(), Some("Operating Point"));
        assert_eq!(table.variables.len(), 4);
        assert_eq!(table.points(), 1);
        assert_eq!(table.node(2), Some(&[5.0][..]));
        assert_eq!(table.device_param("Rtop.r1", "i"), Some(&[5e-3][..]));
        assert_eq!(table.device_param("vtop.v", "i"), Some(&[-5e-3][..]));
        assert!(table.device_param("vtop.v", "p").is_none());
        assert_eq!(table.nodes().len(), 2);
        assert_eq!(table.device_params()["rtop.r1"]["i"], &[5e-3]);
    }

    #[test]
    fn test_parse_transient_records() {
        let text = "No. Variables: 2\nVariables:\n\t0\ttime\ttime\n\t1\tv(1)\tvoltage\nValues:\n\
0\t0.0\n\t0.0\n\
1\t1e-9\n\t2.5\n\
2\t2e-9\n\t5.0\n";
        let table = parse(text).unwrap();
        assert_eq!(table.points(), 3);
        assert_eq!(table.time(), Some(&[0.0, 1e-9, 2e-9][..]));
        assert_eq!(table.node(1), Some(&[0.0, 2.5, 5.0][..]));
    }

    #[test]
    fn test_server_mode_headers() {
        let text = "@$ ngspice server\nNo. Variables: 1\nNo. of Data Columns : 1\n\t0\tv(1)\tvoltage\nValues:\n0\t\t3.3\n@@@ 10 1\n";
        let table = parse(text).unwrap();
        assert_eq!(table.node(1), Some(&[3.3][..]));
    }

    #[test]
    fn test_malformed_sample() {
        let text = "Variables:\n\t0\tv(1)\tvoltage\n\t1\tv(2)\tvoltage\nValues:\n0\t1.0\n\tabc\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::MalformedSample { line: 6, ref text } if text == "abc"));
    }

    #[test]
    fn test_truncated_record() {
        let text = "Variables:\n\t0\tv(1)\tvoltage\n\t1\tv(2)\tvoltage\nValues:\n0\t1.0\n\t2.0\n1\t1.0\n";
        assert!(matches!(parse(text), Err(Error::RawfileParse { .. })));

        let text = "Variables:\n\t0\tv(1)\tvoltage\nValues:\n0\t1.0\n\t2.0\n";
        assert!(matches!(parse(text), Err(Error::RawfileParse { .. })));
    }

    #[test]
    fn test_empty_and_binary_output() {
        assert!(matches!(parse(""), Err(Error::EmptyOutput { .. })));
        assert!(matches!(
            parse("Error: no such analysis\n"),
            Err(Error::EmptyOutput { .. })
        ));
        assert!(matches!(
            parse("Variables:\n\t0\tv(1)\tvoltage\nBinary:\n"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_stops_at_next_header() {
        let text = "Variables:\n\t0\tv(1)\tvoltage\nValues:\n0\t1.0\nTitle: second plot\nVariables:\n";
        let table = parse(text).unwrap();
        assert_eq!(table.points(), 1);
    }
}
