use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::units::{Unit, Value};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?::([A-Za-z]+))?\}").unwrap();
}

/// One piece of a device statement skeleton.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Name,
    Port(String),
    Param { name: String, unit: Unit },
}

/// A parsed device statement skeleton, e.g. `R{name} {left:port} {right:port} {resistance:Ohms}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
    ports: Vec<String>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut ports: Vec<String> = Vec::new();
        let mut last = 0;

        for captures in PLACEHOLDER.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            push_literal(&mut segments, &text[last..whole.start()])?;
            last = whole.end();

            let ident = &captures[1];
            match captures.get(2).map(|m| m.as_str()) {
                None if ident == "name" => segments.push(Segment::Name),
                None => {
                    return Err(Error::TemplateSyntax(format!(
                        "placeholder `{{{}}}` needs a `:port` or unit tag",
                        ident
                    )))
                }
                Some("port") => {
                    if !ports.iter().any(|p| p == ident) {
                        ports.push(ident.to_string());
                    }
                    segments.push(Segment::Port(ident.to_string()));
                }
                Some(tag) => segments.push(Segment::Param {
                    name: ident.to_string(),
                    unit: tag.parse()?,
                }),
            }
        }
        push_literal(&mut segments, &text[last..])?;

        Ok(Template { segments, ports })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Port names in order of first appearance.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Leading literal text, used as the element-type prefix of the instance name.
    pub fn prefix(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Literal(text)) => text,
            _ => "",
        }
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<()> {
    if text.contains('{') || text.contains('}') {
        return Err(Error::TemplateSyntax(format!("stray brace in `{}`", text)));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

/// A leaf component: one physical device rendered from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    template: Arc<Template>,
    params: HashMap<String, Value>,
    watched: Vec<String>,
}

impl Device {
    pub fn new(template: Arc<Template>) -> Self {
        Device {
            template,
            params: HashMap::new(),
            watched: Vec::new(),
        }
    }

    /// Supply a value for a template parameter.
    pub fn with(mut self, param: &str, value: impl Into<Value>) -> Self {
        self.params.insert(param.to_string(), value.into());
        self
    }

    /// Declare device parameters the simulator should report for this device.
    pub fn watch<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn ports(&self) -> &[String] {
        self.template.ports()
    }

    /// Declared measurable parameters, e.g. `i` and `p` for a resistor.
    pub fn parameters(&self) -> &[String] {
        &self.watched
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Full instance name for a rendered `name`, e.g. `Rtop.R1`.
    pub fn instance_name(&self, name: &str) -> String {
        format!("{}{}", self.template.prefix(), name)
    }

    /// Substitute every placeholder. `node` maps a port name to its canonical node id.
    pub fn render<F>(&self, name: &str, node: F) -> Result<String>
    where
        F: Fn(&str) -> Option<u32>,
    {
        let mut out = String::new();
        for segment in self.template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(name),
                Segment::Port(port) => {
                    let id = node(port).ok_or_else(|| Error::PortNotFound {
                        instance: name.to_string(),
                        port: port.clone(),
                    })?;
                    out.push_str(&id.to_string());
                }
                Segment::Param { name: param, unit } => {
                    let value = self.params.get(param).ok_or_else(|| Error::ParameterMissing {
                        instance: name.to_string(),
                        param: param.clone(),
                    })?;
                    if value.unit() != *unit {
                        return Err(Error::ParameterUnit {
                            instance: name.to_string(),
                            param: param.clone(),
                            expected: *unit,
                            found: value.unit(),
                        });
                    }
                    out.push_str(&value.to_string());
                }
            }
        }
        out.push('\n');
        Ok(out)
    }
}
