use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::device::Device;
use crate::error::{Error, Result};

/// Reserved endpoint name for the circuit reference node.
pub const GROUND: &str = "Ground";

/// Keyword separating the two sides of a connection.
const TO: &str = "to";

/// A node in the circuit hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Device(Device),
    Block(Block),
}

impl Component {
    pub fn ports(&self) -> &[String] {
        match self {
            Component::Device(device) => device.ports(),
            Component::Block(block) => block.ports(),
        }
    }

    pub fn has_port(&self, name: &str) -> bool {
        self.ports().iter().any(|p| p == name)
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Component::Device(device) => Some(device),
            Component::Block(_) => None,
        }
    }
}

impl From<Device> for Component {
    fn from(device: Device) -> Self {
        Component::Device(device)
    }
}

impl From<Block> for Component {
    fn from(block: Block) -> Self {
        Component::Block(block)
    }
}

/// One side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A port of the enclosing block.
    Port(String),
    /// A port of a named child.
    Child { child: String, port: String },
    Ground,
}

impl Endpoint {
    pub fn port(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == GROUND {
            Endpoint::Ground
        } else {
            Endpoint::Port(name)
        }
    }

    pub fn child(child: impl Into<String>, port: impl Into<String>) -> Self {
        Endpoint::Child {
            child: child.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Port(port) => f.write_str(port),
            Endpoint::Child { child, port } => write!(f, "{}.{}", child, port),
            Endpoint::Ground => f.write_str(GROUND),
        }
    }
}

/// An undirected electrical equivalence between two endpoints of the same block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection(pub Endpoint, pub Endpoint);

impl Connection {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        Connection(a, b)
    }

    pub fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.0, &self.1]
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, TO, self.1)
    }
}

/// Accumulates name tokens of a connection such as `V.pos.to.R1.left`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wire {
    tokens: Vec<String>,
}

impl Wire {
    pub fn new(first: impl Into<String>) -> Self {
        Wire {
            tokens: vec![first.into()],
        }
    }

    pub fn dot(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn to(self) -> Self {
        self.dot(TO)
    }

    /// Convert the token sequence into a connection.
    pub fn resolve(&self) -> Result<Connection> {
        let bad = || Error::MalformedConnection(self.tokens.join("."));
        let parts: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        let to_idx = parts.iter().position(|t| *t == TO).ok_or_else(bad)?;

        let from = match to_idx {
            1 => Endpoint::port(parts[0]),
            2 => Endpoint::child(parts[0], parts[1]),
            _ => return Err(bad()),
        };
        let to = match &parts[to_idx + 1..] {
            [port] => Endpoint::port(*port),
            [child, port] => Endpoint::child(*child, *port),
            _ => return Err(bad()),
        };
        Ok(Connection(from, to))
    }
}

impl FromStr for Wire {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<String> = s.trim().split('.').map(|t| t.trim().to_string()).collect();
        if tokens.iter().any(String::is_empty) {
            return Err(Error::MalformedConnection(s.to_string()));
        }
        Ok(Wire { tokens })
    }
}

/// Anything a [`BlockBuilder`] accepts as a connection.
#[derive(Debug, Clone)]
pub enum Link {
    Text(String),
    Wire(Wire),
    Connection(Connection),
}

impl From<&str> for Link {
    fn from(s: &str) -> Self {
        Link::Text(s.to_string())
    }
}

impl From<Wire> for Link {
    fn from(w: Wire) -> Self {
        Link::Wire(w)
    }
}

impl From<Connection> for Link {
    fn from(c: Connection) -> Self {
        Link::Connection(c)
    }
}

impl Link {
    fn resolve(&self) -> Result<Connection> {
        match self {
            Link::Text(text) => text.parse::<Wire>()?.resolve(),
            Link::Wire(wire) => wire.resolve(),
            Link::Connection(c) => Ok(c.clone()),
        }
    }
}

/// A composite component: re-exported ports, named children and the connections among them.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    ports: Vec<String>,
    children: Vec<(String, Component)>,
    connections: Vec<Connection>,
}

impl Block {
    pub fn builder() -> BlockBuilder {
        BlockBuilder::default()
    }

    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[(String, Component)] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Component> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    ports: Vec<String>,
    children: Vec<(String, Component)>,
    links: Vec<Link>,
    allow_floating: bool,
}

impl BlockBuilder {
    /// Declare a port re-exported by the block.
    pub fn port(mut self, name: impl Into<String>) -> Self {
        self.ports.push(name.into());
        self
    }

    pub fn child(mut self, name: impl Into<String>, component: impl Into<Component>) -> Self {
        self.children.push((name.into(), component.into()));
        self
    }

    pub fn connect(mut self, link: impl Into<Link>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn connect_all<I, L>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Link>,
    {
        self.links.extend(links.into_iter().map(Into::into));
        self
    }

    /// Skip the floating-port guard for blocks that leave terminals open on purpose.
    pub fn allow_floating(mut self) -> Self {
        self.allow_floating = true;
        self
    }

    pub fn build(self) -> Result<Block> {
        let mut names = HashSet::new();
        for name in self.ports.iter().chain(self.children.iter().map(|(n, _)| n)) {
            if name == GROUND {
                return Err(Error::ReservedName(name.clone()));
            }
            if !names.insert(name.as_str()) {
                return Err(Error::DuplicateName(name.clone()));
            }
        }

        let block = Block {
            connections: self
                .links
                .iter()
                .map(Link::resolve)
                .collect::<Result<Vec<_>>>()?,
            ports: self.ports,
            children: self.children,
        };

        for connection in &block.connections {
            for endpoint in connection.endpoints() {
                check_endpoint(&block, endpoint)?;
            }
        }

        if !self.allow_floating {
            let floating = floating_ports(&block);
            if !floating.is_empty() {
                return Err(Error::FloatingPorts(floating));
            }
        }

        debug!(
            "built block: {} ports, {} children, {} connections",
            block.ports.len(),
            block.children.len(),
            block.connections.len()
        );
        Ok(block)
    }
}

fn check_endpoint(block: &Block, endpoint: &Endpoint) -> Result<()> {
    let unresolved = |reason: String| Error::UnresolvedEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    match endpoint {
        Endpoint::Ground => Ok(()),
        Endpoint::Port(port) if block.ports.contains(port) => Ok(()),
        Endpoint::Port(port) => {
            if block.child(port).is_some() {
                Err(unresolved(format!("`{}` is a child, name one of its ports", port)))
            } else {
                Err(unresolved("no such port".to_string()))
            }
        }
        Endpoint::Child { child, port } => match block.child(child) {
            None => Err(unresolved(format!("no child named `{}`", child))),
            Some(c) if c.has_port(port) => Ok(()),
            Some(c) => Err(unresolved(format!(
                "`{}` has ports [{}]",
                child,
                c.ports().join(", ")
            ))),
        },
    }
}

/// Own ports and child ports that no connection of `block` mentions.
fn floating_ports(block: &Block) -> Vec<String> {
    let used: HashSet<&Endpoint> = block
        .connections
        .iter()
        .flat_map(|c| c.endpoints())
        .collect();

    let own = block
        .ports
        .iter()
        .map(|p| Endpoint::Port(p.clone()));
    let nested = block.children.iter().flat_map(|(name, child)| {
        child
            .ports()
            .iter()
            .map(move |p| Endpoint::child(name.clone(), p.clone()))
    });

    own.chain(nested)
        .filter(|e| !used.contains(e))
        .map(|e| e.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{dc_voltage, resistor};
    use crate::units::{Ohms, Volts};

    #[test]
    fn test_wire_resolve() {
        let c = "V.pos.to.R1.left".parse::<Wire>().unwrap().resolve().unwrap();
        assert_eq!(c.0, Endpoint::child("V", "pos"));
        assert_eq!(c.1, Endpoint::child("R1", "left"));

        let c = Wire::new("in").to().dot("R1").dot("left").resolve().unwrap();
        assert_eq!(c.0, Endpoint::port("in"));

        let c = "R2.right.to.Ground".parse::<Wire>().unwrap().resolve().unwrap();
        assert_eq!(c.1, Endpoint::Ground);

        let c = "Ground.to.T.gate".parse::<Wire>().unwrap().resolve().unwrap();
        assert_eq!(c.0, Endpoint::Ground);
        assert_eq!(c.to_string(), "Ground.to.T.gate");
    }

    #[test]
    fn test_wire_malformed() {
        for bad in ["V.pos.R1.left", "to.R1.left", "a.b.c.to.d", "V.pos.to", "V.pos.to.a.b.c", "V..to.x"] {
            let result = bad.parse::<Wire>().and_then(|w| w.resolve());
            assert!(
                matches!(result, Err(Error::MalformedConnection(_))),
                "{} should be malformed",
                bad
            );
        }
    }

    fn divider_builder() -> BlockBuilder {
        Block::builder()
            .port("in")
            .port("out")
            .child("R1", resistor(Ohms(1e3)))
            .child("R2", resistor(Ohms(1e3)))
            .connect("in.to.R1.left")
            .connect("R1.right.to.out")
            .connect("R1.right.to.R2.left")
            .connect("R2.right.to.Ground")
    }

    #[test]
    fn test_build_block() {
        let block = divider_builder().build().unwrap();
        assert_eq!(block.ports(), ["in", "out"]);
        assert_eq!(block.children().len(), 2);
        assert_eq!(block.connections().len(), 4);
        assert!(block.child("R2").unwrap().as_device().is_some());
    }

    #[test]
    fn test_unresolved_endpoint() {
        let err = divider_builder().connect("R3.left.to.out").build().unwrap_err();
        assert!(matches!(err, Error::UnresolvedEndpoint { ref endpoint, .. } if endpoint == "R3.left"));

        let err = divider_builder().connect("R1.middle.to.out").build().unwrap_err();
        assert!(matches!(err, Error::UnresolvedEndpoint { .. }));

        let err = divider_builder().connect("nowhere.to.out").build().unwrap_err();
        assert!(matches!(err, Error::UnresolvedEndpoint { .. }));
    }

    #[test]
    fn test_namespaces() {
        let err = Block::builder()
            .port("R1")
            .child("R1", resistor(Ohms(1.0)))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref n) if n == "R1"));

        let err = Block::builder().port(GROUND).build().unwrap_err();
        assert!(matches!(err, Error::ReservedName(_)));
    }

    #[test]
    fn test_floating_ports() {
        let err = Block::builder()
            .port("out")
            .child("V", dc_voltage(Volts(5.0)))
            .child("R", resistor(Ohms(1.0)))
            .connect("V.pos.to.R.left")
            .connect("V.neg.to.Ground")
            .build()
            .unwrap_err();
        match err {
            Error::FloatingPorts(ports) => assert_eq!(ports, ["out", "R.right"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_allow_floating() {
        let block = Block::builder()
            .child("V", dc_voltage(Volts(5.0)))
            .child("R", resistor(Ohms(1.0)))
            .connect("V.pos.to.R.left")
            .connect("V.neg.to.Ground")
            .allow_floating()
            .build();
        assert!(block.is_ok());
    }
}
