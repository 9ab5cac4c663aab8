use crate::circuit::{Component, Endpoint};

/// Identity of one electrical terminal before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

/// The synthetic ground terminal. Always key 0.
pub const GROUND_KEY: NodeKey = NodeKey(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

#[derive(Debug, Clone)]
pub struct Instance<'a> {
    /// Key under which the parent declared this instance; `None` for the root.
    pub key: Option<&'a str>,
    /// Dotted path from the root, empty for the root itself.
    pub path: String,
    pub component: &'a Component,
    /// One key per entry of `component.ports()`.
    pub ports: Vec<NodeKey>,
    /// Child instances in declaration order.
    pub children: Vec<InstanceId>,
}

impl<'a> Instance<'a> {
    pub fn port(&self, name: &str) -> Option<NodeKey> {
        self.component
            .ports()
            .iter()
            .position(|p| p == name)
            .map(|i| self.ports[i])
    }
}

#[derive(Debug, Clone)]
pub struct Hierarchy<'a> {
    instances: Vec<Instance<'a>>,
    node_count: u32,
}

impl<'a> Hierarchy<'a> {
    pub fn elaborate(root: &'a Component) -> Self {
        let mut hierarchy = Hierarchy {
            instances: Vec::new(),
            node_count: 1,
        };
        hierarchy.visit(root, None, String::new());
        hierarchy
    }

    fn visit(&mut self, component: &'a Component, key: Option<&'a str>, path: String) -> InstanceId {
        let id = InstanceId(self.instances.len());
        let ports = component
            .ports()
            .iter()
            .map(|_| {
                let k = NodeKey(self.node_count);
                self.node_count += 1;
                k
            })
            .collect();
        self.instances.push(Instance {
            key,
            path: path.clone(),
            component,
            ports,
            children: Vec::new(),
        });

        if let Component::Block(block) = component {
            for (name, child) in block.children() {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                let child_id = self.visit(child, Some(name.as_str()), child_path);
                self.instances[id.0].children.push(child_id);
            }
        }
        id
    }

    pub fn root(&self) -> InstanceId {
        InstanceId(0)
    }

    pub fn instance(&self, id: InstanceId) -> &Instance<'a> {
        &self.instances[id.0]
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance<'a>)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstanceId(i), inst))
    }

    /// Number of node keys, ground included.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// The child instance declared under `name` inside `parent`.
    pub fn child(&self, parent: InstanceId, name: &str) -> Option<InstanceId> {
        self.instance(parent)
            .children
            .iter()
            .copied()
            .find(|c| self.instance(*c).key == Some(name))
    }

    /// Map an endpoint of a block's connection to a node key.
    pub fn endpoint(&self, block: InstanceId, endpoint: &Endpoint) -> Option<NodeKey> {
        match endpoint {
            Endpoint::Ground => Some(GROUND_KEY),
            Endpoint::Port(port) => self.instance(block).port(port),
            Endpoint::Child { child, port } => {
                let child = self.child(block, child)?;
                self.instance(child).port(port)
            }
        }
    }

    /// Look up the node key of a dotted port path such as `D.R1.left`.
    pub fn port_path(&self, path: &str) -> Option<NodeKey> {
        let mut parts: Vec<&str> = path.split('.').collect();
        let port = parts.pop()?;
        let mut current = self.root();
        for name in parts {
            current = self.child(current, name)?;
        }
        self.instance(current).port(port)
    }
}
