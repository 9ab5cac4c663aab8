use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::circuit::Component;
use crate::hierarchy::{Hierarchy, InstanceId};
use crate::netlist::InstanceNames;
use crate::rawfile::RawTable;
use crate::resolver::NodeMap;

/// Simulated series arranged like the component tree that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTree {
    /// Instance name in the netlist; set for devices only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Voltage series of each port.
    pub ports: BTreeMap<String, Vec<f64>>,
    /// Measured device parameters, e.g. `i` or `vgs`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Vec<f64>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ResultTree>,
}

impl ResultTree {
    /// The subtree at a dotted child path; `""` is the tree itself.
    pub fn get(&self, path: &str) -> Option<&ResultTree> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |node, name| node.children.get(name))
    }

    /// A single series by dotted path, e.g. `D.R1.left` or `D.R1.i`. Ports shadow parameters.
    pub fn signal(&self, path: &str) -> Option<&[f64]> {
        let (node, name) = match path.rsplit_once('.') {
            Some((prefix, name)) => (self.get(prefix)?, name),
            None => (self, path),
        };
        node.ports
            .get(name)
            .or_else(|| node.parameters.get(name))
            .map(Vec::as_slice)
    }

    pub fn is_device(&self) -> bool {
        self.device_name.is_some()
    }

    /// Every device subtree with its dotted path, depth first.
    pub fn devices(&self) -> impl Iterator<Item = (String, &ResultTree)> {
        let mut out = Vec::new();
        self.collect_devices(String::new(), &mut out);
        out.into_iter()
    }

    fn collect_devices<'a>(&'a self, path: String, out: &mut Vec<(String, &'a ResultTree)>) {
        if self.is_device() {
            out.push((path.clone(), self));
        }
        for (name, child) in &self.children {
            child.collect_devices(join(&path, name), out);
        }
    }

    /// All series flattened to `(dotted path, series)`, depth first.
    pub fn signals(&self) -> Vec<(String, &[f64])> {
        let mut out = Vec::new();
        self.collect_signals("", &mut out);
        out
    }

    fn collect_signals<'a>(&'a self, path: &str, out: &mut Vec<(String, &'a [f64])>) {
        for (name, series) in self.ports.iter().chain(&self.parameters) {
            out.push((join(path, name), series.as_slice()));
        }
        for (name, child) in &self.children {
            child.collect_signals(&join(path, name), out);
        }
    }

    /// Sample count shared by every series; 0 for a tree without any.
    pub fn points(&self) -> usize {
        self.ports
            .values()
            .chain(self.parameters.values())
            .map(Vec::len)
            .next()
            .or_else(|| {
                self.children
                    .values()
                    .map(ResultTree::points)
                    .find(|&n| n > 0)
            })
            .unwrap_or(0)
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

/// Rebuild the result tree for `hierarchy` from a parsed table.
///
/// Ports on ground get an all-zero series. Ports that were never connected, and parameters the
/// table does not report, are left out.
pub fn project(
    hierarchy: &Hierarchy,
    nodes: &NodeMap,
    names: &InstanceNames,
    table: &RawTable,
) -> ResultTree {
    let tree = project_instance(hierarchy, nodes, names, table, hierarchy.root());
    debug!(
        "projected {} signals over {} points",
        tree.signals().len(),
        table.points()
    );
    tree
}

fn project_instance(
    hierarchy: &Hierarchy,
    nodes: &NodeMap,
    names: &InstanceNames,
    table: &RawTable,
    id: InstanceId,
) -> ResultTree {
    let instance = hierarchy.instance(id);
    let mut tree = ResultTree::default();

    for (port, key) in instance.component.ports().iter().zip(&instance.ports) {
        let series = match nodes.get(*key) {
            Some(0) => Some(vec![0.0; table.points()]),
            Some(node) => table.node(node).map(<[f64]>::to_vec),
            None => None,
        };
        if let Some(series) = series {
            tree.ports.insert(port.clone(), series);
        }
    }

    match instance.component {
        Component::Device(device) => {
            if let Some(name) = names.get(id) {
                for param in device.parameters() {
                    if let Some(series) = table.device_param(name, param) {
                        tree.parameters.insert(param.clone(), series.to_vec());
                    }
                }
                tree.device_name = Some(name.to_string());
            }
        }
        Component::Block(_) => {
            for child in &instance.children {
                let key = hierarchy.instance(*child).key.unwrap_or_default();
                let subtree = project_instance(hierarchy, nodes, names, table, *child);
                tree.children.insert(key.to_string(), subtree);
            }
        }
    }
    tree
}
