use std::collections::HashMap;

use ena::unify::{InPlaceUnificationTable, NoError, UnifyKey, UnifyValue};
use log::debug;

use crate::circuit::Component;
use crate::error::{Error, Result};
use crate::hierarchy::{Hierarchy, NodeKey, GROUND_KEY};

impl UnifyKey for NodeKey {
    type Value = NodeClass;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        NodeKey(u)
    }

    fn tag() -> &'static str {
        "NodeKey"
    }
}

/// Value carried by each union-find class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeClass {
    grounded: bool,
}

impl UnifyValue for NodeClass {
    type Error = NoError;

    fn unify_values(a: &Self, b: &Self) -> std::result::Result<Self, NoError> {
        Ok(NodeClass {
            grounded: a.grounded || b.grounded,
        })
    }
}

/// Canonical node id per [`NodeKey`]; keys never mentioned by a connection have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMap {
    ids: Vec<Option<u32>>,
}

impl NodeMap {
    pub fn get(&self, key: NodeKey) -> Option<u32> {
        self.ids.get(key.0 as usize).copied().flatten()
    }

    /// Number of distinct canonical ids, ground included.
    pub fn class_count(&self) -> usize {
        let mut ids: Vec<u32> = self.ids.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn is_grounded(&self, key: NodeKey) -> bool {
        self.get(key) == Some(0)
    }
}

/// Build the canonical node map for an elaborated hierarchy.
///
/// Classes are numbered in the order their ports first appear in the connections, then the
/// class holding ground is renumbered 0.
pub fn resolve(hierarchy: &Hierarchy) -> Result<NodeMap> {
    let mut table: InPlaceUnificationTable<NodeKey> = InPlaceUnificationTable::new();
    for i in 0..hierarchy.node_count() {
        let value = NodeClass {
            grounded: i == GROUND_KEY.0,
        };
        let key = table.new_key(value);
        debug_assert_eq!(key, NodeKey(i));
    }

    // Keys in order of first appearance in a connection.
    let mut seen = vec![false; hierarchy.node_count() as usize];
    let mut order = Vec::new();
    let mut edges = 0usize;

    for (id, instance) in hierarchy.instances() {
        let Component::Block(block) = instance.component else {
            continue;
        };
        for connection in block.connections() {
            let [a, b] = connection.endpoints().map(|e| {
                hierarchy.endpoint(id, e).ok_or_else(|| Error::UnresolvedEndpoint {
                    endpoint: e.to_string(),
                    reason: format!("not found in `{}`", display_path(&instance.path)),
                })
            });
            let (a, b) = (a?, b?);
            for key in [a, b] {
                if !seen[key.0 as usize] {
                    seen[key.0 as usize] = true;
                    order.push(key);
                }
            }
            table.union(a, b);
            edges += 1;
        }
    }

    if !seen[GROUND_KEY.0 as usize] {
        return Err(Error::NoGroundConnection);
    }

    let mut labels: HashMap<NodeKey, u32> = HashMap::new();
    let mut ids = vec![None; hierarchy.node_count() as usize];
    let mut next = 0;
    for key in &order {
        let root = table.find(*key);
        let label = *labels.entry(root).or_insert_with(|| {
            next += 1;
            next
        });
        ids[key.0 as usize] = Some(label);
    }

    // Ground's class is renumbered last so the numbering pass stays order-independent.
    let ground_label = ids[GROUND_KEY.0 as usize];
    for id in ids.iter_mut() {
        if id.is_some() && *id == ground_label {
            *id = Some(0);
        }
    }

    let map = NodeMap { ids };
    debug!(
        "resolved {} connections over {} ports into {} nodes",
        edges,
        order.len(),
        map.class_count()
    );
    debug_assert!(order.iter().all(|k| {
        let grounded = table.probe_value(*k).grounded;
        grounded == map.is_grounded(*k)
    }));
    Ok(map)
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}
