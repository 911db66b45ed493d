//! Per-runner local value store.
//!
//! Dense arrays indexed by the graph's small integer node/port ids, owned
//! exclusively by one runner on one logical thread. No locking.

use std::any::Any;
use std::collections::HashMap;
use weftcore::{Graph, NodeId, PortSlot, Value};

#[derive(Default)]
struct NodeSlot {
    value: Option<Value>,
    keyed: HashMap<String, Value>,
    element: Option<Box<dyn Any + Send>>,
}

/// Cached local data for one execution mode: per-node values and scratch,
/// plus per-output-port cached pull results.
#[derive(Default)]
pub struct LocalStore {
    nodes: Vec<NodeSlot>,
    ports: Vec<Option<Value>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sized for a graph's current arenas. The store grows on demand
    /// afterwards, so live edits that add nodes stay safe.
    pub fn for_graph(graph: &Graph) -> Self {
        let mut store = Self::new();
        store.nodes.resize_with(graph.node_capacity(), NodeSlot::default);
        store.ports.resize(graph.port_capacity(), None);
        store
    }

    pub fn local_get(&self, node: NodeId, key: Option<&str>) -> Option<&Value> {
        let slot = self.nodes.get(node.index())?;
        match key {
            Some(k) => slot.keyed.get(k),
            None => slot.value.as_ref(),
        }
    }

    pub fn local_set(&mut self, node: NodeId, key: Option<&str>, value: Value) {
        let slot = self.node_slot(node);
        match key {
            Some(k) => {
                slot.keyed.insert(k.to_string(), value);
            }
            None => slot.value = Some(value),
        }
    }

    /// Typed scratch slot for a node; initialized lazily by callers.
    pub fn element_slot(&mut self, node: NodeId) -> &mut Option<Box<dyn Any + Send>> {
        &mut self.node_slot(node).element
    }

    pub fn port_cache(&self, slot: PortSlot) -> Option<&Value> {
        self.ports.get(slot.index()).and_then(|v| v.as_ref())
    }

    pub fn set_port_cache(&mut self, slot: PortSlot, value: Value) {
        if self.ports.len() <= slot.index() {
            self.ports.resize(slot.index() + 1, None);
        }
        self.ports[slot.index()] = Some(value);
    }

    pub fn clear_port_cache(&mut self) {
        for v in &mut self.ports {
            *v = None;
        }
    }

    /// Drop all cached data, as after a graph reload.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.ports.clear();
    }

    fn node_slot(&mut self, node: NodeId) -> &mut NodeSlot {
        if self.nodes.len() <= node.index() {
            self.nodes.resize_with(node.index() + 1, NodeSlot::default);
        }
        &mut self.nodes[node.index()]
    }
}
