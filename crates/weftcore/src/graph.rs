use crate::error::GraphError;
use crate::node::{Node, NodeId};
use crate::port::{FlowInput, FlowOutput, PortKind, PortRef, PortSlot, ValueInput, ValueOutput};
use std::collections::HashSet;

/// Where a dense port slot points: owning node, port kind, and the index
/// into the node's per-kind vec.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PortLoc {
    pub node: NodeId,
    pub kind: PortKind,
    pub index: usize,
}

/// A value edge: exactly one output feeding exactly one input. Outputs may
/// appear in many links (fan-out); inputs in at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLink {
    pub output: PortRef,
    pub input: PortRef,
}

/// A flow edge: carries control only. Outputs appear in at most one link
/// (single successor); inputs may be targeted by many outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowLink {
    pub output: PortRef,
    pub input: PortRef,
}

/// Arena-backed node graph. Nodes and ports get dense integer ids on
/// insertion; removed nodes leave a tombstone so stale references are
/// detectable instead of aliasing a new node.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    pub(crate) ports: Vec<PortLoc>,
    pub(crate) value_links: Vec<ValueLink>,
    pub(crate) flow_links: Vec<FlowLink>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let mut register = |kind: PortKind, index: usize| {
            let slot = PortSlot(self.ports.len() as u32);
            self.ports.push(PortLoc {
                node: id,
                kind,
                index,
            });
            slot
        };
        for (i, p) in node.value_inputs.iter_mut().enumerate() {
            p.slot = register(PortKind::ValueInput, i);
        }
        for (i, p) in node.value_outputs.iter_mut().enumerate() {
            p.slot = register(PortKind::ValueOutput, i);
        }
        for (i, p) in node.flow_inputs.iter_mut().enumerate() {
            p.slot = register(PortKind::FlowInput, i);
        }
        for (i, p) in node.flow_outputs.iter_mut().enumerate() {
            p.slot = register(PortKind::FlowOutput, i);
        }
        tracing::debug!(node = %node.name, id = id.0, "adding node");
        self.nodes.push(Some(node));
        id
    }

    /// Remove a node, pruning every link that touches it. Its ports become
    /// stale; evaluation of a stale reference goes through the redirection
    /// layer instead of failing hard.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::NodeNotFound(id))?;
        let node = slot.take().ok_or(GraphError::NodeNotFound(id))?;
        self.value_links
            .retain(|l| l.output.node != id && l.input.node != id);
        self.flow_links
            .retain(|l| l.output.node != id && l.input.node != id);
        tracing::debug!(node = %node.name, id = id.0, "removed node");
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_mut())
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or("<removed>")
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// Arena sizes, used by runners to pre-size their stores.
    pub fn node_capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn port_capacity(&self) -> usize {
        self.ports.len()
    }

    /// A port is live while its owning node is alive and the slot still
    /// belongs to it.
    pub fn port_live(&self, port: PortRef) -> bool {
        match self.ports.get(port.slot.index()) {
            Some(loc) => loc.node == port.node && self.node(port.node).is_some(),
            None => false,
        }
    }

    pub fn port_kind(&self, port: PortRef) -> Option<PortKind> {
        self.ports
            .get(port.slot.index())
            .filter(|loc| loc.node == port.node)
            .map(|loc| loc.kind)
    }

    /// Port key for diagnostics; tolerates stale references.
    pub fn port_key(&self, port: PortRef) -> &str {
        let Some(loc) = self.ports.get(port.slot.index()) else {
            return "<unknown>";
        };
        let Some(node) = self.node(loc.node) else {
            return "<removed>";
        };
        match loc.kind {
            PortKind::ValueInput => node.value_inputs.get(loc.index).map(ValueInput::key),
            PortKind::ValueOutput => node.value_outputs.get(loc.index).map(ValueOutput::key),
            PortKind::FlowInput => node.flow_inputs.get(loc.index).map(FlowInput::key),
            PortKind::FlowOutput => node.flow_outputs.get(loc.index).map(FlowOutput::key),
        }
        .unwrap_or("<unknown>")
    }

    // Key-based lookups, the public way to name a port.

    pub fn value_input(&self, node: NodeId, key: &str) -> Result<PortRef, GraphError> {
        let n = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        n.value_input(key)
            .map(|p| PortRef { node, slot: p.slot() })
            .ok_or_else(|| GraphError::PortNotFound {
                node,
                port: key.to_string(),
            })
    }

    pub fn value_output(&self, node: NodeId, key: &str) -> Result<PortRef, GraphError> {
        let n = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        n.value_output(key)
            .map(|p| PortRef { node, slot: p.slot() })
            .ok_or_else(|| GraphError::PortNotFound {
                node,
                port: key.to_string(),
            })
    }

    pub fn flow_input(&self, node: NodeId, key: &str) -> Result<PortRef, GraphError> {
        let n = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        n.flow_input(key)
            .map(|p| PortRef { node, slot: p.slot() })
            .ok_or_else(|| GraphError::PortNotFound {
                node,
                port: key.to_string(),
            })
    }

    pub fn flow_output(&self, node: NodeId, key: &str) -> Result<PortRef, GraphError> {
        let n = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        n.flow_output(key)
            .map(|p| PortRef { node, slot: p.slot() })
            .ok_or_else(|| GraphError::PortNotFound {
                node,
                port: key.to_string(),
            })
    }

    // Slot-based typed accessors.

    pub fn value_input_at(&self, port: PortRef) -> Result<&ValueInput, GraphError> {
        let loc = self.loc(port, PortKind::ValueInput)?;
        self.node(loc.node)
            .and_then(|n| n.value_inputs.get(loc.index))
            .ok_or(GraphError::Detached { port })
    }

    pub(crate) fn value_input_at_mut(
        &mut self,
        port: PortRef,
    ) -> Result<&mut ValueInput, GraphError> {
        let loc = self.loc(port, PortKind::ValueInput)?;
        self.node_mut(loc.node)
            .and_then(|n| n.value_inputs.get_mut(loc.index))
            .ok_or(GraphError::Detached { port })
    }

    pub fn value_output_at(&self, port: PortRef) -> Result<&ValueOutput, GraphError> {
        let loc = self.loc(port, PortKind::ValueOutput)?;
        self.node(loc.node)
            .and_then(|n| n.value_outputs.get(loc.index))
            .ok_or(GraphError::Detached { port })
    }

    pub fn flow_input_at(&self, port: PortRef) -> Result<&FlowInput, GraphError> {
        let loc = self.loc(port, PortKind::FlowInput)?;
        self.node(loc.node)
            .and_then(|n| n.flow_inputs.get(loc.index))
            .ok_or(GraphError::Detached { port })
    }

    pub fn flow_output_at(&self, port: PortRef) -> Result<&FlowOutput, GraphError> {
        let loc = self.loc(port, PortKind::FlowOutput)?;
        self.node(loc.node)
            .and_then(|n| n.flow_outputs.get(loc.index))
            .ok_or(GraphError::Detached { port })
    }

    fn loc(&self, port: PortRef, expect: PortKind) -> Result<PortLoc, GraphError> {
        let loc = self
            .ports
            .get(port.slot.index())
            .copied()
            .filter(|l| l.node == port.node)
            .ok_or(GraphError::Detached { port })?;
        if loc.kind != expect {
            return Err(GraphError::KindMismatch(loc.kind.name(), expect.name()));
        }
        Ok(loc)
    }

    /// True if this flow input, or any flow input transitively reachable
    /// from its node's successors, carries a coroutine body.
    pub fn is_coroutine(&self, entry: PortRef) -> bool {
        if self
            .flow_input_at(entry)
            .map(FlowInput::is_coroutine)
            .unwrap_or(false)
        {
            return true;
        }
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut pending = vec![entry.node];
        while let Some(node) = pending.pop() {
            if !visited.insert(node) {
                continue;
            }
            for link in self.flow_links.iter().filter(|l| l.output.node == node) {
                if self
                    .flow_input_at(link.input)
                    .map(FlowInput::is_coroutine)
                    .unwrap_or(false)
                {
                    return true;
                }
                pending.push(link.input.node);
            }
        }
        false
    }

    pub fn value_links(&self) -> &[ValueLink] {
        &self.value_links
    }

    pub fn flow_links(&self) -> &[FlowLink] {
        &self.flow_links
    }
}
