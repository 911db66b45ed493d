//! Connect/disconnect rules and connection traversal.
//!
//! Value edges enforce at-most-one on the input side; flow edges enforce
//! at-most-one on the output side (single successor). Both reject self-loops
//! at connect time since a self-edge could recurse into the node being
//! evaluated.

use crate::error::GraphError;
use crate::graph::{FlowLink, Graph, ValueLink};
use crate::node::NodeId;
use crate::port::{PortKind, PortRef};

impl Graph {
    /// Pair two ports, normalizing argument order: callers may pass
    /// (input, output) or (output, input). Fails unless the pairing is
    /// value/value or flow/flow.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<(), GraphError> {
        let ka = self.live_kind(a)?;
        let kb = self.live_kind(b)?;
        match (ka, kb) {
            (PortKind::ValueOutput, PortKind::ValueInput) => self.connect_value(a, b),
            (PortKind::ValueInput, PortKind::ValueOutput) => self.connect_value(b, a),
            (PortKind::FlowOutput, PortKind::FlowInput) => self.connect_flow(a, b),
            (PortKind::FlowInput, PortKind::FlowOutput) => self.connect_flow(b, a),
            _ => Err(GraphError::KindMismatch(ka.name(), kb.name())),
        }
    }

    /// Register a value edge. Clears any existing connection on the input
    /// and drops the input's default; while connected, the connection is the
    /// only source of truth.
    pub fn connect_value(&mut self, output: PortRef, input: PortRef) -> Result<(), GraphError> {
        if output.node == input.node {
            return Err(GraphError::SelfLoop { node: output.node });
        }
        let out_kind = self.value_output_at(output)?.kind();
        let in_port = self.value_input_at(input)?;
        if !in_port.kind().accepts(out_kind) {
            return Err(GraphError::TypeMismatch {
                output: out_kind,
                input: in_port.kind(),
            });
        }
        self.value_links.retain(|l| l.input != input);
        self.value_input_at_mut(input)?.default = None;
        self.value_links.push(ValueLink { output, input });
        Ok(())
    }

    /// Register a flow edge. Clears any existing connection on the output
    /// side first, keeping flow single-successor.
    pub fn connect_flow(&mut self, output: PortRef, input: PortRef) -> Result<(), GraphError> {
        if output.node == input.node {
            return Err(GraphError::SelfLoop { node: output.node });
        }
        self.flow_output_at(output)?;
        self.flow_input_at(input)?;
        self.flow_links.retain(|l| l.output != output);
        self.flow_links.push(FlowLink { output, input });
        Ok(())
    }

    /// Unregister the value edge feeding `input`, restoring a
    /// type-compatible zero default so the input remains evaluable. The
    /// original literal is not restored.
    pub fn disconnect_value(&mut self, input: PortRef) -> Result<(), GraphError> {
        let before = self.value_links.len();
        self.value_links.retain(|l| l.input != input);
        if self.value_links.len() != before {
            let port = self.value_input_at_mut(input)?;
            port.default = Some(port.kind().zero());
        }
        Ok(())
    }

    /// Unregister the flow edge leaving `output`.
    pub fn disconnect_flow(&mut self, output: PortRef) -> Result<(), GraphError> {
        self.flow_output_at(output)?;
        self.flow_links.retain(|l| l.output != output);
        Ok(())
    }

    /// The single value output feeding this input, if connected. More than
    /// one edge here means the single-connection invariant was violated and
    /// is reported rather than silently picking one.
    pub fn value_source(&self, input: PortRef) -> Result<Option<PortRef>, GraphError> {
        let mut found = None;
        for link in self.value_links.iter().filter(|l| l.input == input) {
            if found.is_some() {
                return Err(GraphError::MultipleConnections { port: input });
            }
            found = Some(link.output);
        }
        Ok(found)
    }

    /// The single flow input this output continues into, if connected.
    pub fn flow_target(&self, output: PortRef) -> Result<Option<PortRef>, GraphError> {
        let mut found = None;
        for link in self.flow_links.iter().filter(|l| l.output == output) {
            if found.is_some() {
                return Err(GraphError::MultipleConnections { port: output });
            }
            found = Some(link.input);
        }
        Ok(found)
    }

    /// Node owning the port a traversal lands on.
    pub fn value_source_node(&self, input: PortRef) -> Result<Option<NodeId>, GraphError> {
        Ok(self.value_source(input)?.map(|p| p.node))
    }

    pub fn flow_target_node(&self, output: PortRef) -> Result<Option<NodeId>, GraphError> {
        Ok(self.flow_target(output)?.map(|p| p.node))
    }

    /// All inputs fed by this output (fan-out).
    pub fn value_destinations(&self, output: PortRef) -> Vec<PortRef> {
        self.value_links
            .iter()
            .filter(|l| l.output == output)
            .map(|l| l.input)
            .collect()
    }

    /// A value input is assigned when its default is concrete or a valid
    /// connection feeds it.
    pub fn is_assigned(&self, input: PortRef) -> Result<bool, GraphError> {
        if self.value_input_at(input)?.has_default() {
            return Ok(true);
        }
        match self.value_source(input)? {
            Some(src) => Ok(self.port_live(src)),
            None => Ok(false),
        }
    }

    fn live_kind(&self, port: PortRef) -> Result<PortKind, GraphError> {
        if !self.port_live(port) {
            return Err(GraphError::Detached { port });
        }
        self.port_kind(port).ok_or(GraphError::Detached { port })
    }
}
