use crate::context::{Coroutine, FlowContext};
use crate::error::RunError;
use crate::port::{FlowInput, FlowOutput, Getter, Setter, ValueInput, ValueOutput};
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dense arena index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One unit of the graph: a named bundle of ports, each bound at build time
/// to the closure implementing its behavior.
pub struct Node {
    pub name: String,
    pub(crate) value_inputs: Vec<ValueInput>,
    pub(crate) value_outputs: Vec<ValueOutput>,
    pub(crate) flow_inputs: Vec<FlowInput>,
    pub(crate) flow_outputs: Vec<FlowOutput>,
}

impl Node {
    pub fn build(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            node: Node {
                name: name.into(),
                value_inputs: Vec::new(),
                value_outputs: Vec::new(),
                flow_inputs: Vec::new(),
                flow_outputs: Vec::new(),
            },
        }
    }

    pub fn value_inputs(&self) -> &[ValueInput] {
        &self.value_inputs
    }

    pub fn value_outputs(&self) -> &[ValueOutput] {
        &self.value_outputs
    }

    pub fn flow_inputs(&self) -> &[FlowInput] {
        &self.flow_inputs
    }

    pub fn flow_outputs(&self) -> &[FlowOutput] {
        &self.flow_outputs
    }

    pub(crate) fn value_input(&self, key: &str) -> Option<&ValueInput> {
        self.value_inputs.iter().find(|p| p.key() == key)
    }

    pub(crate) fn value_output(&self, key: &str) -> Option<&ValueOutput> {
        self.value_outputs.iter().find(|p| p.key() == key)
    }

    pub(crate) fn flow_input(&self, key: &str) -> Option<&FlowInput> {
        self.flow_inputs.iter().find(|p| p.key() == key)
    }

    pub(crate) fn flow_output(&self, key: &str) -> Option<&FlowOutput> {
        self.flow_outputs.iter().find(|p| p.key() == key)
    }

    pub fn port_count(&self) -> usize {
        self.value_inputs.len()
            + self.value_outputs.len()
            + self.flow_inputs.len()
            + self.flow_outputs.len()
    }
}

/// Builder for node declarations. Port keys must be unique within the node;
/// hook attachment panics on an unknown flow input since that is a
/// programming error in the node catalog, not a runtime condition.
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    /// Value input with a concrete default.
    pub fn value_input(
        mut self,
        key: impl Into<String>,
        kind: ValueKind,
        default: impl Into<Value>,
    ) -> Self {
        self.node
            .value_inputs
            .push(ValueInput::new(key, kind, Some(default.into())));
        self
    }

    /// Value input with no default: reading it while unconnected fails.
    pub fn value_input_required(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        self.node.value_inputs.push(ValueInput::new(key, kind, None));
        self
    }

    /// Read-only value output.
    pub fn value_output(
        mut self,
        key: impl Into<String>,
        kind: ValueKind,
        get: impl Fn(&mut dyn FlowContext) -> Result<Value, RunError> + Send + Sync + 'static,
    ) -> Self {
        let mut port = ValueOutput::new(key, kind);
        port.get = Some(Arc::new(get));
        self.node.value_outputs.push(port);
        self
    }

    /// Read-only value output whose pulled result is cached on the runner.
    pub fn value_output_cached(
        mut self,
        key: impl Into<String>,
        kind: ValueKind,
        get: impl Fn(&mut dyn FlowContext) -> Result<Value, RunError> + Send + Sync + 'static,
    ) -> Self {
        let mut port = ValueOutput::new(key, kind);
        port.get = Some(Arc::new(get));
        port.cached = true;
        self.node.value_outputs.push(port);
        self
    }

    /// Write-only value output.
    pub fn value_output_settable(
        mut self,
        key: impl Into<String>,
        kind: ValueKind,
        set: impl Fn(&mut dyn FlowContext, Value) -> Result<(), RunError> + Send + Sync + 'static,
    ) -> Self {
        let mut port = ValueOutput::new(key, kind);
        port.set = Some(Arc::new(set));
        self.node.value_outputs.push(port);
        self
    }

    /// Value output with explicit accessors; either may be `None`.
    pub fn value_output_with(
        mut self,
        key: impl Into<String>,
        kind: ValueKind,
        get: Option<Getter>,
        set: Option<Setter>,
    ) -> Self {
        let mut port = ValueOutput::new(key, kind);
        port.get = get;
        port.set = set;
        self.node.value_outputs.push(port);
        self
    }

    /// Flow input with a synchronous body.
    pub fn flow_input(
        mut self,
        key: impl Into<String>,
        action: impl Fn(&mut dyn FlowContext) -> Result<(), RunError> + Send + Sync + 'static,
    ) -> Self {
        let mut port = FlowInput::new(key);
        port.action = Some(Arc::new(action));
        self.node.flow_inputs.push(port);
        self
    }

    /// Flow input with a suspending body.
    pub fn flow_input_coroutine(
        mut self,
        key: impl Into<String>,
        coroutine: impl Fn(&mut dyn FlowContext) -> Result<Coroutine, RunError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let mut port = FlowInput::new(key);
        port.coroutine = Some(Arc::new(coroutine));
        self.node.flow_inputs.push(port);
        self
    }

    pub fn flow_output(mut self, key: impl Into<String>) -> Self {
        self.node.flow_outputs.push(FlowOutput::new(key));
        self
    }

    /// Completion hook on an existing flow input. Fires on natural
    /// completion only, never from a forced stop.
    ///
    /// # Panics
    /// If `key` names no flow input added so far.
    pub fn on_exit(
        mut self,
        key: &str,
        hook: impl Fn(&mut dyn FlowContext) + Send + Sync + 'static,
    ) -> Self {
        self.flow_input_mut(key).on_exit = Some(Arc::new(hook));
        self
    }

    /// Forced-stop hook on an existing flow input. Fires from `stop` only.
    ///
    /// # Panics
    /// If `key` names no flow input added so far.
    pub fn on_stopped(
        mut self,
        key: &str,
        hook: impl Fn(&mut dyn FlowContext) + Send + Sync + 'static,
    ) -> Self {
        self.flow_input_mut(key).on_stopped = Some(Arc::new(hook));
        self
    }

    /// Display label override for any port.
    ///
    /// # Panics
    /// If `key` names no port added so far.
    pub fn labeled(mut self, key: &str, label: impl Into<String>) -> Self {
        let label = label.into();
        let n = &mut self.node;
        if let Some(p) = n.value_inputs.iter_mut().find(|p| p.key() == key) {
            p.set_label(label);
        } else if let Some(p) = n.value_outputs.iter_mut().find(|p| p.key() == key) {
            p.set_label(label);
        } else if let Some(p) = n.flow_inputs.iter_mut().find(|p| p.key() == key) {
            p.set_label(label);
        } else if let Some(p) = n.flow_outputs.iter_mut().find(|p| p.key() == key) {
            p.set_label(label);
        } else {
            panic!("no port '{key}' on node '{}'", n.name);
        }
        self
    }

    pub fn finish(self) -> Node {
        self.node
    }

    fn flow_input_mut(&mut self, key: &str) -> &mut FlowInput {
        let name = self.node.name.clone();
        self.node
            .flow_inputs
            .iter_mut()
            .find(|p| p.key() == key)
            .unwrap_or_else(|| panic!("no flow input '{key}' on node '{name}'"))
    }
}
