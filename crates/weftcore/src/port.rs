use crate::context::{Coroutine, FlowContext};
use crate::error::RunError;
use crate::node::NodeId;
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Graph-wide dense port index, assigned when the owning node is inserted.
/// Runners use it to address per-port arena slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSlot(pub u32);

impl PortSlot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable reference to a port: owning node plus dense slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub slot: PortSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    ValueInput,
    ValueOutput,
    FlowInput,
    FlowOutput,
}

impl PortKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ValueInput => "value input",
            Self::ValueOutput => "value output",
            Self::FlowInput => "flow input",
            Self::FlowOutput => "flow output",
        }
    }
}

/// Synchronous node body.
pub type FlowAction =
    Arc<dyn Fn(&mut dyn FlowContext) -> Result<(), RunError> + Send + Sync>;

/// Suspending node body: invoked once per activation to produce the
/// coroutine the trampoline will drive.
pub type CoroutineAction =
    Arc<dyn Fn(&mut dyn FlowContext) -> Result<Coroutine, RunError> + Send + Sync>;

/// Read accessor on a value output.
pub type Getter =
    Arc<dyn Fn(&mut dyn FlowContext) -> Result<Value, RunError> + Send + Sync>;

/// Write accessor on a value output.
pub type Setter =
    Arc<dyn Fn(&mut dyn FlowContext, Value) -> Result<(), RunError> + Send + Sync>;

/// Lifecycle hook on a flow input.
pub type Hook = Arc<dyn Fn(&mut dyn FlowContext) + Send + Sync>;

/// Data-carrying input. Holds a default used while unconnected; accepts at
/// most one incoming connection.
pub struct ValueInput {
    key: String,
    label: Option<String>,
    kind: ValueKind,
    pub(crate) default: Option<Value>,
    pub(crate) slot: PortSlot,
}

impl ValueInput {
    pub(crate) fn new(key: impl Into<String>, kind: ValueKind, default: Option<Value>) -> Self {
        Self {
            key: key.into(),
            label: None,
            kind,
            default,
            slot: PortSlot(u32::MAX),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name: the label override, or the key.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether a read can currently produce a value from the default alone.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn slot(&self) -> PortSlot {
        self.slot
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }
}

/// Data-carrying output with capability-gated accessors; fans out to any
/// number of inputs.
pub struct ValueOutput {
    key: String,
    label: Option<String>,
    kind: ValueKind,
    pub(crate) get: Option<Getter>,
    pub(crate) set: Option<Setter>,
    pub(crate) cached: bool,
    pub(crate) slot: PortSlot,
}

impl ValueOutput {
    pub(crate) fn new(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            label: None,
            kind,
            get: None,
            set: None,
            cached: false,
            slot: PortSlot(u32::MAX),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Whether pulled results are cached on the runner between reads.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn getter(&self) -> Option<Getter> {
        self.get.clone()
    }

    pub fn setter(&self) -> Option<Setter> {
        self.set.clone()
    }

    pub fn slot(&self) -> PortSlot {
        self.slot
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }
}

/// Control entry point for one node. At least one of the two actions must be
/// present; this is checked by graph validation.
pub struct FlowInput {
    key: String,
    label: Option<String>,
    pub(crate) action: Option<FlowAction>,
    pub(crate) coroutine: Option<CoroutineAction>,
    pub(crate) on_exit: Option<Hook>,
    pub(crate) on_stopped: Option<Hook>,
    pub(crate) slot: PortSlot,
}

impl FlowInput {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: None,
            action: None,
            coroutine: None,
            on_exit: None,
            on_stopped: None,
            slot: PortSlot(u32::MAX),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    /// Whether this input itself carries a suspending body.
    pub fn is_coroutine(&self) -> bool {
        self.coroutine.is_some()
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some() || self.coroutine.is_some()
    }

    pub fn action(&self) -> Option<FlowAction> {
        self.action.clone()
    }

    pub fn coroutine_action(&self) -> Option<CoroutineAction> {
        self.coroutine.clone()
    }

    pub fn exit_hook(&self) -> Option<Hook> {
        self.on_exit.clone()
    }

    pub fn stop_hook(&self) -> Option<Hook> {
        self.on_stopped.clone()
    }

    pub fn slot(&self) -> PortSlot {
        self.slot
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }
}

/// Control exit: at most one outgoing connection. Multiple logical
/// successors are distinct `FlowOutput` ports, never fan-out of one.
pub struct FlowOutput {
    key: String,
    label: Option<String>,
    pub(crate) slot: PortSlot,
}

impl FlowOutput {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: None,
            slot: PortSlot(u32::MAX),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    pub fn slot(&self) -> PortSlot {
        self.slot
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }
}
