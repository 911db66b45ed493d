use crate::error::RunError;
use crate::node::NodeId;
use crate::port::PortRef;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Terminal state of one flow activation.
///
/// `Running` is the computed in-flight state; a context only ever stores a
/// terminal value once it has fully finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Running,
    Success,
    Failure,
}

/// Non-local control transfer raised by a node body.
///
/// The first jump discovered while draining successors terminates the drain;
/// it propagates upward until some node body consumes it (a loop node eats
/// `Break`/`Continue`, a subgraph boundary eats `Return`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JumpSignal {
    Return,
    Break,
    Continue,
    Label(String),
}

/// What a coroutine body hands back on each resume.
pub enum Suspend {
    /// Suspend once; the external scheduler observes this value.
    Tick(Value),
    /// Terminal signal: success or failure. Consumed, never re-yielded.
    Done(bool),
    /// A nested coroutine whose yields are flattened into this stream.
    Nested(Coroutine),
    /// A batch of coroutines, flattened depth-first in order.
    Each(Vec<Coroutine>),
    /// Enter the flow input behind this reference as a nested activation.
    Enter(PortRef),
}

impl fmt::Debug for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspend::Tick(v) => f.debug_tuple("Tick").field(v).finish(),
            Suspend::Done(ok) => f.debug_tuple("Done").field(ok).finish(),
            Suspend::Nested(_) => f.write_str("Nested(..)"),
            Suspend::Each(cs) => write!(f, "Each({})", cs.len()),
            Suspend::Enter(p) => f.debug_tuple("Enter").field(p).finish(),
        }
    }
}

type CoroutineBody =
    Box<dyn FnMut(&mut dyn FlowContext) -> Result<Option<Suspend>, RunError> + Send>;

/// A resumable node body: each call does a slice of work and either suspends
/// or reports exhaustion (`Ok(None)`).
pub struct Coroutine {
    body: CoroutineBody,
}

impl Coroutine {
    pub fn new(
        body: impl FnMut(&mut dyn FlowContext) -> Result<Option<Suspend>, RunError> + Send + 'static,
    ) -> Self {
        Self {
            body: Box::new(body),
        }
    }

    /// A coroutine that yields each value once, in order, then exhausts.
    pub fn ticks<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        let mut iter = values.into_iter();
        Self::new(move |_| Ok(iter.next().map(Suspend::Tick)))
    }

    /// A coroutine that immediately signals completion.
    pub fn done(success: bool) -> Self {
        let mut fired = false;
        Self::new(move |_| {
            if fired {
                Ok(None)
            } else {
                fired = true;
                Ok(Some(Suspend::Done(success)))
            }
        })
    }

    pub fn resume(
        &mut self,
        ctx: &mut dyn FlowContext,
    ) -> Result<Option<Suspend>, RunError> {
        (self.body)(ctx)
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Coroutine(..)")
    }
}

/// The seam node bodies are written against.
///
/// Implemented by the runtime's flow interpreter; every accessor routes
/// through the live-port redirection layer and the runner's local value
/// store, so node code stays oblivious to hot reloads and disciplines.
pub trait FlowContext {
    /// The node currently being evaluated. Changes while an upstream value
    /// getter is pulled.
    fn node(&self) -> NodeId;

    fn state(&self) -> FlowState;

    fn set_state(&mut self, state: FlowState);

    /// Read a value input on the current node, pulling through its
    /// connection or falling back to the default.
    fn value(&mut self, input: &str) -> Result<Value, RunError>;

    /// Write through a value input to the connected output's set accessor.
    fn set_value(&mut self, input: &str, value: Value) -> Result<(), RunError>;

    /// Queue one of the current node's flow outputs as a successor.
    fn enqueue(&mut self, output: &str) -> Result<(), RunError>;

    /// Queue a flow input directly, bypassing any connection. Used for
    /// structural delegation (a composite node forwarding into its body).
    fn delegate(&mut self, target: PortRef) -> Result<(), RunError>;

    /// Raise a non-local control transfer.
    fn jump(&mut self, signal: JumpSignal);

    /// Consume the pending jump, if any.
    fn take_jump(&mut self) -> Option<JumpSignal>;

    /// Run the flow behind one of the current node's outputs to completion,
    /// synchronously, returning the jump it produced.
    fn trigger(&mut self, output: &str) -> Result<Option<JumpSignal>, RunError>;

    /// Fire-and-forget: the callee's completion and jump are not propagated.
    fn trigger_parallel(&mut self, output: &str) -> Result<(), RunError>;

    /// Obtain a suspension for the flow behind one of the current node's
    /// outputs, to be yielded from a coroutine body. Fails on regular flows.
    fn trigger_coroutine(&mut self, output: &str) -> Result<Suspend, RunError>;

    /// Per-node persistent value, optionally under a secondary key.
    fn local_get(&self, key: Option<&str>) -> Option<Value>;

    fn local_set(&mut self, key: Option<&str>, value: Value);

    /// Per-node typed scratch slot. Prefer [`element_or_default`] on
    /// `dyn FlowContext`.
    fn element(&mut self) -> &mut Option<Box<dyn Any + Send>>;
}

impl dyn FlowContext + '_ {
    /// Lazily-constructed typed scratch data for the current node.
    pub fn element_or_default<T: Default + Send + 'static>(&mut self) -> &mut T {
        let slot = self.element();
        let fresh = match slot {
            Some(existing) => !existing.is::<T>(),
            None => true,
        };
        if fresh {
            *slot = Some(Box::new(T::default()));
        }
        match slot.as_mut().and_then(|b| b.downcast_mut::<T>()) {
            Some(t) => t,
            // Just installed above, so the downcast cannot miss.
            None => unreachable!("element slot holds a freshly installed T"),
        }
    }
}
