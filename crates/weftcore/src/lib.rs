//! Core abstractions for the weft graph engine
//!
//! This crate provides the data model every other component depends on:
//! dynamic values, typed ports with their build-time bound behaviors, the
//! arena graph with its connect rules, and the `FlowContext` seam node
//! bodies are written against. It knows nothing about how flows are driven;
//! that lives in `weftruntime`.

mod connection;
mod context;
mod error;
pub mod events;
mod graph;
mod node;
mod port;
mod value;

pub use context::{Coroutine, FlowContext, FlowState, JumpSignal, Suspend};
pub use error::{GraphError, RunError, WeftError};
pub use events::{EventBus, ExecutionEvent, ExecutionId, Telemetry};
pub use graph::{FlowLink, Graph, ValueLink};
pub use node::{Node, NodeBuilder, NodeId};
pub use port::{
    CoroutineAction, FlowAction, FlowInput, FlowOutput, Getter, Hook, PortKind, PortRef,
    PortSlot, Setter, ValueInput, ValueOutput,
};
pub use value::{Value, ValueKind};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, WeftError>;
