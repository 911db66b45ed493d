//! Execution runtime for weft graphs
//!
//! A graph built with `weftcore` is inert data; this crate runs it. The
//! runner executes flow inputs under one of three disciplines (synchronous,
//! suspendable, retained), the local store holds per-run values, and the
//! engine facade wires runners to an event bus and drives suspendable
//! executions on a tick interval.
//!
//! Execution is single-threaded by construction: a runner owns its store
//! outright and graphs are borrowed immutably for the duration of a call,
//! so there is no locking anywhere in the hot path.

mod coroutine;
mod engine;
mod flow;
mod resolve;
mod runner;
mod state;
mod store;
mod validate;

pub use coroutine::{CoroutineExecution, Step};
pub use engine::{Engine, EngineConfig};
pub use flow::FlowCtx;
pub use resolve::PortResolver;
pub use runner::{Discipline, Runner};
pub use store::LocalStore;
pub use validate::validate_graph;
