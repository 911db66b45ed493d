//! Standard node catalog for weft graphs
//!
//! Constructors here return plain [`weftcore::Node`] values; hosts add them
//! to a graph, wire them, and run them with `weftruntime`. They double as
//! the reference examples for writing custom nodes.

pub mod control;
pub mod data;
pub mod debug;
pub mod time;

pub use control::{branch, break_node, continue_node, repeat, return_node, sequence};
pub use data::{counter, literal, variable};
pub use debug::log;
pub use time::wait_ticks;
