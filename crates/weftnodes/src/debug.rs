//! Diagnostics nodes.

use weftcore::{Node, Value, ValueKind};

/// Logs the `message` value input at info level, then continues on `then`.
pub fn log() -> Node {
    Node::build("log")
        .value_input("message", ValueKind::Any, Value::Null)
        .flow_input("in", |ctx| {
            let message = ctx.value("message")?;
            tracing::info!(node = ?ctx.node(), message = ?message, "log node");
            ctx.enqueue("then")
        })
        .flow_output("then")
        .finish()
}
