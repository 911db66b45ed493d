//! Value-producing nodes backed by the runner's local store.

use std::sync::Arc;
use weftcore::{FlowContext, Node, Value, ValueKind};

/// Emits a fixed value on its `value` output.
pub fn literal(value: Value) -> Node {
    let kind = value.kind();
    Node::build("literal")
        .value_output("value", kind, move |_| Ok(value.clone()))
        .finish()
}

/// A mutable storage cell. Reading `value` yields the stored value (or
/// `initial` before the first write); the output is also settable, so other
/// nodes can write through a connection. The `assign` flow input stores the
/// `source` value input and continues on `then`.
pub fn variable(kind: ValueKind, initial: Value) -> Node {
    let fallback = initial.clone();
    Node::build("variable")
        .value_input_required("source", kind)
        .value_output_with(
            "value",
            kind,
            Some(Arc::new(move |ctx: &mut dyn FlowContext| {
                Ok(ctx.local_get(None).unwrap_or_else(|| fallback.clone()))
            })),
            Some(Arc::new(|ctx: &mut dyn FlowContext, value: Value| {
                ctx.local_set(None, value);
                Ok(())
            })),
        )
        .flow_input("assign", |ctx| {
            let value = ctx.value("source")?;
            ctx.local_set(None, value);
            ctx.enqueue("then")
        })
        .flow_output("then")
        .finish()
}

/// Counts how many times `bump` has fired, exposing the total on `count`.
pub fn counter() -> Node {
    Node::build("counter")
        .value_output("count", ValueKind::Int, |ctx| {
            Ok(Value::Int(*ctx.element_or_default::<i64>()))
        })
        .flow_input("bump", |ctx| {
            *ctx.element_or_default::<i64>() += 1;
            ctx.enqueue("then")
        })
        .flow_output("then")
        .finish()
}
