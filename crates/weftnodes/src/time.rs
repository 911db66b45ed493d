//! Suspension nodes. These require a coroutine or state runner.

use weftcore::{Coroutine, Node, RunError, Suspend, Value, ValueKind};

/// Suspends for `ticks` scheduler ticks, surfacing the remaining count on
/// each suspension, then continues on `then`.
pub fn wait_ticks() -> Node {
    Node::build("wait")
        .value_input("ticks", ValueKind::Int, 1i64)
        .flow_input_coroutine("in", |ctx| {
            let mut remaining = ctx.value("ticks")?.as_int().ok_or_else(|| {
                RunError::Other("wait ticks must be an int".to_string())
            })?;
            Ok(Coroutine::new(move |ctx| {
                if remaining > 0 {
                    remaining -= 1;
                    Ok(Some(Suspend::Tick(Value::Int(remaining))))
                } else {
                    ctx.enqueue("then")?;
                    Ok(None)
                }
            }))
        })
        .flow_output("then")
        .finish()
}
