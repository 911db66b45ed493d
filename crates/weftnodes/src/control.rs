//! Control-flow nodes: sequencing, branching, loops, and jump emitters.

use weftcore::{JumpSignal, Node, RunError, Value, ValueKind};

/// Runs `steps` flow outputs (`then_0` .. `then_{steps-1}`) in order when
/// `in` fires. A jump raised by any step skips the remaining ones.
pub fn sequence(steps: usize) -> Node {
    let keys: Vec<String> = (0..steps).map(|i| format!("then_{i}")).collect();
    let queued = keys.clone();
    let mut builder = Node::build("sequence").flow_input("in", move |ctx| {
        for key in &queued {
            ctx.enqueue(key)?;
        }
        Ok(())
    });
    for key in &keys {
        builder = builder.flow_output(key.clone());
    }
    builder.finish()
}

/// Routes `in` to the `true` or `false` flow output depending on the
/// `condition` value input.
pub fn branch() -> Node {
    Node::build("branch")
        .value_input("condition", ValueKind::Bool, false)
        .flow_input("in", |ctx| {
            let condition = ctx.value("condition")?.as_bool().unwrap_or(false);
            ctx.enqueue(if condition { "true" } else { "false" })
        })
        .flow_output("true")
        .flow_output("false")
        .finish()
}

/// Runs `body` `count` times, then `done`. The current iteration is exposed
/// on the `index` value output. A `Break` jump from the body ends the loop
/// early and a `Continue` jump moves to the next iteration; both are
/// consumed here. Any other jump aborts the loop and propagates.
pub fn repeat() -> Node {
    Node::build("repeat")
        .value_input("count", ValueKind::Int, 0i64)
        .value_output("index", ValueKind::Int, |ctx| {
            Ok(ctx.local_get(Some("index")).unwrap_or(Value::Int(0)))
        })
        .flow_input("in", |ctx| {
            let count = ctx.value("count")?.as_int().ok_or_else(|| {
                RunError::Other("repeat count must be an int".to_string())
            })?;
            for i in 0..count {
                ctx.local_set(Some("index"), Value::Int(i));
                match ctx.trigger("body")? {
                    Some(JumpSignal::Break) => break,
                    Some(JumpSignal::Continue) | None => {}
                    Some(other) => {
                        ctx.jump(other);
                        return Ok(());
                    }
                }
            }
            ctx.enqueue("done")
        })
        .flow_output("body")
        .flow_output("done")
        .finish()
}

/// Raises `Break` when `in` fires.
pub fn break_node() -> Node {
    Node::build("break")
        .flow_input("in", |ctx| {
            ctx.jump(JumpSignal::Break);
            Ok(())
        })
        .finish()
}

/// Raises `Continue` when `in` fires.
pub fn continue_node() -> Node {
    Node::build("continue")
        .flow_input("in", |ctx| {
            ctx.jump(JumpSignal::Continue);
            Ok(())
        })
        .finish()
}

/// Raises `Return` when `in` fires.
pub fn return_node() -> Node {
    Node::build("return")
        .flow_input("in", |ctx| {
            ctx.jump(JumpSignal::Return);
            Ok(())
        })
        .finish()
}
