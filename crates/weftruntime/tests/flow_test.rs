// crates/weftruntime/tests/flow_test.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use weftcore::{
    FlowState, Graph, JumpSignal, Node, PortRef, RunError, Value, ValueKind, WeftError,
};
use weftruntime::{Discipline, Engine, PortResolver, Runner};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn logged(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// A node that records its name when fired and continues on `then`.
fn tap(name: &'static str, log: &Log) -> Node {
    let log = log.clone();
    Node::build(name)
        .flow_input("in", move |ctx| {
            log.lock().unwrap().push(name);
            ctx.enqueue("then")
        })
        .flow_output("then")
        .finish()
}

/// A node that enqueues all of the given outputs when fired.
fn fan(outputs: &'static [&'static str]) -> Node {
    let mut builder = Node::build("fan").flow_input("in", move |ctx| {
        for out in outputs {
            ctx.enqueue(out)?;
        }
        Ok(())
    });
    for out in outputs {
        builder = builder.flow_output(*out);
    }
    builder.finish()
}

fn wire_flow(graph: &mut Graph, from: (weftcore::NodeId, &str), to: (weftcore::NodeId, &str)) {
    let out = graph.flow_output(from.0, from.1).unwrap();
    let input = graph.flow_input(to.0, to.1).unwrap();
    graph.connect_flow(out, input).unwrap();
}

#[test]
fn test_successors_drain_in_fifo_order() {
    init_tracing();
    let log = log();
    let mut graph = Graph::new();
    let entry = graph.add_node(fan(&["first", "second", "third"]));
    let a = graph.add_node(tap("a", &log));
    let b = graph.add_node(tap("b", &log));
    let c = graph.add_node(tap("c", &log));
    wire_flow(&mut graph, (entry, "first"), (a, "in"));
    wire_flow(&mut graph, (entry, "second"), (b, "in"));
    wire_flow(&mut graph, (entry, "third"), (c, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    let state = runner.run(&graph, port).unwrap();

    assert_eq!(state, FlowState::Success);
    assert_eq!(logged(&log), vec!["a", "b", "c"]);
}

#[test]
fn test_jump_short_circuits_remaining_successors() {
    let log = log();
    let mut graph = Graph::new();
    let entry = graph.add_node(fan(&["first", "second"]));
    let breaker = graph.add_node(
        Node::build("breaker")
            .flow_input("in", |ctx| {
                ctx.jump(JumpSignal::Break);
                Ok(())
            })
            .finish(),
    );
    let after = graph.add_node(tap("after", &log));
    wire_flow(&mut graph, (entry, "first"), (breaker, "in"));
    wire_flow(&mut graph, (entry, "second"), (after, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    runner.run(&graph, port).unwrap();

    // The jump raised by the first successor terminated the drain.
    assert!(logged(&log).is_empty());
}

#[test]
fn test_child_failure_is_sticky_but_does_not_stop_drain() {
    let log = log();
    let mut graph = Graph::new();
    let entry = graph.add_node(fan(&["first", "second"]));
    let failing = graph.add_node(
        Node::build("failing")
            .flow_input("in", |ctx| {
                ctx.set_state(FlowState::Failure);
                Ok(())
            })
            .finish(),
    );
    let after = graph.add_node(tap("after", &log));
    wire_flow(&mut graph, (entry, "first"), (failing, "in"));
    wire_flow(&mut graph, (entry, "second"), (after, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    let state = runner.run(&graph, port).unwrap();

    assert_eq!(state, FlowState::Failure);
    assert_eq!(logged(&log), vec!["after"]);
}

#[test]
fn test_error_carries_node_identity_exactly_once() {
    let mut graph = Graph::new();
    let entry = graph.add_node(fan(&["next"]));
    let boom = graph.add_node(
        Node::build("boom")
            .flow_input("in", |_| Err(RunError::Other("kaput".to_string())))
            .finish(),
    );
    wire_flow(&mut graph, (entry, "next"), (boom, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    let err = runner.run(&graph, port).unwrap_err();

    let WeftError::Run(RunError::InNode { node, name, source }) = err else {
        panic!("expected a node-attributed run error");
    };
    assert_eq!(node, boom);
    assert_eq!(name, "boom");
    // The inner error is the original, not another wrapper.
    assert!(matches!(*source, RunError::Other(_)));
}

#[test]
fn test_value_default_and_unassigned() {
    let read = Arc::new(Mutex::new(None));
    let seen = read.clone();
    let mut graph = Graph::new();
    let reader = graph.add_node(
        Node::build("reader")
            .value_input("with_default", ValueKind::Int, 41i64)
            .value_input_required("bare", ValueKind::Int)
            .flow_input("read_default", move |ctx| {
                *seen.lock().unwrap() = Some(ctx.value("with_default")?);
                Ok(())
            })
            .flow_input("read_bare", |ctx| ctx.value("bare").map(|_| ()))
            .finish(),
    );

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let ok = graph.flow_input(reader, "read_default").unwrap();
    runner.run(&graph, ok).unwrap();
    assert_eq!(*read.lock().unwrap(), Some(Value::Int(41)));

    let bare = graph.flow_input(reader, "read_bare").unwrap();
    let err = runner.run(&graph, bare).unwrap_err();
    let WeftError::Run(RunError::InNode { source, .. }) = err else {
        panic!("expected a node-attributed run error");
    };
    assert!(matches!(*source, RunError::Unassigned { .. }));
}

#[test]
fn test_cached_output_pulled_once() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let counted = pulls.clone();
    let mut graph = Graph::new();
    let producer = graph.add_node(
        Node::build("producer")
            .value_output_cached("out", ValueKind::Int, move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Int(9))
            })
            .finish(),
    );
    let consumer = graph.add_node(
        Node::build("consumer")
            .value_input_required("in", ValueKind::Int)
            .flow_input("run", |ctx| {
                let a = ctx.value("in")?;
                let b = ctx.value("in")?;
                assert_eq!(a, b);
                Ok(())
            })
            .finish(),
    );
    let out = graph.value_output(producer, "out").unwrap();
    let input = graph.value_input(consumer, "in").unwrap();
    graph.connect_value(out, input).unwrap();

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(consumer, "run").unwrap();
    runner.run(&graph, port).unwrap();

    assert_eq!(pulls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_write_through_connected_settable_output() {
    let mut graph = Graph::new();
    let cell = graph.add_node(
        Node::build("cell")
            .value_output_with(
                "slot",
                ValueKind::Int,
                Some(Arc::new(|ctx: &mut dyn weftcore::FlowContext| {
                    Ok(ctx.local_get(None).unwrap_or(Value::Int(0)))
                })),
                Some(Arc::new(
                    |ctx: &mut dyn weftcore::FlowContext, value: Value| {
                        ctx.local_set(None, value);
                        Ok(())
                    },
                )),
            )
            .finish(),
    );
    let writer = graph.add_node(
        Node::build("writer")
            .value_input_required("target", ValueKind::Int)
            .flow_input("run", |ctx| {
                ctx.set_value("target", Value::Int(23))?;
                assert_eq!(ctx.value("target")?, Value::Int(23));
                Ok(())
            })
            .finish(),
    );
    let slot = graph.value_output(cell, "slot").unwrap();
    let target = graph.value_input(writer, "target").unwrap();
    graph.connect_value(slot, target).unwrap();

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(writer, "run").unwrap();
    runner.run(&graph, port).unwrap();

    // The write landed in the cell node's local slot.
    assert_eq!(
        runner.store().local_get(cell, None),
        Some(&Value::Int(23))
    );
}

#[test]
fn test_delegate_bypasses_connections() {
    let log = log();
    let mut graph = Graph::new();
    let target = graph.add_node(tap("delegated", &log));
    let target_in = graph.flow_input(target, "in").unwrap();
    let entry = graph.add_node(
        Node::build("composite")
            .flow_input("in", move |ctx| ctx.delegate(target_in))
            .finish(),
    );

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    runner.run(&graph, port).unwrap();

    assert_eq!(logged(&log), vec!["delegated"]);
}

#[test]
fn test_trigger_runs_child_synchronously() {
    let log = log();
    let mut graph = Graph::new();
    let child = graph.add_node(tap("child", &log));
    let recorded = log.clone();
    let entry = graph.add_node(
        Node::build("caller")
            .flow_input("in", move |ctx| {
                ctx.trigger("next")?;
                recorded.lock().unwrap().push("after-trigger");
                Ok(())
            })
            .flow_output("next")
            .finish(),
    );
    wire_flow(&mut graph, (entry, "next"), (child, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    runner.run(&graph, port).unwrap();

    assert_eq!(logged(&log), vec!["child", "after-trigger"]);
}

#[test]
fn test_trigger_coroutine_rejected_on_regular_runner() {
    let mut graph = Graph::new();
    let entry = graph.add_node(
        Node::build("caller")
            .flow_input("in", |ctx| ctx.trigger_coroutine("next").map(|_| ()))
            .flow_output("next")
            .finish(),
    );

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    let err = runner.run(&graph, port).unwrap_err();
    let WeftError::Run(RunError::InNode { source, .. }) = err else {
        panic!("expected a node-attributed run error");
    };
    assert!(matches!(*source, RunError::CoroutineOnRegular));
}

#[test]
fn test_wrong_discipline_guards() {
    let graph = Graph::new();
    let port = PortRef {
        node: weftcore::NodeId(0),
        slot: weftcore::PortSlot(0),
    };

    let mut coroutine_runner = Runner::new(Discipline::Coroutine);
    assert!(matches!(
        coroutine_runner.run(&graph, port),
        Err(WeftError::Run(RunError::WrongDiscipline { .. }))
    ));

    let mut regular_runner = Runner::new(Discipline::Regular);
    assert!(matches!(
        regular_runner.start(port),
        Err(WeftError::Run(RunError::WrongDiscipline { .. }))
    ));
    assert!(matches!(
        regular_runner.step_spawned(&graph),
        Err(WeftError::Run(RunError::WrongDiscipline { .. }))
    ));
    assert!(matches!(
        regular_runner.stop(&graph, port),
        Err(WeftError::Run(RunError::StopUnsupported))
    ));
}

#[test]
fn test_engine_emits_flow_events() {
    let log = log();
    let mut graph = Graph::new();
    let entry = graph.add_node(tap("entry", &log));
    let port_key = "in";

    let engine = Engine::new(graph);
    let mut events = engine.subscribe();
    let state = engine.run(entry, port_key).unwrap();
    assert_eq!(state, FlowState::Success);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            weftcore::ExecutionEvent::FlowStarted { .. } => "started",
            weftcore::ExecutionEvent::FlowCompleted { .. } => "completed",
            weftcore::ExecutionEvent::FlowStopped { .. } => "stopped",
            weftcore::ExecutionEvent::PortRead { .. } => "read",
            weftcore::ExecutionEvent::PortWritten { .. } => "written",
        });
    }
    assert_eq!(kinds, vec!["started", "completed"]);
}

#[test]
fn test_validation_rejects_value_cycles() {
    fn passthrough(name: &str) -> Node {
        Node::build(name)
            .value_input("in", ValueKind::Int, 0i64)
            .value_output("out", ValueKind::Int, |ctx| ctx.value("in"))
            .finish()
    }

    let mut graph = Graph::new();
    let a = graph.add_node(passthrough("a"));
    let b = graph.add_node(passthrough("b"));
    let a_out = graph.value_output(a, "out").unwrap();
    let b_out = graph.value_output(b, "out").unwrap();
    let a_in = graph.value_input(a, "in").unwrap();
    let b_in = graph.value_input(b, "in").unwrap();
    graph.connect_value(a_out, b_in).unwrap();
    assert!(weftruntime::validate_graph(&graph).is_ok());

    graph.connect_value(b_out, a_in).unwrap();
    assert!(matches!(
        weftruntime::validate_graph(&graph),
        Err(weftcore::GraphError::CyclicDependency)
    ));
}

/// Redirect table used by the live-editing tests.
struct Redirect {
    from: PortRef,
    to: PortRef,
}

impl PortResolver for Redirect {
    fn resolve(&self, _graph: &Graph, stale: PortRef) -> Option<PortRef> {
        (stale == self.from).then_some(self.to)
    }
}

#[test]
fn test_stale_entry_redirected_to_replacement_node() {
    let log = log();
    let mut graph = Graph::new();
    let original = graph.add_node(tap("original", &log));
    let stale = graph.flow_input(original, "in").unwrap();
    graph.remove_node(original).unwrap();
    let replacement = graph.add_node(tap("replacement", &log));
    let live = graph.flow_input(replacement, "in").unwrap();

    let mut runner = Runner::for_graph(Discipline::Regular, &graph)
        .with_resolver(Arc::new(Redirect {
            from: stale,
            to: live,
        }));
    let state = runner.run(&graph, stale).unwrap();

    assert_eq!(state, FlowState::Success);
    assert_eq!(logged(&log), vec!["replacement"]);
}

#[test]
fn test_unredirectable_stale_entry_skips_as_success() {
    let log = log();
    let mut graph = Graph::new();
    let original = graph.add_node(tap("original", &log));
    let stale = graph.flow_input(original, "in").unwrap();
    graph.remove_node(original).unwrap();

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let state = runner.run(&graph, stale).unwrap();

    // The host keeps running; the missing flow is simply skipped.
    assert_eq!(state, FlowState::Success);
    assert!(logged(&log).is_empty());
}

#[test]
fn test_on_exit_fires_after_drain() {
    let log = log();
    let hook_log = log.clone();
    let mut graph = Graph::new();
    let after = graph.add_node(tap("successor", &log));
    let entry = graph.add_node(
        Node::build("entry")
            .flow_input("in", |ctx| ctx.enqueue("then"))
            .flow_output("then")
            .on_exit("in", move |_| {
                hook_log.lock().unwrap().push("exit-hook");
            })
            .finish(),
    );
    wire_flow(&mut graph, (entry, "then"), (after, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let port = graph.flow_input(entry, "in").unwrap();
    runner.run(&graph, port).unwrap();

    assert_eq!(logged(&log), vec!["successor", "exit-hook"]);
}
