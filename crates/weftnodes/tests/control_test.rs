// crates/weftnodes/tests/control_test.rs

use std::sync::{Arc, Mutex};
use weftcore::{FlowState, Graph, Node, Value, ValueKind};
use weftnodes::{branch, break_node, counter, literal, repeat, sequence, variable, wait_ticks};
use weftruntime::{Discipline, Runner, Step};

type Log = Arc<Mutex<Vec<Value>>>;

/// Records the `value` input every time it fires.
fn recorder(log: &Log) -> Node {
    let log = log.clone();
    Node::build("recorder")
        .value_input_required("value", ValueKind::Any)
        .flow_input("in", move |ctx| {
            let v = ctx.value("value")?;
            log.lock().unwrap().push(v);
            Ok(())
        })
        .finish()
}

fn wire_flow(graph: &mut Graph, from: (weftcore::NodeId, &str), to: (weftcore::NodeId, &str)) {
    let out = graph.flow_output(from.0, from.1).unwrap();
    let input = graph.flow_input(to.0, to.1).unwrap();
    graph.connect_flow(out, input).unwrap();
}

fn wire_value(graph: &mut Graph, from: (weftcore::NodeId, &str), to: (weftcore::NodeId, &str)) {
    let out = graph.value_output(from.0, from.1).unwrap();
    let input = graph.value_input(to.0, to.1).unwrap();
    graph.connect_value(out, input).unwrap();
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn test_sequence_runs_steps_in_order() {
    init_tracing();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let seq = graph.add_node(sequence(2));
    let lit_a = graph.add_node(literal(Value::Str("a".into())));
    let lit_b = graph.add_node(literal(Value::Str("b".into())));
    let rec_a = graph.add_node(recorder(&log));
    let rec_b = graph.add_node(recorder(&log));
    wire_value(&mut graph, (lit_a, "value"), (rec_a, "value"));
    wire_value(&mut graph, (lit_b, "value"), (rec_b, "value"));
    wire_flow(&mut graph, (seq, "then_0"), (rec_a, "in"));
    wire_flow(&mut graph, (seq, "then_1"), (rec_b, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(seq, "in").unwrap();
    let state = runner.run(&graph, entry).unwrap();

    assert_eq!(state, FlowState::Success);
    assert_eq!(
        log.lock().unwrap().clone(),
        vec![Value::Str("a".into()), Value::Str("b".into())]
    );
}

#[test]
fn test_branch_routes_on_condition() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let cond = graph.add_node(literal(Value::Bool(true)));
    let br = graph.add_node(branch());
    let lit_true = graph.add_node(literal(Value::Str("took-true".into())));
    let lit_false = graph.add_node(literal(Value::Str("took-false".into())));
    let rec_true = graph.add_node(recorder(&log));
    let rec_false = graph.add_node(recorder(&log));
    wire_value(&mut graph, (cond, "value"), (br, "condition"));
    wire_value(&mut graph, (lit_true, "value"), (rec_true, "value"));
    wire_value(&mut graph, (lit_false, "value"), (rec_false, "value"));
    wire_flow(&mut graph, (br, "true"), (rec_true, "in"));
    wire_flow(&mut graph, (br, "false"), (rec_false, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(br, "in").unwrap();
    runner.run(&graph, entry).unwrap();

    assert_eq!(
        log.lock().unwrap().clone(),
        vec![Value::Str("took-true".into())]
    );
}

#[test]
fn test_branch_defaults_to_false_path() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let br = graph.add_node(branch());
    let lit = graph.add_node(literal(Value::Str("took-false".into())));
    let rec = graph.add_node(recorder(&log));
    wire_value(&mut graph, (lit, "value"), (rec, "value"));
    wire_flow(&mut graph, (br, "false"), (rec, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(br, "in").unwrap();
    runner.run(&graph, entry).unwrap();

    assert_eq!(
        log.lock().unwrap().clone(),
        vec![Value::Str("took-false".into())]
    );
}

#[test]
fn test_repeat_exposes_index_each_iteration() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let count = graph.add_node(literal(Value::Int(3)));
    let looper = graph.add_node(repeat());
    let rec = graph.add_node(recorder(&log));
    wire_value(&mut graph, (count, "value"), (looper, "count"));
    wire_value(&mut graph, (looper, "index"), (rec, "value"));
    wire_flow(&mut graph, (looper, "body"), (rec, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(looper, "in").unwrap();
    runner.run(&graph, entry).unwrap();

    assert_eq!(
        log.lock().unwrap().clone(),
        vec![Value::Int(0), Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn test_break_ends_repeat_early() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let count = graph.add_node(literal(Value::Int(5)));
    let looper = graph.add_node(repeat());
    let seq = graph.add_node(sequence(2));
    let rec = graph.add_node(recorder(&log));
    let brk = graph.add_node(break_node());
    wire_value(&mut graph, (count, "value"), (looper, "count"));
    wire_value(&mut graph, (looper, "index"), (rec, "value"));
    wire_flow(&mut graph, (looper, "body"), (seq, "in"));
    wire_flow(&mut graph, (seq, "then_0"), (rec, "in"));
    wire_flow(&mut graph, (seq, "then_1"), (brk, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(looper, "in").unwrap();
    let state = runner.run(&graph, entry).unwrap();

    // The break fires on the first iteration, after the recorder ran once.
    assert_eq!(state, FlowState::Success);
    assert_eq!(log.lock().unwrap().clone(), vec![Value::Int(0)]);
}

#[test]
fn test_counter_counts_bumps() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let count = graph.add_node(literal(Value::Int(4)));
    let looper = graph.add_node(repeat());
    let bumps = graph.add_node(counter());
    let rec = graph.add_node(recorder(&log));
    wire_value(&mut graph, (count, "value"), (looper, "count"));
    wire_value(&mut graph, (bumps, "count"), (rec, "value"));
    wire_flow(&mut graph, (looper, "body"), (bumps, "in"));
    wire_flow(&mut graph, (looper, "done"), (rec, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(looper, "in").unwrap();
    runner.run(&graph, entry).unwrap();

    assert_eq!(log.lock().unwrap().clone(), vec![Value::Int(4)]);
}

#[test]
fn test_variable_assign_then_read() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let source = graph.add_node(literal(Value::Int(12)));
    let var = graph.add_node(variable(ValueKind::Int, Value::Int(0)));
    let seq = graph.add_node(sequence(2));
    let rec = graph.add_node(recorder(&log));
    wire_value(&mut graph, (source, "value"), (var, "source"));
    wire_value(&mut graph, (var, "value"), (rec, "value"));
    wire_flow(&mut graph, (seq, "then_0"), (var, "assign"));
    wire_flow(&mut graph, (seq, "then_1"), (rec, "in"));

    let mut runner = Runner::for_graph(Discipline::Regular, &graph);
    let entry = graph.flow_input(seq, "in").unwrap();
    runner.run(&graph, entry).unwrap();

    assert_eq!(log.lock().unwrap().clone(), vec![Value::Int(12)]);
}

#[test]
fn test_wait_ticks_suspends_then_continues() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let ticks = graph.add_node(literal(Value::Int(2)));
    let wait = graph.add_node(wait_ticks());
    let lit = graph.add_node(literal(Value::Str("done".into())));
    let rec = graph.add_node(recorder(&log));
    wire_value(&mut graph, (ticks, "value"), (wait, "ticks"));
    wire_value(&mut graph, (lit, "value"), (rec, "value"));
    wire_flow(&mut graph, (wait, "then"), (rec, "in"));

    let mut runner = Runner::for_graph(Discipline::Coroutine, &graph);
    let entry = graph.flow_input(wait, "in").unwrap();
    let mut exec = runner.start(entry).unwrap();

    let mut suspensions = 0;
    loop {
        match runner.tick(&graph, &mut exec).unwrap() {
            Step::Yielded(_) => suspensions += 1,
            Step::Complete(state) => {
                assert_eq!(state, FlowState::Success);
                break;
            }
        }
    }
    assert_eq!(suspensions, 2);
    assert_eq!(log.lock().unwrap().clone(), vec![Value::Str("done".into())]);
}
