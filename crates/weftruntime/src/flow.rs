//! Flow activation records and the synchronous drain algorithm.
//!
//! All three disciplines share one shape: guard against re-entry, invoke the
//! entry's body, drain queued successors FIFO with first-jump-wins early
//! termination, then fire the completion hook and settle the terminal state.
//! The coroutine trampoline reuses the pieces here; this module holds the
//! literal-recursion (regular) realization.

use crate::resolve::resolve_live;
use crate::runner::{Discipline, RunnerEnv};
use std::any::Any;
use std::collections::VecDeque;
use weftcore::{
    FlowContext, FlowState, Graph, JumpSignal, NodeId, PortKind, PortRef, RunError, Suspend,
    Value,
};

/// A queued continuation. The two variants are deliberately distinct
/// operations: a successor goes through the output's single connection,
/// while a delegate names a flow input directly (structural delegation used
/// by composite nodes), bypassing connections entirely.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pending {
    Successor(PortRef),
    Delegate(PortRef),
}

/// One activation of a flow input: queued successors, accumulated jump, and
/// terminal state. Ephemeral for regular/coroutine flows; retained and
/// restartable for state flows.
pub struct FlowCtx {
    pub(crate) entry: PortRef,
    pub(crate) state: FlowState,
    pub(crate) has_called: bool,
    pub(crate) finished: bool,
    pub(crate) jump: Option<JumpSignal>,
    pub(crate) queue: VecDeque<Pending>,
}

impl FlowCtx {
    pub fn new(entry: PortRef) -> Self {
        Self {
            entry,
            state: FlowState::Running,
            has_called: false,
            finished: false,
            jump: None,
            queue: VecDeque::new(),
        }
    }

    /// The flow input this context activates.
    pub fn entry(&self) -> PortRef {
        self.entry
    }

    /// Computed state: an in-flight context reports `Running` regardless of
    /// the stored terminal value, so pollers never see "drained but hook not
    /// yet fired" as finished.
    pub fn current_state(&self) -> FlowState {
        if self.has_called && !self.finished {
            FlowState::Running
        } else {
            self.state
        }
    }

    pub fn has_called(&self) -> bool {
        self.has_called
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.state != FlowState::Running
    }

    pub(crate) fn restart(&mut self) {
        self.has_called = true;
        self.finished = false;
        self.state = FlowState::Running;
        self.jump = None;
        self.queue.clear();
    }

    /// Settle as failed without running hooks; used when an error is about
    /// to propagate so pollers never observe an indefinitely running
    /// context.
    pub(crate) fn settle_failed(&mut self) {
        self.finished = true;
        self.state = FlowState::Failure;
        self.queue.clear();
    }
}

/// The runtime's `FlowContext` implementation: one borrow of the graph, the
/// runner's shared environment, and the active activation record. `current`
/// tracks whose ports resolve by key; it moves to the source node while an
/// upstream getter is pulled.
pub(crate) struct Flow<'a> {
    graph: &'a Graph,
    env: &'a mut RunnerEnv,
    ctx: &'a mut FlowCtx,
    current: NodeId,
}

impl<'a> Flow<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        env: &'a mut RunnerEnv,
        ctx: &'a mut FlowCtx,
        current: NodeId,
    ) -> Self {
        Self {
            graph,
            env,
            ctx,
            current,
        }
    }

    fn read_value(&mut self, input: &str) -> Result<Value, RunError> {
        let graph = self.graph;
        let input_ref = graph.value_input(self.current, input)?;
        let Some(src) = graph.value_source(input_ref)? else {
            let port = graph.value_input_at(input_ref)?;
            return port
                .default_value()
                .cloned()
                .ok_or_else(|| RunError::Unassigned {
                    port: input.to_string(),
                });
        };
        let Some(src) = resolve_live(graph, self.env.resolver(), src) else {
            // Live-editing miss: skip the pull, fall back to the declared
            // kind's zero so the host keeps running.
            let port = graph.value_input_at(input_ref)?;
            return Ok(port.kind().zero());
        };
        let out = graph.value_output_at(src)?;
        if out.is_cached() {
            if let Some(v) = self.env.store.port_cache(src.slot) {
                return Ok(v.clone());
            }
        }
        let Some(get) = out.getter() else {
            return Err(RunError::NotReadable {
                port: out.key().to_string(),
            }
            .at(src.node, graph.node_name(src.node)));
        };
        let prev = std::mem::replace(&mut self.current, src.node);
        let result = get(self);
        self.current = prev;
        let value = result.map_err(|e| e.at(src.node, graph.node_name(src.node)))?;
        if out.is_cached() {
            self.env.store.set_port_cache(src.slot, value.clone());
        }
        Ok(value)
    }

    fn write_value(&mut self, input: &str, value: Value) -> Result<(), RunError> {
        let graph = self.graph;
        let input_ref = graph.value_input(self.current, input)?;
        let Some(src) = graph.value_source(input_ref)? else {
            return Err(RunError::Unassigned {
                port: input.to_string(),
            });
        };
        let Some(src) = resolve_live(graph, self.env.resolver(), src) else {
            return Ok(());
        };
        let out = graph.value_output_at(src)?;
        let Some(set) = out.setter() else {
            return Err(RunError::NotWritable {
                port: out.key().to_string(),
            }
            .at(src.node, graph.node_name(src.node)));
        };
        let prev = std::mem::replace(&mut self.current, src.node);
        let result = set(self, value);
        self.current = prev;
        result.map_err(|e| e.at(src.node, graph.node_name(src.node)))
    }

    fn resolve_output(&mut self, output: &str) -> Result<Option<PortRef>, RunError> {
        let out = self.graph.flow_output(self.current, output).map_err(|_| {
            RunError::UnknownPort {
                port: output.to_string(),
            }
        })?;
        Ok(resolve_live(self.graph, self.env.resolver(), out))
    }
}

impl FlowContext for Flow<'_> {
    fn node(&self) -> NodeId {
        self.current
    }

    fn state(&self) -> FlowState {
        self.ctx.current_state()
    }

    fn set_state(&mut self, state: FlowState) {
        self.ctx.state = state;
    }

    fn value(&mut self, input: &str) -> Result<Value, RunError> {
        let node = self.current;
        let result = self.read_value(input);
        if let Some(t) = self.env.telemetry.as_deref() {
            t.value_accessed(node, input, false, result.is_ok());
        }
        result
    }

    fn set_value(&mut self, input: &str, value: Value) -> Result<(), RunError> {
        let node = self.current;
        let result = self.write_value(input, value);
        if let Some(t) = self.env.telemetry.as_deref() {
            t.value_accessed(node, input, true, result.is_ok());
        }
        result
    }

    fn enqueue(&mut self, output: &str) -> Result<(), RunError> {
        let out = self.graph.flow_output(self.current, output).map_err(|_| {
            RunError::UnknownPort {
                port: output.to_string(),
            }
        })?;
        self.ctx.queue.push_back(Pending::Successor(out));
        Ok(())
    }

    fn delegate(&mut self, target: PortRef) -> Result<(), RunError> {
        if self.graph.port_kind(target) != Some(PortKind::FlowInput) {
            return Err(RunError::Other(format!(
                "delegate target {target:?} is not a flow input"
            )));
        }
        self.ctx.queue.push_back(Pending::Delegate(target));
        Ok(())
    }

    fn jump(&mut self, signal: JumpSignal) {
        // First jump wins; a later jump while one is pending is ignored.
        if self.ctx.jump.is_none() {
            self.ctx.jump = Some(signal);
        }
    }

    fn take_jump(&mut self) -> Option<JumpSignal> {
        self.ctx.jump.take()
    }

    fn trigger(&mut self, output: &str) -> Result<Option<JumpSignal>, RunError> {
        let Some(out) = self.resolve_output(output)? else {
            return Ok(None);
        };
        let Some(target) = self.graph.flow_target(out)? else {
            return Ok(None);
        };
        let mut child = FlowCtx::new(target);
        let jump = run_sync(self.graph, self.env, &mut child)?;
        if child.current_state() == FlowState::Failure {
            self.ctx.state = FlowState::Failure;
        }
        Ok(jump)
    }

    fn trigger_parallel(&mut self, output: &str) -> Result<(), RunError> {
        let Some(out) = self.resolve_output(output)? else {
            return Ok(());
        };
        let Some(target) = self.graph.flow_target(out)? else {
            return Ok(());
        };
        match self.env.discipline {
            Discipline::Regular => {
                let mut child = FlowCtx::new(target);
                // Fire-and-forget: completion, jump and errors stay with the
                // callee.
                if let Err(e) = run_sync(self.graph, self.env, &mut child) {
                    tracing::warn!(error = %e, "parallel flow failed");
                }
            }
            Discipline::Coroutine | Discipline::State => {
                self.env.spawn(target);
            }
        }
        Ok(())
    }

    fn trigger_coroutine(&mut self, output: &str) -> Result<Suspend, RunError> {
        if self.env.discipline == Discipline::Regular {
            return Err(RunError::CoroutineOnRegular);
        }
        let Some(out) = self.resolve_output(output)? else {
            return Ok(Suspend::Each(Vec::new()));
        };
        match self.graph.flow_target(out)? {
            Some(target) => Ok(Suspend::Enter(target)),
            None => Ok(Suspend::Each(Vec::new())),
        }
    }

    fn local_get(&self, key: Option<&str>) -> Option<Value> {
        self.env.store.local_get(self.current, key).cloned()
    }

    fn local_set(&mut self, key: Option<&str>, value: Value) {
        self.env.store.local_set(self.current, key, value);
    }

    fn element(&mut self) -> &mut Option<Box<dyn Any + Send>> {
        self.env.store.element_slot(self.current)
    }
}

/// Resolve a queued continuation to the flow input it activates. `None`
/// means "skip": an unconnected output or an unredirectable stale port.
pub(crate) fn resolve_pending(
    graph: &Graph,
    env: &RunnerEnv,
    pending: Pending,
) -> Result<Option<PortRef>, RunError> {
    match pending {
        Pending::Successor(out) => {
            let Some(out) = resolve_live(graph, env.resolver(), out) else {
                return Ok(None);
            };
            Ok(graph.flow_target(out)?)
        }
        Pending::Delegate(input) => Ok(resolve_live(graph, env.resolver(), input)),
    }
}

/// After-run: completion hook, settle flags, default to success, notify.
pub(crate) fn finish_ctx(graph: &Graph, env: &mut RunnerEnv, ctx: &mut FlowCtx) {
    let node = ctx.entry.node;
    if let Ok(input) = graph.flow_input_at(ctx.entry) {
        if let Some(hook) = input.exit_hook() {
            let mut flow = Flow::new(graph, env, ctx, node);
            hook(&mut flow);
        }
    }
    ctx.finished = true;
    if ctx.state == FlowState::Running {
        ctx.state = FlowState::Success;
    }
    if let Some(t) = env.telemetry.as_deref() {
        t.flow_finished(node, graph.port_key(ctx.entry), ctx.state);
    }
}

/// Run one activation to completion with literal call-stack recursion.
/// Returns the jump signal to propagate to the caller's drain, if any.
pub(crate) fn run_sync(
    graph: &Graph,
    env: &mut RunnerEnv,
    ctx: &mut FlowCtx,
) -> Result<Option<JumpSignal>, RunError> {
    // Re-trigger while in flight is a no-op.
    if ctx.has_called && !ctx.finished {
        return Ok(None);
    }
    ctx.restart();

    let Some(entry) = resolve_live(graph, env.resolver(), ctx.entry) else {
        // Live-editing miss: the activation is skipped, not failed.
        ctx.finished = true;
        ctx.state = FlowState::Success;
        return Ok(None);
    };
    ctx.entry = entry;
    let node = entry.node;
    let input = graph.flow_input_at(entry)?;
    if let Some(t) = env.telemetry.as_deref() {
        t.flow_started(node, input.key());
    }

    let action = match (input.action(), input.is_coroutine()) {
        (Some(action), suspending) => {
            if env.discipline == Discipline::Regular && suspending {
                ctx.settle_failed();
                return Err(
                    RunError::CoroutineOnRegular.at(node, graph.node_name(node))
                );
            }
            action
        }
        (None, true) => {
            ctx.settle_failed();
            let err = if env.discipline == Discipline::Regular {
                RunError::CoroutineOnRegular
            } else {
                RunError::NotSynchronous {
                    port: input.key().to_string(),
                }
            };
            return Err(err.at(node, graph.node_name(node)));
        }
        (None, false) => {
            ctx.settle_failed();
            return Err(RunError::from(weftcore::GraphError::MissingAction {
                node,
                port: input.key().to_string(),
            })
            .at(node, graph.node_name(node)));
        }
    };

    let invoked = {
        let mut flow = Flow::new(graph, env, ctx, node);
        action(&mut flow)
    };
    if let Err(e) = invoked {
        ctx.settle_failed();
        return Err(e.at(node, graph.node_name(node)));
    }

    // Drain queued successors in FIFO order; the first jump terminates the
    // drain without running the remaining entries.
    while ctx.jump.is_none() {
        let Some(pending) = ctx.queue.pop_front() else {
            break;
        };
        let target = match resolve_pending(graph, env, pending) {
            Ok(Some(target)) => target,
            Ok(None) => continue,
            Err(e) => {
                ctx.settle_failed();
                return Err(e.at(node, graph.node_name(node)));
            }
        };
        let mut child = FlowCtx::new(target);
        match run_sync(graph, env, &mut child) {
            Ok(jump) => {
                if child.current_state() == FlowState::Failure {
                    ctx.state = FlowState::Failure;
                }
                if let Some(jump) = jump {
                    ctx.jump = Some(jump);
                }
            }
            Err(e) => {
                ctx.settle_failed();
                // Already wrapped with the offending node's identity.
                return Err(e);
            }
        }
    }

    finish_ctx(graph, env, ctx);
    Ok(ctx.jump.take())
}
