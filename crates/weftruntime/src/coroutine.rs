//! Manual trampoline for suspending flows.
//!
//! Nested coroutines, batches of coroutines, and nested flow activations are
//! kept as an explicit frame stack instead of nesting host generators, so
//! suspension order is the depth-first concatenation of leaf yields no
//! matter how deeply bodies compose. One `tick` runs until the next
//! suspension point or overall completion.

use crate::flow::{finish_ctx, resolve_pending, Flow, FlowCtx};
use crate::runner::RunnerEnv;
use weftcore::{
    Coroutine, FlowState, Graph, GraphError, JumpSignal, PortRef, RunError, Suspend, Value,
};

/// Outcome of one scheduler tick.
#[derive(Debug)]
pub enum Step {
    /// The execution suspended, surfacing this value to the scheduler.
    Yielded(Value),
    /// The execution finished with this terminal state.
    Complete(FlowState),
}

struct FlowFrame {
    ctx: FlowCtx,
    started: bool,
}

impl FlowFrame {
    fn new(entry: PortRef) -> Self {
        Self {
            ctx: FlowCtx::new(entry),
            started: false,
        }
    }
}

enum Frame {
    Flow(FlowFrame),
    Body(Coroutine),
    Batch(std::vec::IntoIter<Coroutine>),
}

/// One suspendable execution: a stack of active flow activations and the
/// coroutine bodies driving them.
pub struct CoroutineExecution {
    entry: PortRef,
    frames: Vec<Frame>,
    result: Option<FlowState>,
}

impl CoroutineExecution {
    pub(crate) fn new(entry: PortRef) -> Self {
        Self {
            entry,
            frames: vec![Frame::Flow(FlowFrame::new(entry))],
            result: None,
        }
    }

    /// The flow input this execution was started on.
    pub fn entry(&self) -> PortRef {
        self.entry
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Terminal state once finished, `Running` while suspended.
    pub fn state(&self) -> FlowState {
        self.result.unwrap_or(FlowState::Running)
    }

    /// Advance until the next suspension or completion.
    pub(crate) fn tick(
        &mut self,
        graph: &Graph,
        env: &mut RunnerEnv,
    ) -> Result<Step, RunError> {
        if let Some(state) = self.result {
            return Ok(Step::Complete(state));
        }
        loop {
            if self.frames.is_empty() {
                self.result = Some(FlowState::Success);
                return Ok(Step::Complete(FlowState::Success));
            }
            let top = self.frames.len() - 1;

            if matches!(self.frames[top], Frame::Batch(_)) {
                let next = match &mut self.frames[top] {
                    Frame::Batch(iter) => iter.next(),
                    _ => unreachable!(),
                };
                match next {
                    Some(c) => self.frames.push(Frame::Body(c)),
                    None => {
                        self.frames.pop();
                    }
                }
                continue;
            }

            if matches!(self.frames[top], Frame::Body(_)) {
                if let Some(step) = self.step_body(graph, env, top)? {
                    return Ok(step);
                }
                continue;
            }

            if let Some(step) = self.step_flow(graph, env, top)? {
                return Ok(step);
            }
        }
    }

    /// Resume the top coroutine body against its owning flow activation.
    fn step_body(
        &mut self,
        graph: &Graph,
        env: &mut RunnerEnv,
        top: usize,
    ) -> Result<Option<Step>, RunError> {
        let Some(owner) = self.frames[..top]
            .iter()
            .rposition(|f| matches!(f, Frame::Flow(_)))
        else {
            self.result = Some(FlowState::Failure);
            return Err(RunError::Other(
                "coroutine body has no owning flow activation".to_string(),
            ));
        };
        let (lower, upper) = self.frames.split_at_mut(top);
        let Frame::Body(coroutine) = &mut upper[0] else {
            unreachable!()
        };
        let Frame::Flow(owner_frame) = &mut lower[owner] else {
            unreachable!()
        };
        let node = owner_frame.ctx.entry.node;
        let resumed = {
            let mut flow = Flow::new(graph, env, &mut owner_frame.ctx, node);
            coroutine.resume(&mut flow)
        };
        match resumed {
            Err(e) => {
                let e = e.at(node, graph.node_name(node));
                self.unwind(graph, env, false);
                Err(e)
            }
            Ok(None) => {
                self.frames.pop();
                Ok(None)
            }
            Ok(Some(Suspend::Tick(value))) => Ok(Some(Step::Yielded(value))),
            Ok(Some(Suspend::Done(success))) => {
                // Terminal signal from the innermost body: consumed, not
                // re-yielded.
                owner_frame.ctx.state = if success {
                    FlowState::Success
                } else {
                    FlowState::Failure
                };
                self.frames.pop();
                Ok(None)
            }
            Ok(Some(Suspend::Nested(c))) => {
                self.frames.push(Frame::Body(c));
                Ok(None)
            }
            Ok(Some(Suspend::Each(batch))) => {
                self.frames.push(Frame::Batch(batch.into_iter()));
                Ok(None)
            }
            Ok(Some(Suspend::Enter(target))) => {
                self.frames.push(Frame::Flow(FlowFrame::new(target)));
                Ok(None)
            }
        }
    }

    /// Start or drain the top flow activation.
    fn step_flow(
        &mut self,
        graph: &Graph,
        env: &mut RunnerEnv,
        top: usize,
    ) -> Result<Option<Step>, RunError> {
        let Frame::Flow(ff) = &mut self.frames[top] else {
            unreachable!()
        };
        if !ff.started {
            ff.ctx.restart();
            let Some(entry) = crate::resolve::resolve_live(graph, env.resolver(), ff.ctx.entry)
            else {
                // Live-editing miss: skip the activation.
                ff.ctx.finished = true;
                ff.ctx.state = FlowState::Success;
                return Ok(self.complete_top_flow());
            };
            ff.ctx.entry = entry;
            let node = entry.node;
            let input = match graph.flow_input_at(entry) {
                Ok(input) => input,
                Err(e) => {
                    ff.ctx.settle_failed();
                    let e = RunError::from(e).at(node, graph.node_name(node));
                    self.unwind(graph, env, false);
                    return Err(e);
                }
            };
            if let Some(t) = env.telemetry.as_deref() {
                t.flow_started(node, input.key());
            }
            if let Some(coroutine) = input.coroutine_action() {
                let produced = {
                    let mut flow = Flow::new(graph, env, &mut ff.ctx, node);
                    coroutine(&mut flow)
                };
                match produced {
                    Ok(body) => {
                        ff.started = true;
                        self.frames.push(Frame::Body(body));
                    }
                    Err(e) => {
                        ff.ctx.settle_failed();
                        let e = e.at(node, graph.node_name(node));
                        self.unwind(graph, env, false);
                        return Err(e);
                    }
                }
            } else if let Some(action) = input.action() {
                let invoked = {
                    let mut flow = Flow::new(graph, env, &mut ff.ctx, node);
                    action(&mut flow)
                };
                match invoked {
                    Ok(()) => ff.started = true,
                    Err(e) => {
                        ff.ctx.settle_failed();
                        let e = e.at(node, graph.node_name(node));
                        self.unwind(graph, env, false);
                        return Err(e);
                    }
                }
            } else {
                ff.ctx.settle_failed();
                let e = RunError::from(GraphError::MissingAction {
                    node,
                    port: input.key().to_string(),
                })
                .at(node, graph.node_name(node));
                self.unwind(graph, env, false);
                return Err(e);
            }
            return Ok(None);
        }

        // Drain phase: a pending jump or an exhausted queue finishes this
        // activation.
        if ff.ctx.jump.is_some() {
            finish_ctx(graph, env, &mut ff.ctx);
            return Ok(self.complete_top_flow());
        }
        let Some(pending) = ff.ctx.queue.pop_front() else {
            finish_ctx(graph, env, &mut ff.ctx);
            return Ok(self.complete_top_flow());
        };
        match resolve_pending(graph, env, pending) {
            Ok(Some(target)) => {
                self.frames.push(Frame::Flow(FlowFrame::new(target)));
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let node = ff.ctx.entry.node;
                ff.ctx.settle_failed();
                let e = e.at(node, graph.node_name(node));
                self.unwind(graph, env, false);
                Err(e)
            }
        }
    }

    /// Pop a finished flow frame, delivering its jump and failure to the
    /// nearest enclosing activation, or completing the execution at root.
    fn complete_top_flow(&mut self) -> Option<Step> {
        let Some(Frame::Flow(done)) = self.frames.pop() else {
            unreachable!("top frame is the finished flow")
        };
        let state = done.ctx.state;
        let jump: Option<JumpSignal> = done.ctx.jump;
        if let Some(idx) = self
            .frames
            .iter()
            .rposition(|f| matches!(f, Frame::Flow(_)))
        {
            let Frame::Flow(parent) = &mut self.frames[idx] else {
                unreachable!()
            };
            if state == FlowState::Failure {
                parent.ctx.state = FlowState::Failure;
            }
            if let Some(jump) = jump {
                if parent.ctx.jump.is_none() {
                    parent.ctx.jump = Some(jump);
                }
            }
            None
        } else {
            self.result = Some(state);
            Some(Step::Complete(state))
        }
    }

    /// Tear down every open activation, innermost first. With `stopped` the
    /// on-stopped hooks fire; the plain error path only settles states.
    pub(crate) fn unwind(&mut self, graph: &Graph, env: &mut RunnerEnv, stopped: bool) {
        while let Some(frame) = self.frames.pop() {
            let Frame::Flow(mut ff) = frame else {
                continue;
            };
            if ff.ctx.finished {
                continue;
            }
            ff.ctx.settle_failed();
            if stopped {
                let node = ff.ctx.entry.node;
                if let Ok(input) = graph.flow_input_at(ff.ctx.entry) {
                    if let Some(hook) = input.stop_hook() {
                        let mut flow = Flow::new(graph, env, &mut ff.ctx, node);
                        hook(&mut flow);
                    }
                }
                if let Some(t) = env.telemetry.as_deref() {
                    t.flow_stopped(node, graph.port_key(ff.ctx.entry));
                }
            }
        }
        self.result = Some(FlowState::Failure);
    }
}
