//! Execution modes and the runner that hosts them.
//!
//! A [`Runner`] owns everything one logical thread of graph execution needs:
//! the local store, the telemetry sink, the optional live-edit resolver, and
//! the book-keeping for whichever discipline it was built for. Graphs stay
//! shared and immutable during a run; all mutable state lives here.

use crate::coroutine::{CoroutineExecution, Step};
use crate::flow::{run_sync, FlowCtx};
use crate::resolve::PortResolver;
use crate::state::StateTable;
use crate::store::LocalStore;
use std::sync::Arc;
use weftcore::{FlowState, Graph, PortRef, Result, RunError, Telemetry};

/// How flow inputs on this runner execute.
///
/// Regular flows drain synchronously inside the triggering call. Coroutine
/// flows suspend and are advanced tick by tick. State flows are retained
/// coroutine flows that the host can poll, restart, and force-stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Regular,
    Coroutine,
    State,
}

/// Shared mutable environment threaded through every evaluation.
pub(crate) struct RunnerEnv {
    pub discipline: Discipline,
    pub store: LocalStore,
    pub telemetry: Option<Arc<dyn Telemetry>>,
    resolver: Option<Arc<dyn PortResolver>>,
    pub spawned: Vec<CoroutineExecution>,
}

impl RunnerEnv {
    fn new(discipline: Discipline, store: LocalStore) -> Self {
        Self {
            discipline,
            store,
            telemetry: None,
            resolver: None,
            spawned: Vec::new(),
        }
    }

    pub fn resolver(&self) -> Option<&dyn PortResolver> {
        self.resolver.as_deref()
    }

    /// Queue a detached activation of `entry`, advanced by the scheduler on
    /// subsequent ticks.
    pub fn spawn(&mut self, entry: PortRef) {
        tracing::debug!(?entry, "spawning parallel flow activation");
        self.spawned.push(CoroutineExecution::new(entry));
    }
}

/// Drives graph execution under one discipline.
pub struct Runner {
    env: RunnerEnv,
    states: StateTable,
}

impl Runner {
    pub fn new(discipline: Discipline) -> Self {
        Self {
            env: RunnerEnv::new(discipline, LocalStore::new()),
            states: StateTable::new(),
        }
    }

    /// Runner with a store pre-sized for `graph`.
    pub fn for_graph(discipline: Discipline, graph: &Graph) -> Self {
        Self {
            env: RunnerEnv::new(discipline, LocalStore::for_graph(graph)),
            states: StateTable::new(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.env.telemetry = Some(telemetry);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PortResolver>) -> Self {
        self.env.resolver = Some(resolver);
        self
    }

    pub fn discipline(&self) -> Discipline {
        self.env.discipline
    }

    pub fn store(&self) -> &LocalStore {
        &self.env.store
    }

    pub fn store_mut(&mut self) -> &mut LocalStore {
        &mut self.env.store
    }

    /// Synchronously run the flow rooted at `entry` to completion. Regular
    /// discipline only.
    pub fn run(&mut self, graph: &Graph, entry: PortRef) -> Result<FlowState> {
        if self.env.discipline != Discipline::Regular {
            return Err(RunError::WrongDiscipline {
                needed: "a regular runner; use start() or start_state()",
            }
            .into());
        }
        let mut ctx = FlowCtx::new(entry);
        run_sync(graph, &mut self.env, &mut ctx)?;
        Ok(ctx.current_state())
    }

    /// Begin a suspendable execution at `entry`. Nothing runs until the
    /// first [`Runner::tick`]. Coroutine discipline only.
    pub fn start(&mut self, entry: PortRef) -> Result<CoroutineExecution> {
        if self.env.discipline != Discipline::Coroutine {
            return Err(RunError::WrongDiscipline {
                needed: "a coroutine runner; use run() or start_state()",
            }
            .into());
        }
        Ok(CoroutineExecution::new(entry))
    }

    /// Advance a suspendable execution to its next suspension point or to
    /// completion. Ticking a finished execution reports its terminal state.
    pub fn tick(&mut self, graph: &Graph, exec: &mut CoroutineExecution) -> Result<Step> {
        Ok(exec.tick(graph, &mut self.env)?)
    }

    /// Advance every detached activation queued by parallel triggers once.
    /// Failures are logged and drop the activation; they never poison the
    /// runner. Returns how many activations remain suspended. Regular
    /// runners never queue detached activations, so this is a coroutine
    /// and state operation.
    pub fn step_spawned(&mut self, graph: &Graph) -> Result<usize> {
        if self.env.discipline == Discipline::Regular {
            return Err(RunError::WrongDiscipline {
                needed: "a coroutine or state runner",
            }
            .into());
        }
        let pending = std::mem::take(&mut self.env.spawned);
        let mut surviving = Vec::new();
        for mut exec in pending {
            match exec.tick(graph, &mut self.env) {
                Ok(Step::Yielded(_)) => surviving.push(exec),
                Ok(Step::Complete(_)) => {}
                Err(e) => {
                    tracing::warn!(entry = ?exec.entry(), error = %e, "parallel flow failed");
                }
            }
        }
        // Activations spawned while ticking queue behind the survivors.
        let mut fresh = std::mem::take(&mut self.env.spawned);
        surviving.append(&mut fresh);
        let remaining = surviving.len();
        self.env.spawned = surviving;
        Ok(remaining)
    }

    /// Start (or restart after completion) the retained execution for
    /// `entry`, running it to its first suspension. Re-triggering one that
    /// is still in flight is a no-op. State discipline only.
    pub fn start_state(&mut self, graph: &Graph, entry: PortRef) -> Result<()> {
        if self.env.discipline != Discipline::State {
            return Err(RunError::WrongDiscipline {
                needed: "a state runner; use run() or start()",
            }
            .into());
        }
        self.states.start(graph, &mut self.env, entry)?;
        Ok(())
    }

    /// Tick every in-flight retained execution and every detached
    /// activation once. Returns how many are still running.
    pub fn step_states(&mut self, graph: &Graph) -> Result<usize> {
        if self.env.discipline != Discipline::State {
            return Err(RunError::WrongDiscipline {
                needed: "a state runner",
            }
            .into());
        }
        let active = self.states.step_all(graph, &mut self.env)?;
        let detached = self.step_spawned(graph)?;
        Ok(active + detached)
    }

    /// Terminal or running state of the retained execution for `entry`,
    /// `None` if it was never started.
    pub fn state_of(&self, entry: PortRef) -> Option<FlowState> {
        self.states.state_of(entry)
    }

    pub fn is_finished(&self, entry: PortRef) -> bool {
        self.states.is_finished(entry)
    }

    /// Force-stop the retained execution for `entry`: its state becomes
    /// `Failure`, queued successors are discarded, and on-stopped hooks fire
    /// innermost first. State discipline only.
    pub fn stop(&mut self, graph: &Graph, entry: PortRef) -> Result<()> {
        if self.env.discipline != Discipline::State {
            return Err(RunError::StopUnsupported.into());
        }
        self.states.stop(graph, &mut self.env, entry);
        Ok(())
    }
}
