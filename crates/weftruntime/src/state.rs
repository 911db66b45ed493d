//! Retained executions for the state discipline.
//!
//! Unlike regular and coroutine activations, a state execution outlives its
//! drain: it stays indexed by its entry flow input so hosts can poll its
//! state, restart it after completion, or force-stop it.

use crate::coroutine::CoroutineExecution;
use crate::runner::RunnerEnv;
use std::collections::HashMap;
use weftcore::{FlowState, Graph, PortRef, PortSlot, RunError};

#[derive(Default)]
pub(crate) struct StateTable {
    entries: HashMap<PortSlot, CoroutineExecution>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the execution for an entry. Starting one that is
    /// already in flight is a no-op; a finished one is replaced by a fresh
    /// activation. Runs to the first suspension before returning.
    pub fn start(
        &mut self,
        graph: &Graph,
        env: &mut RunnerEnv,
        entry: PortRef,
    ) -> Result<(), RunError> {
        if let Some(exec) = self.entries.get(&entry.slot) {
            if !exec.is_finished() {
                return Ok(());
            }
        }
        let mut exec = CoroutineExecution::new(entry);
        let first = exec.tick(graph, env);
        self.entries.insert(entry.slot, exec);
        first.map(|_| ())
    }

    /// Tick every in-flight execution once; returns how many are still
    /// running afterwards.
    pub fn step_all(&mut self, graph: &Graph, env: &mut RunnerEnv) -> Result<usize, RunError> {
        let keys: Vec<PortSlot> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_finished())
            .map(|(k, _)| *k)
            .collect();
        let mut active = 0;
        for key in keys {
            let Some(mut exec) = self.entries.remove(&key) else {
                continue;
            };
            let stepped = exec.tick(graph, env);
            let finished = exec.is_finished();
            self.entries.insert(key, exec);
            stepped?;
            if !finished {
                active += 1;
            }
        }
        Ok(active)
    }

    pub fn state_of(&self, entry: PortRef) -> Option<FlowState> {
        self.entries.get(&entry.slot).map(CoroutineExecution::state)
    }

    pub fn is_finished(&self, entry: PortRef) -> bool {
        self.entries
            .get(&entry.slot)
            .map(CoroutineExecution::is_finished)
            .unwrap_or(false)
    }

    /// Force-stop an in-flight execution: underlying suspensions are torn
    /// down, state becomes `Failure`, queues clear, and on-stopped hooks
    /// fire. Stopping a finished or unknown entry is a no-op.
    pub fn stop(&mut self, graph: &Graph, env: &mut RunnerEnv, entry: PortRef) {
        if let Some(exec) = self.entries.get_mut(&entry.slot) {
            if !exec.is_finished() {
                exec.unwind(graph, env, true);
            }
        }
    }
}
