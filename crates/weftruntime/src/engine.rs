//! High-level facade over a graph, its event bus, and runner construction.

use crate::coroutine::{CoroutineExecution, Step};
use crate::resolve::PortResolver;
use crate::runner::{Discipline, Runner};
use crate::validate::validate_graph;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use weftcore::events::{EventBus, ExecutionEvent, ExecutionId};
use weftcore::{FlowState, Graph, NodeId, Result};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the execution event broadcast channel.
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}

/// Owns a graph and wires runners to a shared event bus. Each runner built
/// through the engine publishes under a fresh execution id.
pub struct Engine {
    graph: Graph,
    bus: Arc<EventBus>,
    resolver: Option<Arc<dyn PortResolver>>,
}

impl Engine {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, EngineConfig::default())
    }

    pub fn with_config(graph: Graph, config: EngineConfig) -> Self {
        Self {
            graph,
            bus: Arc::new(EventBus::new(config.event_buffer_size)),
            resolver: None,
        }
    }

    /// Install a live-edit resolver applied to every runner built from here.
    pub fn with_resolver(mut self, resolver: Arc<dyn PortResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable graph access for live editing between runs. Stale references
    /// held by suspended executions go through the resolver on next use.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.bus.subscribe()
    }

    /// Build a runner for this engine's graph, wired to the event bus.
    pub fn runner(&self, discipline: Discipline) -> Runner {
        let execution_id = ExecutionId::new_v4();
        tracing::debug!(%execution_id, ?discipline, "creating runner");
        let mut runner = Runner::for_graph(discipline, &self.graph)
            .with_telemetry(Arc::new(self.bus.telemetry(execution_id)));
        if let Some(resolver) = &self.resolver {
            runner = runner.with_resolver(resolver.clone());
        }
        runner
    }

    pub fn validate(&self) -> Result<()> {
        validate_graph(&self.graph)?;
        Ok(())
    }

    /// Validate, then synchronously run the flow input `port` on `node` with
    /// a fresh regular runner.
    pub fn run(&self, node: NodeId, port: &str) -> Result<FlowState> {
        validate_graph(&self.graph)?;
        let entry = self.graph.flow_input(node, port)?;
        let mut runner = self.runner(Discipline::Regular);
        runner.run(&self.graph, entry)
    }

    /// Drive a suspendable execution to completion, ticking on an interval
    /// until it finishes or the token cancels. Cancellation leaves the
    /// execution suspended and returns its current state.
    pub async fn drive(
        &self,
        runner: &mut Runner,
        exec: &mut CoroutineExecution,
        tick_every: Duration,
        cancel: CancellationToken,
    ) -> Result<FlowState> {
        let mut interval = tokio::time::interval(tick_every);
        loop {
            match runner.tick(&self.graph, exec)? {
                Step::Complete(state) => {
                    runner.step_spawned(&self.graph)?;
                    return Ok(state);
                }
                Step::Yielded(_) => {
                    runner.step_spawned(&self.graph)?;
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(exec.state()),
                _ = interval.tick() => {}
            }
        }
    }

    /// Drive a state runner's retained executions until all are settled or
    /// the token cancels.
    pub async fn drive_states(
        &self,
        runner: &mut Runner,
        tick_every: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(tick_every);
        loop {
            let active = runner.step_states(&self.graph)?;
            if active == 0 {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = interval.tick() => {}
            }
        }
    }
}
