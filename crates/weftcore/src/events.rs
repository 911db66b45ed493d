//! Execution events and the optional telemetry hook.
//!
//! Hosts subscribe to a broadcast bus for live monitoring; runners carry an
//! `Option<Arc<dyn Telemetry>>` so the disabled case is a single branch in
//! the hot path.

use crate::context::FlowState;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted during graph execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    FlowStarted {
        execution_id: ExecutionId,
        node: NodeId,
        port: String,
        timestamp: DateTime<Utc>,
    },
    FlowCompleted {
        execution_id: ExecutionId,
        node: NodeId,
        port: String,
        state: FlowState,
        timestamp: DateTime<Utc>,
    },
    FlowStopped {
        execution_id: ExecutionId,
        node: NodeId,
        port: String,
        timestamp: DateTime<Utc>,
    },
    PortRead {
        execution_id: ExecutionId,
        node: NodeId,
        port: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    PortWritten {
        execution_id: ExecutionId,
        node: NodeId,
        port: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Sink notified on every flow activation and every value access.
pub trait Telemetry: Send + Sync {
    fn flow_started(&self, node: NodeId, port: &str);

    fn flow_finished(&self, node: NodeId, port: &str, state: FlowState);

    fn flow_stopped(&self, node: NodeId, port: &str);

    fn value_accessed(&self, node: NodeId, port: &str, write: bool, success: bool);
}

/// Broadcast bus for execution events.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        // No receivers is fine; events are advisory.
        let _ = self.sender.send(event);
    }

    /// Telemetry adapter feeding this bus under one execution id.
    pub fn telemetry(&self, execution_id: ExecutionId) -> BusTelemetry {
        BusTelemetry {
            execution_id,
            sender: self.sender.clone(),
        }
    }
}

/// `Telemetry` implementation that forwards onto an [`EventBus`].
#[derive(Clone)]
pub struct BusTelemetry {
    execution_id: ExecutionId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl BusTelemetry {
    fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Telemetry for BusTelemetry {
    fn flow_started(&self, node: NodeId, port: &str) {
        self.emit(ExecutionEvent::FlowStarted {
            execution_id: self.execution_id,
            node,
            port: port.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn flow_finished(&self, node: NodeId, port: &str, state: FlowState) {
        self.emit(ExecutionEvent::FlowCompleted {
            execution_id: self.execution_id,
            node,
            port: port.to_string(),
            state,
            timestamp: Utc::now(),
        });
    }

    fn flow_stopped(&self, node: NodeId, port: &str) {
        self.emit(ExecutionEvent::FlowStopped {
            execution_id: self.execution_id,
            node,
            port: port.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn value_accessed(&self, node: NodeId, port: &str, write: bool, success: bool) {
        let execution_id = self.execution_id;
        let event = if write {
            ExecutionEvent::PortWritten {
                execution_id,
                node,
                port: port.to_string(),
                success,
                timestamp: Utc::now(),
            }
        } else {
            ExecutionEvent::PortRead {
                execution_id,
                node,
                port: port.to_string(),
                success,
                timestamp: Utc::now(),
            }
        };
        self.emit(event);
    }
}
