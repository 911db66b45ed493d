use crate::node::NodeId;
use crate::port::PortRef;
use crate::value::ValueKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeftError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("run error: {0}")]
    Run(#[from] RunError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural errors, reported at connect/build time rather than during
/// evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("port '{port}' not found on node {node:?}")]
    PortNotFound { node: NodeId, port: String },

    #[error("cannot pair a {0} port with a {1} port")]
    KindMismatch(&'static str, &'static str),

    #[error("cannot connect node {node:?} to itself")]
    SelfLoop { node: NodeId },

    #[error("type mismatch: output carries {output} but input expects {input}")]
    TypeMismatch { output: ValueKind, input: ValueKind },

    #[error("port {port:?} has multiple connections where at most one is allowed")]
    MultipleConnections { port: PortRef },

    #[error("flow input '{port}' on node {node:?} has no action")]
    MissingAction { node: NodeId, port: String },

    #[error("value connections form a cycle")]
    CyclicDependency,

    #[error("stale port reference {port:?}")]
    Detached { port: PortRef },
}

/// Errors raised while a graph is being evaluated.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("value output '{port}' has no get accessor")]
    NotReadable { port: String },

    #[error("value output '{port}' has no set accessor")]
    NotWritable { port: String },

    #[error("value input '{port}' is unassigned")]
    Unassigned { port: String },

    #[error("unknown port '{port}' on the current node")]
    UnknownPort { port: String },

    #[error("cannot run a coroutine on a non-coroutine flow")]
    CoroutineOnRegular,

    #[error("flow input '{port}' only has a coroutine action and cannot run synchronously")]
    NotSynchronous { port: String },

    #[error("this runner discipline requires {needed}")]
    WrongDiscipline { needed: &'static str },

    #[error("stop is only supported by state runners")]
    StopUnsupported,

    #[error("stale port reference {port:?} could not be redirected")]
    Stale { port: PortRef },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("in node {node:?} ({name}): {source}")]
    InNode {
        node: NodeId,
        name: String,
        #[source]
        source: Box<RunError>,
    },

    #[error("{0}")]
    Other(String),
}

impl RunError {
    /// Attach the offending node's identity. Errors that already carry one
    /// pass through untouched, so recursive re-entry never double-wraps.
    pub fn at(self, node: NodeId, name: &str) -> RunError {
        match self {
            wrapped @ RunError::InNode { .. } => wrapped,
            other => RunError::InNode {
                node,
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }
}
