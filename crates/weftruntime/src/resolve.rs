//! Hot-reload port redirection.
//!
//! Every evaluation entry point funnels stale references through
//! [`resolve_live`] before use. Hosts without live editing simply leave the
//! resolver unset and pay one liveness check.

use weftcore::{Graph, PortRef};

/// Live-graph lookup: maps a stale port reference to its current valid
/// equivalent, or `None` if the port is gone for good.
pub trait PortResolver: Send + Sync {
    fn resolve(&self, graph: &Graph, stale: PortRef) -> Option<PortRef>;
}

/// Resolve a port to a live reference. Misses are logged and reported as
/// `None`; callers skip the operation instead of crashing the host.
pub(crate) fn resolve_live(
    graph: &Graph,
    resolver: Option<&dyn PortResolver>,
    port: PortRef,
) -> Option<PortRef> {
    if graph.port_live(port) {
        return Some(port);
    }
    if let Some(resolver) = resolver {
        if let Some(redirected) = resolver.resolve(graph, port) {
            if graph.port_live(redirected) {
                tracing::debug!(?port, ?redirected, "redirected stale port reference");
                return Some(redirected);
            }
        }
    }
    tracing::warn!(?port, "stale port reference could not be redirected; skipping");
    None
}
