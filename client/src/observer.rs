use std::fmt;

use tracing::{debug, info, warn};

use crate::cache::QueryKey;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => f.write_str("create"),
            MutationKind::Update => f.write_str("update"),
            MutationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Hooks into [`TaskSync`](crate::TaskSync) activity. Every method has a
/// no-op default so implementors pick what they care about.
pub trait SyncObserver: Send + Sync {
    fn fetch_started(&self) {}

    fn fetch_succeeded(&self, _count: usize) {}

    fn fetch_failed(&self, _error: &TransportError) {}

    fn mutation_started(&self, _kind: MutationKind) {}

    fn mutation_succeeded(&self, _kind: MutationKind) {}

    fn mutation_failed(&self, _kind: MutationKind, _error: &TransportError) {}

    fn invalidated(&self, _key: QueryKey) {}
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn fetch_started(&self) {
        debug!(target: "client::sync", "fetching tasks");
    }

    fn fetch_succeeded(&self, count: usize) {
        debug!(target: "client::sync", count, "tasks fetched");
    }

    fn fetch_failed(&self, error: &TransportError) {
        warn!(target: "client::sync", %error, "task fetch failed");
    }

    fn mutation_started(&self, kind: MutationKind) {
        debug!(target: "client::sync", %kind, "mutation started");
    }

    fn mutation_succeeded(&self, kind: MutationKind) {
        info!(target: "client::sync", %kind, "mutation succeeded");
    }

    fn mutation_failed(&self, kind: MutationKind, error: &TransportError) {
        warn!(target: "client::sync", %kind, %error, "mutation failed");
    }

    fn invalidated(&self, key: QueryKey) {
        debug!(target: "client::sync", ?key, "query invalidated");
    }
}
