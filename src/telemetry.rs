//! Instrumentation for the create-index lifecycle.

use log::info;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Observability hooks for the coordinator. One call per lifecycle edge
/// of a create operation, keyed by the index it concerns.
pub trait CreateIndexMetrics: Send + Sync {
    fn record_submitted(&self, index: &str);
    fn record_acknowledged(&self, index: &str);
    fn record_unacknowledged(&self, index: &str);
    fn record_failure(&self, index: &str);
}

/// Where a create operation last stood for a given index name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Pending,
    Acknowledged,
    Unacknowledged,
    Failed,
}

#[derive(Debug, Default, Clone)]
pub struct CreateIndexMetricsSnapshot {
    pub submitted: u64,
    pub acknowledged: u64,
    pub unacknowledged: u64,
    pub failures: u64,
    pub outcomes: BTreeMap<String, CreateOutcome>,
}

/// Accumulator shared between the coordinator and its asynchronous
/// settlement paths; clones observe the same totals.
#[derive(Default, Clone)]
pub struct InMemoryCreateIndexMetrics {
    inner: Arc<Mutex<CreateIndexMetricsSnapshot>>,
}

impl InMemoryCreateIndexMetrics {
    pub fn snapshot(&self) -> CreateIndexMetricsSnapshot {
        self.inner.lock().clone()
    }
}

impl CreateIndexMetrics for InMemoryCreateIndexMetrics {
    fn record_submitted(&self, index: &str) {
        let mut guard = self.inner.lock();
        guard.submitted = guard.submitted.saturating_add(1);
        guard
            .outcomes
            .insert(index.to_string(), CreateOutcome::Pending);
    }

    fn record_acknowledged(&self, index: &str) {
        let mut guard = self.inner.lock();
        guard.acknowledged = guard.acknowledged.saturating_add(1);
        guard
            .outcomes
            .insert(index.to_string(), CreateOutcome::Acknowledged);
    }

    fn record_unacknowledged(&self, index: &str) {
        let mut guard = self.inner.lock();
        guard.unacknowledged = guard.unacknowledged.saturating_add(1);
        guard
            .outcomes
            .insert(index.to_string(), CreateOutcome::Unacknowledged);
    }

    fn record_failure(&self, index: &str) {
        let mut guard = self.inner.lock();
        guard.failures = guard.failures.saturating_add(1);
        guard
            .outcomes
            .insert(index.to_string(), CreateOutcome::Failed);
    }
}

/// Bearer for deployments without a collector: one structured log line
/// per lifecycle edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCreateIndexMetrics;

impl CreateIndexMetrics for LoggingCreateIndexMetrics {
    fn record_submitted(&self, index: &str) {
        info!("event=create_index_submitted index={index}");
    }

    fn record_acknowledged(&self, index: &str) {
        info!("event=create_index_acknowledged index={index}");
    }

    fn record_unacknowledged(&self, index: &str) {
        info!("event=create_index_unacknowledged index={index}");
    }

    fn record_failure(&self, index: &str) {
        info!("event=create_index_failed index={index}");
    }
}
