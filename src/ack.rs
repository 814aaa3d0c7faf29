//! Counts peer "index created" signals for one create operation.

use crate::notify::{NodeIndexCreatedHub, NodeIndexCreatedListener};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};

/// Tracks how many peers still owe an acknowledgment for a newly
/// announced index, and settles the operation exactly once: with `true`
/// when the last peer reports, or with `false` when the deadline callback
/// wins the race. The settlement latch is the single source of truth for
/// that race; the timer holds nothing but a reference to this tracker.
pub struct CreationAckTracker {
    index: String,
    remaining: AtomicI64,
    settled: AtomicBool,
    on_settled: Box<dyn Fn(bool) + Send + Sync>,
    hub: Arc<NodeIndexCreatedHub>,
    weak_self: Weak<CreationAckTracker>,
}

impl CreationAckTracker {
    /// Creates a tracker expecting `expected` acknowledgments for `index`
    /// and registers it with the hub. With `expected == 0` the tracker
    /// settles successfully right away and never registers.
    pub fn register(
        hub: Arc<NodeIndexCreatedHub>,
        index: impl Into<String>,
        expected: usize,
        on_settled: impl Fn(bool) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let tracker = Arc::new_cyclic(|weak_self| Self {
            index: index.into(),
            remaining: AtomicI64::new(expected as i64),
            settled: AtomicBool::new(false),
            on_settled: Box::new(on_settled),
            hub,
            weak_self: weak_self.clone(),
        });
        if expected == 0 {
            tracker.settle(true);
        } else {
            tracker.hub.add(tracker.clone());
        }
        tracker
    }

    /// Deadline path: settles with `acknowledged = false` unless the
    /// acknowledgment path already won.
    pub fn settle_timeout(&self) -> bool {
        self.settle(false)
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    fn settle(&self, acknowledged: bool) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        (self.on_settled)(acknowledged);
        if let Some(me) = self.weak_self.upgrade() {
            let erased: Arc<dyn NodeIndexCreatedListener> = me;
            self.hub.remove(&erased);
        }
        true
    }
}

impl NodeIndexCreatedListener for CreationAckTracker {
    fn on_node_index_created(&self, index: &str, _node_id: &str) {
        if index != self.index {
            return;
        }
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.settle(true);
        }
    }
}
