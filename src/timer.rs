//! One-shot timeouts with cancellation.
//!
//! A single worker thread orders pending timeouts by deadline; fired
//! callbacks run on their own thread so a slow callback cannot delay the
//! next deadline.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct TimerService {
    inner: Arc<TimerInner>,
    worker: Option<thread::JoinHandle<()>>,
}

struct TimerInner {
    queue: Mutex<BinaryHeap<Scheduled>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    next_seq: AtomicU64,
}

struct Scheduled {
    deadline: Instant,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Box<dyn FnOnce() + Send>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the earliest deadline sits on top of the max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Handle to a scheduled timeout. Cancelling after the callback has fired
/// is a no-op.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimeoutHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

impl TimerService {
    pub fn new() -> Self {
        let inner = Arc::new(TimerInner {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
        });
        let worker_inner = inner.clone();
        let worker = thread::spawn(move || run_timer_loop(worker_inner));
        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// Schedules `task` to run once at `now + delay`.
    pub fn schedule(
        &self,
        delay: Duration,
        task: impl FnOnce() + Send + 'static,
    ) -> TimeoutHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let scheduled = Scheduled {
            deadline: Instant::now() + delay,
            seq: self.inner.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            cancelled: cancelled.clone(),
            task: Box::new(task),
        };
        self.inner.queue.lock().push(scheduled);
        self.inner.wakeup.notify_one();
        TimeoutHandle { cancelled }
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerService {
    // Pending timeouts that have not fired are dropped without running.
    fn drop(&mut self) {
        self.inner.shutdown.store(true, AtomicOrdering::SeqCst);
        self.inner.wakeup.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_timer_loop(inner: Arc<TimerInner>) {
    loop {
        let mut queue = inner.queue.lock();
        if inner.shutdown.load(AtomicOrdering::SeqCst) {
            break;
        }
        let now = Instant::now();
        let next_deadline = queue.peek().map(|scheduled| scheduled.deadline);
        match next_deadline {
            None => {
                inner.wakeup.wait(&mut queue);
            }
            Some(deadline) if deadline <= now => {
                if let Some(scheduled) = queue.pop() {
                    drop(queue);
                    if !scheduled.cancelled.load(AtomicOrdering::SeqCst) {
                        thread::spawn(move || (scheduled.task)());
                    }
                }
            }
            Some(deadline) => {
                let _ = inner.wakeup.wait_until(&mut queue, deadline);
            }
        }
    }
}
