//! Single-writer cluster-state update queue.
//!
//! Every mutation of authoritative state goes through one worker thread:
//! tasks run strictly in submission order, and a task's returned snapshot
//! is published to local subscribers before the next task runs. Whoever
//! writes next is therefore never racing another writer.

use crate::state::ClusterState;
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateUpdateError {
    #[error("index [{0}] is missing from the committed metadata")]
    MissingIndexMetaData(String),
    #[error("{0}")]
    Failed(String),
}

type ExecuteFn = Box<dyn FnOnce(&ClusterState) -> Result<ClusterState, StateUpdateError> + Send>;
type CommittedFn = Box<dyn FnOnce(&ClusterState) + Send>;

/// One unit of work for the queue: a function from the current snapshot
/// to the next one, optionally followed by a hook that runs once the
/// returned snapshot has been observed locally.
pub struct StateUpdateTask {
    description: String,
    execute: ExecuteFn,
    on_committed: Option<CommittedFn>,
}

impl StateUpdateTask {
    pub fn new(
        description: impl Into<String>,
        execute: impl FnOnce(&ClusterState) -> Result<ClusterState, StateUpdateError> + Send + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            execute: Box::new(execute),
            on_committed: None,
        }
    }

    /// A task whose caller needs to observe the commit: `on_committed`
    /// runs on the queue worker after publish, with the resulting state.
    pub fn processed(
        description: impl Into<String>,
        execute: impl FnOnce(&ClusterState) -> Result<ClusterState, StateUpdateError> + Send + 'static,
        on_committed: impl FnOnce(&ClusterState) + Send + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            execute: Box::new(execute),
            on_committed: Some(Box::new(on_committed)),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Local subscriber to published cluster-state snapshots.
pub trait ClusterStateListener: Send + Sync {
    fn cluster_changed(&self, state: &ClusterState);
}

enum QueueCommand {
    Task(StateUpdateTask),
    Shutdown,
}

struct ClusterShared {
    state: RwLock<ClusterState>,
    listeners: Mutex<Vec<Arc<dyn ClusterStateListener>>>,
}

pub struct ClusterService {
    shared: Arc<ClusterShared>,
    sender: Mutex<mpsc::Sender<QueueCommand>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ClusterService {
    pub fn new(initial: ClusterState) -> Self {
        let shared = Arc::new(ClusterShared {
            state: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
        });
        let (sender, receiver) = mpsc::channel();
        let worker_shared = shared.clone();
        let worker = thread::spawn(move || run_queue_loop(worker_shared, receiver));
        Self {
            shared,
            sender: Mutex::new(sender),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueues a state-update task. Submission never blocks on other
    /// tasks; tasks submitted from inside a running task or a commit hook
    /// simply queue behind it.
    pub fn submit(&self, task: StateUpdateTask) {
        let description = task.description.clone();
        if self.sender.lock().send(QueueCommand::Task(task)).is_err() {
            warn!("cluster service is shut down, dropping update [{description}]");
        }
    }

    /// The latest locally observed snapshot.
    pub fn state(&self) -> ClusterState {
        self.shared.state.read().clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn ClusterStateListener>) {
        self.shared.listeners.lock().push(listener);
    }

    /// Drains the queue and stops the worker. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.sender.lock().send(QueueCommand::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ClusterService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_queue_loop(shared: Arc<ClusterShared>, receiver: mpsc::Receiver<QueueCommand>) {
    while let Ok(command) = receiver.recv() {
        match command {
            QueueCommand::Shutdown => break,
            QueueCommand::Task(task) => execute_task(&shared, task),
        }
    }
}

fn execute_task(shared: &Arc<ClusterShared>, task: StateUpdateTask) {
    let StateUpdateTask {
        description,
        execute,
        on_committed,
    } = task;
    let current = shared.state.read().clone();
    match execute(&current) {
        // A failed task leaves the published state untouched.
        Err(err) => warn!("cluster state update [{description}] failed: {err}"),
        Ok(new_state) => {
            let committed = if new_state.version() != current.version() {
                info!(
                    "event=cluster_state_updated version={} source=[{}]",
                    new_state.version(),
                    description
                );
                *shared.state.write() = new_state.clone();
                let listeners = shared.listeners.lock().clone();
                for listener in listeners {
                    listener.cluster_changed(&new_state);
                }
                new_state
            } else {
                current
            };
            if let Some(hook) = on_committed {
                hook(&committed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{IndexMetaData, MetaData};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn wait_for<T>(rx: &std_mpsc::Receiver<T>) -> T {
        rx.recv_timeout(Duration::from_secs(5)).expect("queue made no progress")
    }

    fn put_index_task(
        name: &'static str,
        tx: std_mpsc::Sender<u64>,
    ) -> StateUpdateTask {
        StateUpdateTask::processed(
            format!("put [{name}]"),
            move |current| {
                let metadata = MetaData::builder_from(current.metadata())
                    .put(IndexMetaData::builder(name).build())
                    .build();
                Ok(ClusterState::builder_from(current).metadata(metadata).build())
            },
            move |state| {
                let _ = tx.send(state.version());
            },
        )
    }

    #[test]
    fn tasks_run_in_submission_order_and_observe_prior_commits() {
        let service = ClusterService::new(ClusterState::builder().build());
        let (tx, rx) = std_mpsc::channel();
        service.submit(put_index_task("a", tx.clone()));
        service.submit(put_index_task("b", tx));
        let first = wait_for(&rx);
        let second = wait_for(&rx);
        assert!(second > first);
        let state = service.state();
        assert!(state.metadata().has_index("a"));
        assert!(state.metadata().has_index("b"));
    }

    #[test]
    fn failed_tasks_leave_state_untouched_and_do_not_stall_the_queue() {
        let service = ClusterService::new(ClusterState::builder().build());
        let before = service.state();
        service.submit(StateUpdateTask::new("doomed", |_| {
            Err(StateUpdateError::Failed("boom".into()))
        }));
        let (tx, rx) = std_mpsc::channel();
        service.submit(put_index_task("after", tx));
        wait_for(&rx);
        let state = service.state();
        assert_eq!(state.version(), before.version() + 1);
        assert!(state.metadata().has_index("after"));
    }

    #[test]
    fn unchanged_snapshots_are_not_republished() {
        struct Counting {
            tx: Mutex<std_mpsc::Sender<u64>>,
        }
        impl ClusterStateListener for Counting {
            fn cluster_changed(&self, state: &ClusterState) {
                let _ = self.tx.lock().send(state.version());
            }
        }

        let service = ClusterService::new(ClusterState::builder().build());
        let (tx, rx) = std_mpsc::channel();
        service.add_listener(Arc::new(Counting { tx: Mutex::new(tx) }));

        let (done_tx, done_rx) = std_mpsc::channel();
        service.submit(StateUpdateTask::processed(
            "no-op",
            |current| Ok(current.clone()),
            move |_| {
                let _ = done_tx.send(());
            },
        ));
        wait_for(&done_rx);
        assert!(rx.try_recv().is_err());

        let (meta_tx, meta_rx) = std_mpsc::channel();
        service.submit(put_index_task("logs", meta_tx));
        wait_for(&meta_rx);
        assert_eq!(wait_for(&rx), service.state().version());
    }

    #[test]
    fn commit_hooks_may_submit_follow_up_tasks() {
        let service = Arc::new(ClusterService::new(ClusterState::builder().build()));
        let (tx, rx) = std_mpsc::channel();
        let follow_up_service = service.clone();
        service.submit(StateUpdateTask::processed(
            "first",
            |current| {
                let metadata = MetaData::builder_from(current.metadata())
                    .put(IndexMetaData::builder("first").build())
                    .build();
                Ok(ClusterState::builder_from(current).metadata(metadata).build())
            },
            move |_| {
                follow_up_service.submit(put_index_task("second", tx));
            },
        ));
        wait_for(&rx);
        assert!(service.state().metadata().has_index("second"));
    }
}
