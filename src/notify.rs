//! Fan-out hub for peer "index created" notifications.
//!
//! The transport layer calls [`NodeIndexCreatedHub::node_index_created`]
//! when a peer reports that it has materialized an index locally. Every
//! registered listener sees every notification; filtering by index is the
//! listener's job. Notifications may arrive on any thread.

use parking_lot::Mutex;
use std::sync::Arc;

pub trait NodeIndexCreatedListener: Send + Sync {
    fn on_node_index_created(&self, index: &str, node_id: &str);
}

#[derive(Default)]
pub struct NodeIndexCreatedHub {
    listeners: Mutex<Vec<Arc<dyn NodeIndexCreatedListener>>>,
}

impl NodeIndexCreatedHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn NodeIndexCreatedListener>) {
        self.listeners.lock().push(listener);
    }

    /// Removes a previously added listener, matching by identity.
    pub fn remove(&self, listener: &Arc<dyn NodeIndexCreatedListener>) {
        self.listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Delivers one notification to every registered listener. Listeners
    /// are invoked outside the registry lock so they may re-enter the hub.
    pub fn node_index_created(&self, index: &str, node_id: &str) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_node_index_created(index, node_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct Recording {
        seen: PlMutex<Vec<(String, String)>>,
    }

    impl NodeIndexCreatedListener for Recording {
        fn on_node_index_created(&self, index: &str, node_id: &str) {
            self.seen.lock().push((index.to_string(), node_id.to_string()));
        }
    }

    #[test]
    fn every_listener_sees_every_notification() {
        let hub = NodeIndexCreatedHub::new();
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        hub.add(first.clone());
        hub.add(second.clone());
        hub.node_index_created("logs", "n2");
        assert_eq!(first.seen.lock().len(), 1);
        assert_eq!(second.seen.lock().len(), 1);
    }

    #[test]
    fn removed_listeners_stop_receiving() {
        let hub = NodeIndexCreatedHub::new();
        let listener = Arc::new(Recording::default());
        hub.add(listener.clone());
        let erased: Arc<dyn NodeIndexCreatedListener> = listener.clone();
        hub.remove(&erased);
        assert!(hub.is_empty());
        hub.node_index_created("logs", "n2");
        assert!(listener.seen.lock().is_empty());
    }

    #[test]
    fn listeners_may_remove_themselves_during_delivery() {
        struct SelfRemoving {
            hub: Arc<NodeIndexCreatedHub>,
            me: PlMutex<Option<Arc<dyn NodeIndexCreatedListener>>>,
        }

        impl NodeIndexCreatedListener for SelfRemoving {
            fn on_node_index_created(&self, _index: &str, _node_id: &str) {
                if let Some(me) = self.me.lock().take() {
                    self.hub.remove(&me);
                }
            }
        }

        let hub = Arc::new(NodeIndexCreatedHub::new());
        let listener = Arc::new(SelfRemoving {
            hub: hub.clone(),
            me: PlMutex::new(None),
        });
        let erased: Arc<dyn NodeIndexCreatedListener> = listener.clone();
        *listener.me.lock() = Some(erased.clone());
        hub.add(erased);
        assert_eq!(hub.len(), 1);
        hub.node_index_created("logs", "n2");
        assert!(hub.is_empty());
    }
}
