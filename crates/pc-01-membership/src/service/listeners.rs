use crate::domain::ClusterEvent;
use crate::ports::EventListener;
use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe list of event listeners.
///
/// `fire` snapshots the list before calling out, so a listener may register
/// further listeners without deadlocking.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every listener in registration order.
    pub fn fire(&self, event: &ClusterEvent) {
        let snapshot: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        for listener in snapshot {
            listener.on_event(event);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
