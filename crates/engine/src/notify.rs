use std::sync::{Arc, RwLock};

use crate::FlushOutcome;

/// Fire-and-forget fan-out for queue changes, so badge counters and other UI
/// stay live without the engine knowing about its host. `flush_completed` is
/// only called for non-silent flushes and defaults to a no-op.
pub trait QueueObserver: Send + Sync {
    fn queue_changed(&self, queue_key: &str, len: usize);

    fn flush_completed(&self, outcome: &FlushOutcome) {
        let _ = outcome;
    }
}

/// Cloneable subscription registry shared between the outbox and the engine.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<RwLock<Vec<Arc<dyn QueueObserver>>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    pub fn notify_queue_changed(&self, queue_key: &str, len: usize) {
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.queue_changed(queue_key, len);
            }
        }
    }

    pub fn notify_flush_completed(&self, outcome: &FlushOutcome) {
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.flush_completed(outcome);
            }
        }
    }
}
