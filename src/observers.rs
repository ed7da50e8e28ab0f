//! Catalog change notification
//!
//! Observers register either a callback or a channel. Publishing takes a
//! snapshot of the registry first, so observers may subscribe or
//! unsubscribe from any thread (including from inside a callback).

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

/// Event delivered to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A scan finished and the in-memory catalog was replaced
    Updated,
}

/// Callback observer
pub type CatalogCallback = Arc<dyn Fn(CatalogEvent) + Send + Sync + 'static>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Observer {
    Callback(CatalogCallback),
    Channel(mpsc::Sender<CatalogEvent>),
}

/// Registry of catalog observers
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(CatalogEvent) + Send + Sync + 'static,
    {
        self.insert(Observer::Callback(Arc::new(callback)))
    }

    /// Register a channel and return its receiving end
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::Receiver<CatalogEvent>) {
        let (tx, rx) = mpsc::channel();
        (self.insert(Observer::Channel(tx)), rx)
    }

    fn insert(&self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, observer));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every observer in registration order.
    ///
    /// Returns the number of observers that received it. A panicking
    /// callback or a closed channel is logged and skipped.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        let snapshot: Vec<(SubscriptionId, Observer)> = self.observers.lock().clone();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match observer {
                Observer::Callback(callback) => {
                    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                        Ok(()) => delivered += 1,
                        Err(_) => log::error!("Catalog observer {:?} panicked on {:?}", id, event),
                    }
                }
                Observer::Channel(tx) => match tx.send(event) {
                    Ok(()) => delivered += 1,
                    Err(_) => log::warn!("Catalog observer {:?} channel is closed", id),
                },
            }
        }
        delivered
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
