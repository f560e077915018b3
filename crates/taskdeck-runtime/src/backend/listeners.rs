//! Listener registry shared by the in-process backends.
//!
//! Each subscriber gets an unbounded channel and an optional filter. The
//! returned [`Subscription`] deregisters itself when dropped, so a view that
//! goes away stops receiving notices without an explicit unsubscribe call.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Entry<T> {
    filter: Option<Filter<T>>,
    tx: mpsc::UnboundedSender<T>,
}

struct Inner<T> {
    next_id: u64,
    entries: HashMap<u64, Entry<T>>,
}

/// Set of live subscribers for one kind of notice.
pub struct Listeners<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                entries: HashMap::new(),
            })),
        }
    }
}

impl<T: Clone + Send + 'static> Listeners<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber receiving every notice.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        self.register(None)
    }

    /// Registers a subscriber receiving notices accepted by `filter`.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, filter: F) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.register(Some(Box::new(filter)))
    }

    fn register(&self, filter: Option<Filter<T>>) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(id, Entry { filter, tx });

        let registry: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        let unregister = Box::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner.lock().entries.remove(&id);
            }
        });

        Subscription {
            rx,
            unregister: Some(unregister),
        }
    }

    /// Delivers `notice` to every matching subscriber.
    ///
    /// Returns the number of subscribers that received it. Subscribers whose
    /// receiver is gone are pruned.
    pub fn emit(&self, notice: &T) -> usize {
        let mut inner = self.inner.lock();
        let mut delivered = 0;
        inner.entries.retain(|_, entry| {
            if entry.filter.as_ref().is_some_and(|f| !f(notice)) {
                return true;
            }
            if entry.tx.send(notice.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving end of a registration.
///
/// Dropping the subscription removes it from its registry.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    unregister: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl<T> Subscription<T> {
    /// Waits for the next notice. Returns `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns a pending notice without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// A subscription that is already closed; `recv` returns `None`.
    #[must_use]
    pub fn closed() -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            unregister: None,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("registered", &self.unregister.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_all_subscribers() {
        let listeners = Listeners::<u32>::new();
        let mut a = listeners.subscribe();
        let mut b = listeners.subscribe();

        assert_eq!(listeners.emit(&7), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn filter_is_applied() {
        let listeners = Listeners::<u32>::new();
        let mut evens = listeners.subscribe_filtered(|n| n % 2 == 0);

        assert_eq!(listeners.emit(&1), 0);
        assert_eq!(listeners.emit(&2), 1);
        assert_eq!(evens.recv().await, Some(2));
        assert!(evens.try_recv().is_none());
    }

    #[test]
    fn drop_unregisters() {
        let listeners = Listeners::<u32>::new();
        let sub = listeners.subscribe();
        assert_eq!(listeners.len(), 1);

        drop(sub);
        assert!(listeners.is_empty());
        assert_eq!(listeners.emit(&1), 0);
    }

    #[test]
    fn subscription_outliving_registry_drops_cleanly() {
        let listeners = Listeners::<u32>::new();
        let sub = listeners.subscribe();
        drop(listeners);
        drop(sub);
    }

    #[tokio::test]
    async fn closed_subscription_yields_none() {
        let mut sub = Subscription::<u32>::closed();
        assert_eq!(sub.recv().await, None);
    }
}
