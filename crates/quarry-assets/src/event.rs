//! Database change events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;
use quarry_core::Guid;

/// What happened to an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetChangeKind {
    /// A new record was added.
    Created,
    /// A record was removed from every index.
    Deleted,
    /// An existing record was re-imported with different content.
    Modified,
}

/// One record change, fired after the indices are updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseChange {
    pub guid: Guid,
    pub kind: AssetChangeKind,
}

impl DatabaseChange {
    pub fn created(guid: Guid) -> Self {
        Self {
            guid,
            kind: AssetChangeKind::Created,
        }
    }

    pub fn deleted(guid: Guid) -> Self {
        Self {
            guid,
            kind: AssetChangeKind::Deleted,
        }
    }

    pub fn modified(guid: Guid) -> Self {
        Self {
            guid,
            kind: AssetChangeKind::Modified,
        }
    }

    /// Check if this is a creation event.
    pub fn is_created(&self) -> bool {
        self.kind == AssetChangeKind::Created
    }

    /// Check if this is a deletion event.
    pub fn is_deleted(&self) -> bool {
        self.kind == AssetChangeKind::Deleted
    }

    /// Check if this is a modification event.
    pub fn is_modified(&self) -> bool {
        self.kind == AssetChangeKind::Modified
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&DatabaseChange) + Send + Sync>;

/// Observer list for [`DatabaseChange`]s.
///
/// Observers are snapshotted before dispatch, so they may subscribe or
/// unsubscribe from inside a callback.
#[derive(Default)]
pub(crate) struct ChangeEvents {
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    channels: Mutex<Vec<(SubscriptionId, Sender<DatabaseChange>)>>,
    next_id: AtomicU64,
}

impl ChangeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&DatabaseChange) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe with a channel. The subscription ends by itself once the
    /// receiver is dropped.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<DatabaseChange>) {
        let (sender, receiver) = channel();
        let id = self.next_id();
        self.channels.lock().push((id, sender));
        (id, receiver)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let mut channels = self.channels.lock();
        let before = observers.len() + channels.len();
        observers.retain(|(existing, _)| *existing != id);
        channels.retain(|(existing, _)| *existing != id);
        observers.len() + channels.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len() + self.channels.lock().len()
    }

    /// Deliver `changes` to every observer, in order.
    pub fn emit(&self, changes: &[DatabaseChange]) {
        if changes.is_empty() {
            return;
        }
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for change in changes {
            tracing::trace!("Asset {} {:?}", change.guid, change.kind);
            for observer in &observers {
                observer(change);
            }
        }

        // Unbounded channels never block; dropped receivers end their subscription.
        self.channels
            .lock()
            .retain(|(_, sender)| changes.iter().all(|c| sender.send(c.clone()).is_ok()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_order() {
        let events = ChangeEvents::new();
        let (_, rx) = events.subscribe_channel();

        let a = Guid::generate();
        let b = Guid::generate();
        events.emit(&[DatabaseChange::created(a), DatabaseChange::deleted(b)]);

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![DatabaseChange::created(a), DatabaseChange::deleted(b)]
        );
        assert!(received[0].is_created());
        assert!(received[1].is_deleted());
    }

    #[test]
    fn test_unsubscribe() {
        let events = ChangeEvents::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = events.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        events.emit(&[DatabaseChange::modified(Guid::generate())]);
        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.emit(&[DatabaseChange::modified(Guid::generate())]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(events.observer_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let events = ChangeEvents::new();
        let (_, rx) = events.subscribe_channel();
        assert_eq!(events.observer_count(), 1);
        drop(rx);
        events.emit(&[DatabaseChange::created(Guid::generate())]);
        assert_eq!(events.observer_count(), 0);
    }

    #[test]
    fn test_subscribe_from_callback() {
        let events = Arc::new(ChangeEvents::new());
        let inner = events.clone();
        events.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        events.emit(&[DatabaseChange::created(Guid::generate())]);
        assert_eq!(events.observer_count(), 2);
    }
}
