//! Observable state containers for the latest fetched data
//!
//! A [`Store`] holds one value and a list of subscribers. Every write
//! replaces the whole value and synchronously calls each subscriber, in the
//! order they subscribed, on the writing task. New subscribers are called
//! once with the current value as soon as they register.
//!
//! A write happens in two steps: the value is committed under the store lock,
//! then subscribers are notified. Notification is serialized per store, and a
//! notification whose value has already been replaced by a later commit is
//! skipped, so the last value a subscriber sees is always the stored one.
//! Callbacks may read any store and write other stores, but must not write to
//! or subscribe to the store that is notifying them.

use crate::models::Metrics;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Holds the latest metrics snapshot
pub type MetricStore = Store<Metrics>;

/// Holds the known target names
pub type TargetStore = Store<Vec<String>>;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    applied_seq: u64,
    generation: u64,
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// Shared handle to a single observable value. Clones refer to the same cell.
pub struct Store<T> {
    name: &'static str,
    inner: Arc<Mutex<Inner<T>>>,
    notifying: Arc<Mutex<()>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
            notifying: Arc::clone(&self.notifying),
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("applied_seq", &inner.applied_seq)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

// A panicking subscriber must not wedge the store for everyone else.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> Store<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Inner {
                value: initial,
                applied_seq: 0,
                generation: 0,
                subscribers: Vec::new(),
                next_id: 0,
            })),
            notifying: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current value
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Replace the value unconditionally and notify subscribers
    pub fn set(&self, value: T) {
        self.commit(value).publish();
    }

    /// Replace the value only if `seq` is newer than the last applied write.
    ///
    /// Returns `false`, leaving the value and subscribers untouched, when a
    /// write with an equal or higher sequence number has already landed.
    pub fn set_versioned(&self, seq: u64, value: T) -> bool {
        match self.commit_versioned(seq, value) {
            Some(update) => {
                update.publish();
                true
            }
            None => false,
        }
    }

    /// Replace the value without notifying anyone yet
    pub fn commit(&self, value: T) -> PendingUpdate<T> {
        let mut inner = lock(&self.inner);
        inner.value = value.clone();
        inner.generation += 1;

        PendingUpdate {
            store: self.clone(),
            generation: inner.generation,
            value,
        }
    }

    /// Versioned [`Store::commit`]; `None` when `seq` is stale
    pub fn commit_versioned(&self, seq: u64, value: T) -> Option<PendingUpdate<T>> {
        let mut inner = lock(&self.inner);
        if seq <= inner.applied_seq {
            debug!(
                store = self.name,
                seq,
                applied = inner.applied_seq,
                "Ignoring stale write"
            );
            return None;
        }
        inner.applied_seq = seq;
        inner.value = value.clone();
        inner.generation += 1;

        Some(PendingUpdate {
            store: self.clone(),
            generation: inner.generation,
            value,
        })
    }

    /// Sequence number of the last versioned write, 0 if none
    pub fn applied_seq(&self) -> u64 {
        lock(&self.inner).applied_seq
    }

    /// Register `callback`, calling it right away with the current value
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);

        // Held across the replay so no write can be delivered ahead of it.
        let _notifying = lock(&self.notifying);

        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&callback)));
            (id, inner.value.clone())
        };

        debug!(store = self.name, id, "Subscriber registered");
        callback(&current);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        let name = self.name;
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).subscribers.retain(|(sub_id, _)| *sub_id != id);
                    debug!(store = name, id, "Subscriber removed");
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// A committed write whose subscribers have not been notified yet.
#[must_use = "subscribers only hear about the write once it is published"]
pub struct PendingUpdate<T> {
    store: Store<T>,
    generation: u64,
    value: T,
}

impl<T> PendingUpdate<T>
where
    T: Clone + Send + 'static,
{
    /// Notify subscribers, unless a later commit has already replaced the value
    pub fn publish(self) {
        let _notifying = lock(&self.store.notifying);

        let subscribers = {
            let inner = lock(&self.store.inner);
            if inner.generation != self.generation {
                debug!(
                    store = self.store.name,
                    generation = self.generation,
                    current = inner.generation,
                    "Skipping superseded notification"
                );
                return;
            }
            inner.subscribers.clone()
        };

        for (_, callback) in &subscribers {
            callback(&self.value);
        }
    }
}

/// Handle returned by [`Store::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to stop notifications.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
