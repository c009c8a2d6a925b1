//! In-memory document store engine
//!
//! Collections hold serde-typed documents behind a single mutex. The
//! `update` primitive runs its closure under that lock, which makes every
//! conditional read-modify-write (quota increments, reset compare-and-set,
//! sticky-cancellation checks) a genuine compound atomic operation.
//! Subscriptions are latest-state snapshots over `tokio::sync::watch`
//! channels; intermediate states may be skipped, terminal states never are.

use crate::core::time::TimeProvider;
use crate::store::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// A document snapshot delivered to readers and subscribers
#[derive(Debug, Clone)]
pub struct DocSnapshot<T> {
    pub data: T,
    pub updated_at: DateTime<Utc>,
}

/// Mutable view of a document slot handed to `update` closures
///
/// `value == None` means the document is absent (or expired); the closure
/// may fill it to create, mutate it in place, or clear it to delete.
pub struct DocEntry<T> {
    pub value: Option<T>,
    pub expires_at: Option<DateTime<Utc>>,
}

struct Stored<T> {
    data: T,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

struct Inner<T> {
    docs: HashMap<String, Stored<T>>,
    watchers: HashMap<String, watch::Sender<Option<DocSnapshot<T>>>>,
}

/// A named collection of typed documents
pub struct Collection<T> {
    name: String,
    inner: Arc<Mutex<Inner<T>>>,
    time: Arc<dyn TimeProvider>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: Arc::clone(&self.inner),
            time: Arc::clone(&self.time),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Collection<T> {
    pub fn new(name: impl Into<String>, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                docs: HashMap::new(),
                watchers: HashMap::new(),
            })),
            time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Point read; expired documents read as absent
    pub fn get(&self, id: &str) -> Option<T> {
        let now = self.time.now();
        let mut inner = self.inner.lock().unwrap();
        Self::purge_if_expired(&mut inner, id, now);
        inner.docs.get(id).map(|stored| stored.data.clone())
    }

    /// Point read that treats absence as an error
    pub fn get_required(&self, id: &str) -> StoreResult<T> {
        self.get(id).ok_or_else(|| StoreError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        })
    }

    /// Unconditional write; clears any TTL on the document
    pub fn set(&self, id: &str, value: T) {
        self.update(id, |entry| {
            entry.value = Some(value);
            entry.expires_at = None;
        });
    }

    /// Atomic conditional update executed under the collection lock
    ///
    /// The closure observes the current document slot (absent if expired)
    /// and decides the outcome; the result is written back with a fresh
    /// server timestamp and pushed to subscribers before the lock drops.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut DocEntry<T>) -> R) -> R {
        let now = self.time.now();
        let mut inner = self.inner.lock().unwrap();
        Self::purge_if_expired(&mut inner, id, now);

        let mut entry = DocEntry {
            value: inner.docs.get(id).map(|stored| stored.data.clone()),
            expires_at: inner.docs.get(id).and_then(|stored| stored.expires_at),
        };

        let result = f(&mut entry);

        match entry.value {
            Some(data) => {
                inner.docs.insert(
                    id.to_string(),
                    Stored {
                        data,
                        updated_at: now,
                        expires_at: entry.expires_at,
                    },
                );
            }
            None => {
                inner.docs.remove(id);
            }
        }

        Self::notify(&mut inner, id);
        result
    }

    /// Subscribe to a single document
    ///
    /// The receiver starts with the current state and observes every
    /// subsequent write as a latest-state snapshot.
    pub fn watch(&self, id: &str) -> watch::Receiver<Option<DocSnapshot<T>>> {
        let now = self.time.now();
        let mut inner = self.inner.lock().unwrap();
        Self::purge_if_expired(&mut inner, id, now);

        let current = inner.docs.get(id).map(|stored| DocSnapshot {
            data: stored.data.clone(),
            updated_at: stored.updated_at,
        });

        match inner.watchers.get(id) {
            Some(sender) => {
                let receiver = sender.subscribe();
                drop(inner);
                receiver
            }
            None => {
                let (sender, receiver) = watch::channel(current);
                inner.watchers.insert(id.to_string(), sender);
                receiver
            }
        }
    }

    fn purge_if_expired(inner: &mut Inner<T>, id: &str, now: DateTime<Utc>) {
        let expired = inner
            .docs
            .get(id)
            .and_then(|stored| stored.expires_at)
            .is_some_and(|at| now >= at);
        if expired {
            log::debug!("Evicting expired document {}", id);
            inner.docs.remove(id);
        }
    }

    fn notify(inner: &mut Inner<T>, id: &str) {
        if let Some(sender) = inner.watchers.get(id) {
            // Channels whose receivers are all gone are pruned here so the
            // watcher map does not grow with every id ever watched.
            if sender.receiver_count() == 0 {
                inner.watchers.remove(id);
                return;
            }
            let snapshot = inner.docs.get(id).map(|stored| DocSnapshot {
                data: stored.data.clone(),
                updated_at: stored.updated_at,
            });
            sender.send_replace(snapshot);
        }
    }

    #[cfg(test)]
    fn watcher_count(&self) -> usize {
        self.inner.lock().unwrap().watchers.len()
    }
}
