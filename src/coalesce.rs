//! At most one outstanding computation per key.
//!
//! Callers that ask for a key while a computation for it is pending get a
//! clone of the same [`Shared`] future, so they all observe one result (or one
//! failure, when `V` is a `Result`). The registration is dropped as soon as the
//! computation settles, whichever way it settles, so a failed fetch never
//! poisons its key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

pub type Pending<V> = Shared<BoxFuture<'static, V>>;

type Registry<K, V> = Arc<Mutex<HashMap<K, Pending<V>>>>;

pub struct Coalescer<K, V> {
    pending: Registry<K, V>,
}

impl<K, V> Default for Coalescer<K, V> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending computation for `key`, registering the one built by
    /// `factory` when none exists. The lookup and the registration happen under
    /// one lock with no suspension point in between.
    pub fn get_or_create<F, Fut>(&self, key: K, factory: F) -> Pending<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        if let Some(existing) = pending.get(&key) {
            tracing::trace!("joining in-flight computation");
            return existing.clone();
        }

        let settle = SettleGuard {
            registry: Arc::clone(&self.pending),
            key: Some(key.clone()),
        };
        let work = factory();
        let shared = async move {
            let _settle = settle;
            work.await
        }
        .boxed()
        .shared();

        pending.insert(key, shared.clone());
        shared
    }

    /// Convenience wrapper that registers (or joins) and awaits in one step.
    pub async fn run<F, Fut>(&self, key: K, factory: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        self.get_or_create(key, factory).await
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }
}

/// Removes the registration when the wrapped computation finishes, panics or
/// is dropped.
struct SettleGuard<K, V>
where
    K: Eq + Hash,
{
    registry: Registry<K, V>,
    key: Option<K>,
}

impl<K, V> Drop for SettleGuard<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            lock(&self.registry).remove(&key);
        }
    }
}

fn lock<K, V>(registry: &Mutex<HashMap<K, Pending<V>>>) -> MutexGuard<'_, HashMap<K, Pending<V>>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}
