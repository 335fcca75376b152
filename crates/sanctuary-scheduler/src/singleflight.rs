use futures::future::{FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use tokio::sync::Mutex;

type BoxedFuture<V> = Pin<Box<dyn Future<Output = V> + Send>>;

/// Deduplicates concurrent work keyed by `K`: the first caller for a key
/// runs `make`, every other concurrent caller for the same key awaits the
/// same result instead of repeating the work (§5 "Single-flight").
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Shared<BoxedFuture<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(&key) {
            let shared = existing.clone();
            drop(inflight);
            return shared.await;
        }

        let shared: Shared<BoxedFuture<V>> = make().boxed().shared();
        inflight.insert(key.clone(), shared.clone());
        drop(inflight);

        let result = shared.await;
        self.inflight.lock().await.remove(&key);
        result
    }
}
