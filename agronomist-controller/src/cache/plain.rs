use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// A keyed store with no owner index, for resources the reconciler only
/// ever looks up or lists by name (`Deployment`, `ScalingPolicy`,
/// `ScalingPolicyStatus`).
#[derive(Clone)]
pub struct Cache<T> {
    store: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: Clone> Cache<T> {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<T> {
        let key = format!("{namespace}/{name}");
        self.store.read().await.get(&key).cloned()
    }

    pub async fn list(&self) -> Vec<T> {
        self.store.read().await.values().cloned().collect()
    }

    pub(crate) async fn upsert(&self, key: String, value: T) {
        self.store.write().await.insert(key, value);
    }

    pub(crate) async fn remove(&self, key: &str) {
        self.store.write().await.remove(key);
    }
}

impl<T: Clone> Default for Cache<T> {
    fn default() -> Self {
        Self::new()
    }
}
