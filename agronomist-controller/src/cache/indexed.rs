use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Objects that can be related back to an owning resource by UID, i.e. pods
/// and replica-sets (owner back-references are modelled as a lookup index
/// keyed by UID, never as pointers between cached objects).
pub trait OwnedObject {
    fn object_name(&self) -> &str;
    fn owner_uids(&self) -> Vec<String>;
}

struct Inner<T> {
    store: HashMap<String, T>,
    owner_index: HashMap<String, HashSet<String>>,
}

/// A keyed store that also maintains a secondary `owner_uid -> {child
/// names}` index. Store and index live behind a single readers/writer lock
/// so a reader never observes one updated without the other.
#[derive(Clone)]
pub struct IndexedCache<T> {
    inner: Arc<RwLock<Inner<T>>>,
}

impl<T: Clone + OwnedObject> IndexedCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                store: HashMap::new(),
                owner_index: HashMap::new(),
            })),
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<T> {
        let key = format!("{namespace}/{name}");
        self.inner.read().await.store.get(&key).cloned()
    }

    pub async fn list(&self) -> Vec<T> {
        self.inner.read().await.store.values().cloned().collect()
    }

    /// Names of objects owned by `uid`; callers `get` each name for the
    /// full value.
    pub async fn by_owner_uid(&self, uid: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .owner_index
            .get(uid)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies an add or update. There is no equality shortcut: owner
    /// references can change between versions of the same object, so the
    /// previously stored value (if any) is always diffed out of the index
    /// before the new value is diffed in.
    pub(crate) async fn upsert(&self, key: String, value: T) {
        let mut inner = self.inner.write().await;
        let old = inner.store.insert(key, value.clone());

        if let Some(old) = old {
            for uid in old.owner_uids() {
                if let Some(names) = inner.owner_index.get_mut(&uid) {
                    names.remove(old.object_name());
                    if names.is_empty() {
                        inner.owner_index.remove(&uid);
                    }
                }
            }
        }

        for uid in value.owner_uids() {
            inner
                .owner_index
                .entry(uid)
                .or_default()
                .insert(value.object_name().to_string());
        }
    }

    pub(crate) async fn remove(&self, key: &str) {
        let mut inner = self.inner.write().await;
        let Some(old) = inner.store.remove(key) else {
            return;
        };

        for uid in old.owner_uids() {
            if let Some(names) = inner.owner_index.get_mut(&uid) {
                names.remove(old.object_name());
                if names.is_empty() {
                    inner.owner_index.remove(&uid);
                }
            }
        }
    }
}

impl<T: Clone + OwnedObject> Default for IndexedCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Thing {
        name: String,
        owners: Vec<String>,
    }

    impl OwnedObject for Thing {
        fn object_name(&self) -> &str {
            &self.name
        }

        fn owner_uids(&self) -> Vec<String> {
            self.owners.clone()
        }
    }

    #[tokio::test]
    async fn owner_index_has_no_orphans_after_add_update_delete() {
        let cache: IndexedCache<Thing> = IndexedCache::new();

        cache
            .upsert(
                "ns/a".into(),
                Thing {
                    name: "a".into(),
                    owners: vec!["uid-1".into()],
                },
            )
            .await;
        assert_eq!(cache.by_owner_uid("uid-1").await, vec!["a".to_string()]);

        // owner changes on update: old owner's entry must disappear.
        cache
            .upsert(
                "ns/a".into(),
                Thing {
                    name: "a".into(),
                    owners: vec!["uid-2".into()],
                },
            )
            .await;
        assert!(cache.by_owner_uid("uid-1").await.is_empty());
        assert_eq!(cache.by_owner_uid("uid-2").await, vec!["a".to_string()]);

        cache.remove("ns/a").await;
        assert!(cache.by_owner_uid("uid-2").await.is_empty());
        assert!(cache.get("ns", "a").await.is_none());
    }

    #[tokio::test]
    async fn multiple_children_share_an_owner() {
        let cache: IndexedCache<Thing> = IndexedCache::new();

        cache
            .upsert(
                "ns/a".into(),
                Thing {
                    name: "a".into(),
                    owners: vec!["uid-1".into()],
                },
            )
            .await;
        cache
            .upsert(
                "ns/b".into(),
                Thing {
                    name: "b".into(),
                    owners: vec!["uid-1".into()],
                },
            )
            .await;

        let mut names = cache.by_owner_uid("uid-1").await;
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        cache.remove("ns/a").await;
        assert_eq!(cache.by_owner_uid("uid-1").await, vec!["b".to_string()]);
    }
}
