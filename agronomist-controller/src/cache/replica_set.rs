use k8s_openapi::api::apps::v1::ReplicaSet;
use kube::Api;
use tokio_util::sync::CancellationToken;

use super::indexed::{IndexedCache, OwnedObject};
use crate::watch;

impl OwnedObject for ReplicaSet {
    fn object_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn owner_uids(&self) -> Vec<String> {
        self.metadata
            .owner_references
            .iter()
            .flatten()
            .map(|owner| owner.uid.clone())
            .collect()
    }
}

/// ReplicaSet projection, keyed by `namespace/name`, with a secondary
/// `owner_uid -> replica-set names` index used to resolve a deployment's
/// replica-sets.
#[derive(Clone)]
pub struct ReplicaSetCache {
    inner: IndexedCache<ReplicaSet>,
    api: Api<ReplicaSet>,
}

impl ReplicaSetCache {
    pub fn new(api: Api<ReplicaSet>) -> Self {
        Self {
            inner: IndexedCache::new(),
            api,
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<ReplicaSet> {
        self.inner.get(namespace, name).await
    }

    pub async fn by_owner_uid(&self, uid: &str) -> Vec<String> {
        self.inner.by_owner_uid(uid).await
    }

    pub async fn start(&self, cancel: CancellationToken) {
        watch::run_indexed(self.api.clone(), self.inner.clone(), cancel).await;
    }
}
