use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use tokio_util::sync::CancellationToken;

use super::indexed::{IndexedCache, OwnedObject};
use crate::watch;

impl OwnedObject for Pod {
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

/// Pod projection, keyed by `namespace/name`, with a secondary
/// `owner_uid -> pod names` index used to resolve a replica-set's pods.
#[derive(Clone)]
pub struct PodCache {
    inner: IndexedCache<Pod>,
    api: Api<Pod>,
}

impl PodCache {
    pub fn new(api: Api<Pod>) -> Self {
        Self {
            inner: IndexedCache::new(),
            api,
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.inner.get(namespace, name).await
    }

    pub async fn by_owner_uid(&self, uid: &str) -> Vec<String> {
        self.inner.by_owner_uid(uid).await
    }

    pub async fn start(&self, cancel: CancellationToken) {
        watch::run_indexed(self.api.clone(), self.inner.clone(), cancel).await;
    }
}
