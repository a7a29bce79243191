use kube::api::DynamicObject;
use kube::Api;
use tokio_util::sync::CancellationToken;

use super::plain::Cache;
use crate::watch;

/// Cache over `scalingpolicystatuses.agronomist.io` objects, watched
/// cluster-wide like the policy cache it tracks (status objects are claim
/// markers, written into the controller's own namespace but read back
/// alongside policies from every namespace).
#[derive(Clone)]
pub struct ScalingPolicyStatusCache {
    inner: Cache<DynamicObject>,
    api: Api<DynamicObject>,
}

impl ScalingPolicyStatusCache {
    pub fn new(api: Api<DynamicObject>) -> Self {
        Self {
            inner: Cache::new(),
            api,
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<DynamicObject> {
        self.inner.get(namespace, name).await
    }

    pub async fn list(&self) -> Vec<DynamicObject> {
        self.inner.list().await
    }

    pub async fn start(&self, cancel: CancellationToken) {
        watch::run_plain(self.api.clone(), self.inner.clone(), cancel).await;
    }
}
