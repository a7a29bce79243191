use kube::api::DynamicObject;
use kube::Api;
use tokio_util::sync::CancellationToken;

use super::plain::Cache;
use crate::watch;

/// Cache over `scalingpolicies.agronomist.io` custom resources, consumed as
/// unstructured documents (decoded path-by-path, see
/// `crate::policy::nested`) rather than a generated typed struct.
#[derive(Clone)]
pub struct ScalingPolicyCache {
    inner: Cache<DynamicObject>,
    api: Api<DynamicObject>,
}

impl ScalingPolicyCache {
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
