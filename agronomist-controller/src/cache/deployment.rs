use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use tokio_util::sync::CancellationToken;

use super::plain::Cache;
use crate::watch;

/// Deployment projection, keyed by `namespace/name`. No owner index: the
/// reconciler and workers only ever look deployments up by name.
#[derive(Clone)]
pub struct DeploymentCache {
    inner: Cache<Deployment>,
    api: Api<Deployment>,
}

impl DeploymentCache {
    pub fn new(api: Api<Deployment>) -> Self {
        Self {
            inner: Cache::new(),
            api,
        }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.inner.get(namespace, name).await
    }

    pub async fn start(&self, cancel: CancellationToken) {
        watch::run_plain(self.api.clone(), self.inner.clone(), cancel).await;
    }
}
