//! The three orchestrator-facing clients a worker or reconciler needs
//! beyond what the caches already hold: writing a deployment's scale,
//! reading a pod's current metrics, and creating/deleting status objects.
//!
//! Each is a small trait so `Store` can be constructed against a fake in
//! tests; the only concrete implementation is the `kube`-backed one below.

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use agronomist_core::error::Result;

use crate::metrics::PodMetrics;

#[async_trait]
pub trait WorkloadsClient: Send + Sync {
    async fn set_replicas(&self, namespace: &str, deployment: &str, replicas: i32) -> Result<()>;
}

#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// `Ok(None)` means the metrics-server has no (yet) sample for this pod;
    /// this is the common case for a pod that just started.
    async fn pod_metrics(&self, namespace: &str, pod: &str) -> Result<Option<PodMetrics>>;
}

#[async_trait]
pub trait DynamicClient: Send + Sync {
    async fn create(&self, namespace: &str, object: DynamicObject) -> Result<()>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
    /// Best-effort write of a human-readable error onto a status object's
    /// `spec.error`. Failures here are not propagated — a failing
    /// diagnostic write must not mask the original error.
    async fn set_error(&self, namespace: &str, status_name: &str, message: &str) -> Result<()>;
}

/// `kube`-backed implementation shared by all three traits, since all three
/// ultimately go through the same `kube::Client`.
pub struct KubeClients {
    client: Client,
    status_resource: ApiResource,
}

impl KubeClients {
    pub fn new(client: Client, status_resource: ApiResource) -> Self {
        Self {
            client,
            status_resource,
        }
    }
}

#[async_trait]
impl WorkloadsClient for KubeClients {
    async fn set_replicas(&self, namespace: &str, deployment: &str, replicas: i32) -> Result<()> {
        let api: Api<k8s_openapi::api::apps::v1::Deployment> =
            Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        api.patch_scale(deployment, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MetricsClient for KubeClients {
    async fn pod_metrics(&self, namespace: &str, pod: &str) -> Result<Option<PodMetrics>> {
        let api: Api<PodMetrics> = Api::namespaced(self.client.clone(), namespace);
        match api.get(pod).await {
            Ok(metrics) => Ok(Some(metrics)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl DynamicClient for KubeClients {
    async fn create(&self, namespace: &str, object: DynamicObject) -> Result<()> {
        let api = Api::<DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &self.status_resource,
        );
        match api.create(&PostParams::default(), &object).await {
            Ok(_) => Ok(()),
            // Another replica already created this status; it won the race.
            Err(kube::Error::Api(err)) if err.code == 409 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let api = Api::<DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &self.status_resource,
        );
        api.delete(name, &Default::default()).await?;
        Ok(())
    }

    async fn set_error(&self, namespace: &str, status_name: &str, message: &str) -> Result<()> {
        let api = Api::<DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &self.status_resource,
        );
        let patch = serde_json::json!({ "spec": { "error": message } });
        api.patch(status_name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
