//! Aggregates the five caches plus the three orchestrator clients behind a
//! single handle so workers and the reconciler take one argument instead of
//! a wide parameter list.

use std::sync::Arc;

use kube::api::ApiResource;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use crate::cache::{
    DeploymentCache, PodCache, ReplicaSetCache, ScalingPolicyCache, ScalingPolicyStatusCache,
};
use crate::client::{DynamicClient, KubeClients, MetricsClient, WorkloadsClient};

pub const SCALING_POLICY_GROUP: &str = "agronomist.io";
pub const SCALING_POLICY_VERSION: &str = "v1";

pub fn scaling_policy_resource() -> ApiResource {
    ApiResource {
        group: SCALING_POLICY_GROUP.into(),
        version: SCALING_POLICY_VERSION.into(),
        api_version: format!("{SCALING_POLICY_GROUP}/{SCALING_POLICY_VERSION}"),
        kind: "ScalingPolicy".into(),
        plural: "scalingpolicies".into(),
    }
}

pub fn scaling_policy_status_resource() -> ApiResource {
    ApiResource {
        group: SCALING_POLICY_GROUP.into(),
        version: SCALING_POLICY_VERSION.into(),
        api_version: format!("{SCALING_POLICY_GROUP}/{SCALING_POLICY_VERSION}"),
        kind: "ScalingPolicyStatus".into(),
        plural: "scalingpolicystatuses".into(),
    }
}

#[derive(Clone)]
pub struct Store {
    pub deployments: DeploymentCache,
    pub replica_sets: ReplicaSetCache,
    pub pods: PodCache,
    pub scaling_policies: ScalingPolicyCache,
    pub scaling_policy_statuses: ScalingPolicyStatusCache,

    pub workloads: Arc<dyn WorkloadsClient>,
    pub metrics: Arc<dyn MetricsClient>,
    pub dynamic: Arc<dyn DynamicClient>,
}

impl Store {
    /// Builds a store wired against the real Kubernetes API reachable
    /// through `client`. `client` is already scoped to whatever kubeconfig
    /// or in-cluster config the caller resolved.
    pub fn new(client: Client) -> Self {
        let status_resource = scaling_policy_status_resource();
        let policy_resource = scaling_policy_resource();

        let deployments = DeploymentCache::new(Api::all(client.clone()));
        let replica_sets = ReplicaSetCache::new(Api::all(client.clone()));
        let pods = PodCache::new(Api::all(client.clone()));
        let scaling_policies = ScalingPolicyCache::new(Api::all_with(
            client.clone(),
            &policy_resource,
        ));
        let scaling_policy_statuses = ScalingPolicyStatusCache::new(Api::all_with(
            client.clone(),
            &status_resource,
        ));

        let kube_clients = Arc::new(KubeClients::new(client, status_resource));

        Self {
            deployments,
            replica_sets,
            pods,
            scaling_policies,
            scaling_policy_statuses,
            workloads: kube_clients.clone(),
            metrics: kube_clients.clone(),
            dynamic: kube_clients,
        }
    }

    /// Starts every cache's watch loop concurrently under `cancel`.
    pub async fn start(&self, cancel: CancellationToken) {
        tokio::join!(
            self.deployments.start(cancel.clone()),
            self.replica_sets.start(cancel.clone()),
            self.pods.start(cancel.clone()),
            self.scaling_policies.start(cancel.clone()),
            self.scaling_policy_statuses.start(cancel),
        );
    }
}
