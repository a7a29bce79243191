use std::collections::HashSet;
use std::time::Duration;

use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use agronomist_core::error::Result;
use agronomist_core::key::NamespaceName;

use crate::registry::PolicyRegistry;
use crate::store::Store;

/// Identity this controller replica claims scaling-policy statuses under.
/// Claims are keyed by `(owner_name, owner_uid)`; there is no lease renewal
/// or expiry, so a replica that dies leaves its claimed statuses orphaned
/// until a human deletes them.
#[derive(Clone)]
pub struct OwnerIdentity {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

pub struct ScalingPolicyReconciler {
    owner: OwnerIdentity,
    interval: Duration,
    registry: PolicyRegistry,
    store: Store,
}

impl ScalingPolicyReconciler {
    pub fn new(owner: OwnerIdentity, store: Store) -> Self {
        Self {
            owner,
            interval: Duration::from_secs(1),
            registry: PolicyRegistry::new(),
            store,
        }
    }

    /// Ticks every second until `cancel` fires. The three phases run in
    /// this exact order every tick, each independent of the others'
    /// errors — a failure in one phase does not skip the next.
    pub async fn run(mut self, cancel: CancellationToken) {
        let workers = cancel.child_token();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    workers.cancel();
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(err) = self.attempt_claims(&workers).await {
                        error!(error = %err, "attempt_claims failed");
                    }
                    if let Err(err) = self.update_claims(&workers).await {
                        error!(error = %err, "update_claims failed");
                    }
                    if let Err(err) = self.cleanup().await {
                        error!(error = %err, "cleanup failed");
                    }
                }
            }
        }
    }

    async fn attempt_claims(&mut self, workers: &CancellationToken) -> Result<()> {
        let statuses = self.store.scaling_policy_statuses.list().await;
        let policies = self.store.scaling_policies.list().await;

        let claimed: HashSet<String> = statuses.iter().map(|s| s.name_any()).collect();

        for policy in &policies {
            let status_name = NamespaceName::new(
                policy.namespace().unwrap_or_default(),
                policy.name_any(),
            )
            .status_name();

            if claimed.contains(&status_name) {
                continue;
            }

            self.create_status(policy, &status_name).await?;
        }

        for status in &statuses {
            if !self.owns(status) {
                continue;
            }

            let labels = status.labels();
            let Some(namespace) = labels.get("policy-namespace") else {
                continue;
            };
            let Some(name) = labels.get("policy-name") else {
                continue;
            };

            if self.registry.exists(namespace, name) {
                continue;
            }

            let Some(policy) = self.store.scaling_policies.get(namespace, name).await else {
                warn!(namespace, name, "scaling policy disappeared before claim start");
                continue;
            };

            // Construction errors (bad rego, missing fields) bubble up here
            // but must not abort the rest of this phase; surface them on
            // the status object best-effort and move on to the next claim.
            if let Err(err) = self.registry.add(&policy, self.store.clone(), workers) {
                warn!(namespace, name, error = %err, "scaling policy construction failed");
                let status_name = status.name_any();
                if let Err(write_err) = self
                    .store
                    .dynamic
                    .set_error(&self.owner.namespace, &status_name, &err.to_string())
                    .await
                {
                    warn!(status = %status_name, error = %write_err, "failed to record construction error on status");
                }
            }
        }

        Ok(())
    }

    async fn update_claims(&mut self, workers: &CancellationToken) -> Result<()> {
        for policy in self.store.scaling_policies.list().await {
            if !self.registry.needs_update(&policy) {
                continue;
            }
            self.registry.update(&policy, self.store.clone(), workers)?;
        }
        Ok(())
    }

    /// Deletes statuses whose policy no longer exists, and drops registered
    /// workers whose claim we no longer own.
    ///
    /// This does not re-read the authoritative store before deleting a
    /// status — both caches could be momentarily out of sync, and a status
    /// for a peer's just-created policy can be deleted here if its policy
    /// hasn't shown up in this cache yet. That hazard is carried forward
    /// deliberately rather than patched over with a live read.
    async fn cleanup(&mut self) -> Result<()> {
        let statuses = self.store.scaling_policy_statuses.list().await;
        let policies = self.store.scaling_policies.list().await;

        let policy_set: HashSet<String> = policies
            .iter()
            .map(|p| {
                NamespaceName::new(p.namespace().unwrap_or_default(), p.name_any()).status_name()
            })
            .collect();

        for status in &statuses {
            if policy_set.contains(&status.name_any()) {
                continue;
            }
            self.store
                .dynamic
                .delete(&self.owner.namespace, &status.name_any())
                .await?;
        }

        let owned: HashSet<String> = statuses
            .iter()
            .filter(|status| self.owns(status))
            .map(|status| status.name_any())
            .collect();

        let stale: Vec<(String, String)> = self
            .registry
            .namespaced_names()
            .filter(|(ns, name)| {
                let status_name = NamespaceName::new(ns.to_string(), name.to_string()).status_name();
                !owned.contains(&status_name)
            })
            .map(|(ns, name)| (ns.to_string(), name.to_string()))
            .collect();

        for (namespace, name) in stale {
            self.registry.remove(&namespace, &name);
        }

        Ok(())
    }

    fn owns(&self, status: &DynamicObject) -> bool {
        status.owner_references().iter().any(|owner| {
            owner.name == self.owner.name && owner.uid == self.owner.uid
        })
    }

    async fn create_status(&self, policy: &DynamicObject, status_name: &str) -> Result<()> {
        let policy_namespace = policy.namespace().unwrap_or_default();
        let policy_name = policy.name_any();

        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "agronomist.io/v1",
            "kind": "ScalingPolicyStatus",
            "metadata": {
                "name": status_name,
                "namespace": self.owner.namespace,
                "labels": {
                    "policy-namespace": policy_namespace,
                    "policy-name": policy_name,
                },
                "ownerReferences": [{
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "name": self.owner.name,
                    "uid": self.owner.uid,
                }],
            },
            "spec": { "error": "" },
        }))?;

        info!(namespace = %policy_namespace, name = %policy_name, "claiming scaling policy");
        self.store.dynamic.create(&self.owner.namespace, object).await
    }
}
