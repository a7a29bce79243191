use std::time::Duration;

use kube::api::DynamicObject;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agronomist_core::error::{Error, Result};

use super::nested::{nested_i64, nested_string};
use super::program::PolicyProgram;
use crate::store::Store;

/// A single `scalingpolicies.agronomist.io` object, compiled into a worker.
///
/// `resource_version` is carried so the registry can tell a stale worker
/// from a current one without re-parsing the whole object every tick.
pub struct ScalingPolicy {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub resource_version: String,

    program: PolicyProgram,

    min: i64,
    max: i64,
    max_step_up: i64,
    max_step_down: i64,
    up_throttle: Duration,
    down_throttle: Duration,
    check_interval: Duration,

    last_scale: Option<std::time::Instant>,
}

impl ScalingPolicy {
    /// Extracts typed fields from the unstructured document. Any missing
    /// field or Rego compilation error surfaces as a construction failure
    /// naming the offending field.
    pub fn build(raw: &DynamicObject) -> Result<Self> {
        let data = &raw.data;

        let deployment = required_string(data, &["spec", "deployment"])?;
        let rego_source = required_string(data, &["spec", "rego"])?;
        let min = required_i64(data, &["spec", "min"])?;
        let max = required_i64(data, &["spec", "max"])?;
        let max_step_up = required_i64(data, &["spec", "maxStepUp"])?;
        let max_step_down = required_i64(data, &["spec", "maxStepDown"])?;
        let up_delay = required_i64(data, &["spec", "upDelay"])?;
        let down_delay = required_i64(data, &["spec", "downDelay"])?;
        let interval = required_i64(data, &["spec", "interval"])?;

        let program = PolicyProgram::compile(&rego_source)
            .map_err(|err| Error::Construction(format!("scaling policy spec.rego: {err}")))?;

        Ok(Self {
            name: raw.metadata.name.clone().unwrap_or_default(),
            namespace: raw.metadata.namespace.clone().unwrap_or_default(),
            deployment,
            resource_version: raw.metadata.resource_version.clone().unwrap_or_default(),
            program,
            min,
            max,
            max_step_up,
            max_step_down,
            up_throttle: Duration::from_secs(up_delay.max(0) as u64),
            down_throttle: Duration::from_secs(down_delay.max(0) as u64),
            check_interval: Duration::from_secs(interval.max(0) as u64),
            last_scale: None,
        })
    }

    /// Ticks every `check_interval` until `cancel` fires. A tick error is
    /// logged and the loop continues; only cancellation stops it.
    pub async fn run(mut self, store: Store, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.check_interval) => {
                    match self.determine_scale(&store).await {
                        Ok(target) => {
                            if let Err(err) = self.apply_scale(target, &store).await {
                                warn!(policy = %self.name, namespace = %self.namespace, error = %err, "scale application failed");
                            }
                        }
                        Err(err) => {
                            warn!(policy = %self.name, namespace = %self.namespace, error = %err, "scale determination failed");
                        }
                    }
                }
            }
        }
    }

    async fn determine_scale(&self, store: &Store) -> Result<i64> {
        let deployment = store
            .deployments
            .get(&self.namespace, &self.deployment)
            .await
            .ok_or_else(|| {
                Error::Construction(format!(
                    "deployment {}/{} does not exist",
                    self.namespace, self.deployment
                ))
            })?;

        let deployment_uid = deployment
            .metadata
            .uid
            .clone()
            .ok_or_else(|| Error::Construction("deployment has no uid".to_string()))?;

        let mut pod_names = Vec::new();
        for replica_set_name in store.replica_sets.by_owner_uid(&deployment_uid).await {
            let Some(replica_set) = store.replica_sets.get(&self.namespace, &replica_set_name).await
            else {
                warn!(replica_set = %replica_set_name, "replica set in owner index but not in cache");
                continue;
            };
            let Some(rs_uid) = replica_set.metadata.uid.clone() else {
                continue;
            };
            pod_names.extend(store.pods.by_owner_uid(&rs_uid).await);
        }

        let mut pods = Vec::new();
        let mut pod_metrics = Vec::new();
        for pod_name in pod_names {
            match store.metrics.pod_metrics(&self.namespace, &pod_name).await {
                Ok(Some(metrics)) => pod_metrics.push(metrics),
                Ok(None) | Err(_) => {
                    info!(pod = %pod_name, "pod metrics not ready");
                }
            }

            // A pod still contributes to `pods` if its object is cached,
            // independent of whether its metrics arrived this tick.
            if let Some(pod) = store.pods.get(&self.namespace, &pod_name).await {
                pods.push(pod);
            }
        }

        let input = json!({
            "deployment": deployment,
            "pods": pods,
            "podMetrics": pod_metrics,
        });

        self.program.evaluate(input)
    }

    /// `current = max(0, target - current)` clamped to `[min, max]`, then
    /// capped by `max_step_up`/`max_step_down` in the moving direction.
    ///
    /// The step-down branch below uses `max_step_down`; an earlier version
    /// of this formula mistakenly reused `max_step_up` in that branch,
    /// which let scale-down steps shrink by however much scale-up was
    /// allowed rather than the configured down-step cap.
    fn normalize(&self, target: i64, current: i64) -> i64 {
        let target = target.clamp(self.min, self.max);

        if target > current {
            return current + (target - current).min(self.max_step_up);
        }
        if target < current {
            return current - (current - target).min(self.max_step_down);
        }
        target
    }

    async fn apply_scale(&mut self, target: i64, store: &Store) -> Result<()> {
        let Some(deployment) = store.deployments.get(&self.namespace, &self.deployment).await else {
            warn!(deployment = %self.deployment, namespace = %self.namespace, "deployment does not exist");
            return Ok(());
        };

        let current = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1) as i64;

        let desired = self.normalize(target, current);

        if desired == current {
            return Ok(());
        }

        let now = std::time::Instant::now();
        if desired > current {
            if let Some(last) = self.last_scale {
                if now.duration_since(last) < self.up_throttle {
                    info!(policy = %self.name, "scale up throttled");
                    return Ok(());
                }
            }
        } else if let Some(last) = self.last_scale {
            if now.duration_since(last) < self.down_throttle {
                info!(policy = %self.name, "scale down throttled");
                return Ok(());
            }
        }

        store
            .workloads
            .set_replicas(&self.namespace, &self.deployment, desired as i32)
            .await?;
        self.last_scale = Some(now);
        info!(policy = %self.name, namespace = %self.namespace, from = current, to = desired, "scaled deployment");

        Ok(())
    }
}

fn required_string(data: &Value, path: &[&str]) -> Result<String> {
    nested_string(data, path)
        .map_err(|err| Error::Construction(format!("scaling policy {err}")))?
        .ok_or_else(|| Error::Construction(format!("scaling policy `{}` missing", path.join("."))))
}

fn required_i64(data: &Value, path: &[&str]) -> Result<i64> {
    nested_i64(data, path)
        .map_err(|err| Error::Construction(format!("scaling policy {err}")))?
        .ok_or_else(|| Error::Construction(format!("scaling policy `{}` missing", path.join("."))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with_steps(min: i64, max: i64, max_step_up: i64, max_step_down: i64) -> ScalingPolicy {
        ScalingPolicy {
            name: "test".to_string(),
            namespace: "default".to_string(),
            deployment: "web".to_string(),
            resource_version: "1".to_string(),
            program: PolicyProgram::compile("package main\nscale := 0").unwrap(),
            min,
            max,
            max_step_up,
            max_step_down,
            up_throttle: Duration::from_secs(0),
            down_throttle: Duration::from_secs(0),
            check_interval: Duration::from_secs(1),
            last_scale: None,
        }
    }

    #[test]
    fn clamps_to_min_and_max() {
        let policy = policy_with_steps(2, 10, 100, 100);
        assert_eq!(policy.normalize(0, 5), 2);
        assert_eq!(policy.normalize(50, 5), 10);
    }

    #[test]
    fn caps_step_up_by_max_step_up() {
        let policy = policy_with_steps(0, 100, 2, 100);
        assert_eq!(policy.normalize(10, 3), 5);
    }

    #[test]
    fn caps_step_down_by_max_step_down_not_max_step_up() {
        let policy = policy_with_steps(0, 100, 50, 2);
        assert_eq!(policy.normalize(0, 10), 8);
    }

    #[test]
    fn no_change_when_target_equals_current() {
        let policy = policy_with_steps(0, 100, 5, 5);
        assert_eq!(policy.normalize(7, 7), 7);
    }
}
