use std::collections::HashMap;

use kube::api::DynamicObject;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use agronomist_core::error::Result;

use crate::policy::ScalingPolicy;
use crate::store::Store;

struct Entry {
    namespace: String,
    name: String,
    resource_version: String,
    cancel: CancellationToken,
}

/// Live scaling-policy workers, keyed by `"{namespace}:{name}"`.
///
/// The registry carries no internal locking: `spec.md`'s single-writer
/// design relies entirely on the reconciler being the only caller that ever
/// mutates it. Enforce that by construction — only the reconciler should
/// hold a `&mut PolicyRegistry`.
#[derive(Default)]
pub struct PolicyRegistry {
    entries: HashMap<String, Entry>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}:{name}")
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, namespace: &str, name: &str) -> bool {
        self.entries.contains_key(&key(namespace, name))
    }

    pub fn needs_update(&self, raw: &DynamicObject) -> bool {
        let Some(entry) = self.entries.get(&key(
            raw.namespace().as_deref().unwrap_or_default(),
            &raw.name_any(),
        )) else {
            return false;
        };
        entry.resource_version != raw.resource_version().unwrap_or_default()
    }

    pub fn add(&mut self, raw: &DynamicObject, store: Store, scope: &CancellationToken) -> Result<()> {
        let namespace = raw.namespace().unwrap_or_default();
        let name = raw.name_any();

        let policy = ScalingPolicy::build(raw)?;
        let resource_version = raw.resource_version().unwrap_or_default();
        let cancel = scope.child_token();

        tokio::spawn(policy.run(store, cancel.clone()));

        self.entries.insert(
            key(&namespace, &name),
            Entry {
                namespace,
                name,
                resource_version,
                cancel,
            },
        );
        Ok(())
    }

    pub fn update(
        &mut self,
        raw: &DynamicObject,
        store: Store,
        scope: &CancellationToken,
    ) -> Result<()> {
        let index = key(
            &raw.namespace().unwrap_or_default(),
            &raw.name_any(),
        );
        if let Some(entry) = self.entries.remove(&index) {
            entry.cancel.cancel();
        }
        self.add(raw, store, scope)
    }

    pub fn remove(&mut self, namespace: &str, name: &str) {
        if let Some(entry) = self.entries.remove(&key(namespace, name)) {
            entry.cancel.cancel();
        } else {
            warn!(namespace, name, "remove called for an unregistered policy");
        }
    }

    /// `(namespace, name)` for every currently registered policy, used by
    /// the reconciler's cleanup pass.
    pub fn namespaced_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|entry| (entry.namespace.as_str(), entry.name.as_str()))
    }
}
