//! Drives a cache's store/index from the orchestrator's watch stream.
//!
//! `spec.md` treats the watch transport as an external collaborator: "an
//! event source delivering add/update/delete notifications keyed by
//! `namespace/name`". This module is the one place that event source is
//! named concretely (`kube::runtime::watcher`); everything above it only
//! ever sees `Cache`/`IndexedCache`.

use futures::TryStreamExt;
use kube::runtime::watcher::{self, Event};
use kube::{Api, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::{Cache, IndexedCache, OwnedObject};

fn key_of<K: ResourceExt>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Runs a plain (non owner-indexed) cache's watch loop until `cancel` fires.
pub(crate) async fn run_plain<K>(api: Api<K>, cache: Cache<K>, cancel: CancellationToken)
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    let stream = watcher::watcher(api, watcher::Config::default());
    tokio::pin!(stream);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = stream.try_next() => {
                match next {
                    Ok(Some(event)) => apply_plain(&cache, event).await,
                    Ok(None) => return,
                    Err(err) => warn!(error = %err, "watch stream error, retrying"),
                }
            }
        }
    }
}

async fn apply_plain<K: ResourceExt + Clone>(cache: &Cache<K>, event: Event<K>) {
    match event {
        Event::Apply(obj) | Event::InitApply(obj) => {
            let key = key_of(&obj);
            cache.upsert(key, obj).await;
        }
        Event::Delete(obj) => {
            cache.remove(&key_of(&obj)).await;
        }
        Event::Init | Event::InitDone => {}
    }
}

/// Runs an owner-indexed cache's watch loop until `cancel` fires.
pub(crate) async fn run_indexed<K>(api: Api<K>, cache: IndexedCache<K>, cancel: CancellationToken)
where
    K: kube::Resource
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned
        + OwnedObject
        + Send
        + Sync
        + 'static,
{
    let stream = watcher::watcher(api, watcher::Config::default());
    tokio::pin!(stream);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = stream.try_next() => {
                match next {
                    Ok(Some(event)) => apply_indexed(&cache, event).await,
                    Ok(None) => return,
                    Err(err) => warn!(error = %err, "watch stream error, retrying"),
                }
            }
        }
    }
}

async fn apply_indexed<K: ResourceExt + Clone + OwnedObject>(
    cache: &IndexedCache<K>,
    event: Event<K>,
) {
    match event {
        Event::Apply(obj) | Event::InitApply(obj) => {
            let key = key_of(&obj);
            cache.upsert(key, obj).await;
        }
        Event::Delete(obj) => {
            cache.remove(&key_of(&obj)).await;
        }
        Event::Init | Event::InitDone => {}
    }
}
