//! Shared-coordinator registry.
//!
//! Consumers presenting an identical [`DiscoveryConfig`] share one
//! [`Coordinator`] (and therefore one watcher tree and one polling load on
//! the upstream). Entries are refcounted: the last release stops the
//! coordinator and removes the entry.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::Coordinator;
use crate::DiscoveryConfig;
use crate::Result;


struct SharedEntry {
    refs: usize,
    /// Built outside the map lock so a slow first reconcile never blocks
    /// acquire/release on other configs; racing callers for the same config
    /// wait on the cell instead of building a duplicate.
    cell: Arc<OnceCell<Arc<Coordinator>>>,
}

pub struct CoordinatorRegistry {
    entries: DashMap<DiscoveryConfig, SharedEntry>,
}

lazy_static! {
    static ref GLOBAL_REGISTRY: CoordinatorRegistry = CoordinatorRegistry::new();
}

impl Default for CoordinatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Process-wide registry instance.
    pub fn global() -> &'static CoordinatorRegistry {
        &GLOBAL_REGISTRY
    }

    /// Returns the shared coordinator for `config`, building it through
    /// `factory` on first use.
    ///
    /// The factory is expected to construct the catalog client and call
    /// [`Coordinator::start`], so a factory error means construction failed
    /// and nothing is left running. A failed build releases the reference
    /// taken here; callers must pair [`release`] only with a successful
    /// acquire.
    ///
    /// [`release`]: CoordinatorRegistry::release
    pub async fn acquire<F, Fut>(
        &self,
        config: &DiscoveryConfig,
        factory: F,
    ) -> Result<Arc<Coordinator>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Coordinator>>>,
    {
        let cell = {
            let mut entry = self
                .entries
                .entry(config.clone())
                .or_insert_with(|| SharedEntry {
                    refs: 0,
                    cell: Arc::new(OnceCell::new()),
                });
            entry.refs += 1;
            entry.cell.clone()
            // The map shard lock drops here, before the potentially slow
            // first reconcile below.
        };

        match cell.get_or_try_init(factory).await {
            Ok(coordinator) => Ok(coordinator.clone()),
            Err(err) => {
                if self.drop_reference(config) {
                    // Nothing was built; just drop the empty entry.
                    self.entries
                        .remove_if(config, |_, entry| entry.refs == 0 && entry.cell.get().is_none());
                }
                Err(err)
            }
        }
    }

    /// Drops one reference to the coordinator for `config`. The last
    /// reference stops the coordinator (cancelling all of its watchers and
    /// waiting for their termination) and removes the entry.
    pub async fn release(&self, config: &DiscoveryConfig) {
        if !self.drop_reference(config) {
            return;
        }
        // Re-check under the entry lock: an acquire racing with us may have
        // revived the entry after the decrement above.
        let removed = self
            .entries
            .remove_if(config, |_, entry| entry.refs == 0)
            .and_then(|(_, entry)| entry.cell.get().cloned());
        if let Some(coordinator) = removed {
            coordinator.stop().await;
        }
    }

    /// Number of distinct configurations currently registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decrements the refcount; returns true if it reached zero.
    fn drop_reference(&self, config: &DiscoveryConfig) -> bool {
        match self.entries.get_mut(config) {
            None => {
                warn!("release for an unknown discovery config; ignoring");
                false
            }
            Some(mut entry) => {
                if entry.refs == 0 {
                    warn!("release without a matching acquire; ignoring");
                    return false;
                }
                entry.refs -= 1;
                entry.refs == 0
            }
        }
    }
}
