//! The watcher-tree coordinator.
//!
//! ## Key Responsibilities
//! - Reconciles the set of running service watchers against the catalog's
//!   current enumeration on a fixed interval
//! - Answers consistent, non-blocking snapshot reads across all services
//! - Tears the whole tree down promptly and idempotently on [`stop`]
//!
//! [`stop`]: Coordinator::stop

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::filters::should_watch_service_by_name;
use super::filters::should_watch_service_by_tags;
use super::service_watcher::spawn_service_watcher;
use super::service_watcher::ServiceState;
use crate::metrics::SERVICE_WATCHERS_STOPPED;
use crate::CatalogClient;
use crate::DiscoveryConfig;
use crate::DiscoveryError;
use crate::Result;
use crate::ServiceNode;

/// Keeps one long-poll watcher running per discovered service and exposes
/// their published nodes as a snapshot.
///
/// A coordinator runs until [`Coordinator::stop`] is called; it never
/// self-terminates. Sharing across consumers with an identical configuration
/// is the registry's job.
pub struct Coordinator {
    client: Arc<dyn CatalogClient>,
    config: DiscoveryConfig,

    /// Watch table: one entry per service with a running (or
    /// stopping-but-unconfirmed) watcher. The lock is only ever held for
    /// short, non-blocking critical sections.
    services: Mutex<HashMap<String, ServiceState>>,

    /// Root token; every watcher holds a child of it.
    cancel: CancellationToken,
    stopped_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Builds the coordinator and runs its first reconcile synchronously, so
    /// the first consumer never observes an empty result. A failed first
    /// enumeration is a construction error: the client is stopped and no
    /// coordinator is returned.
    pub async fn start(
        client: Arc<dyn CatalogClient>,
        config: DiscoveryConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let (stopped_tx, stopped_rx) = watch::channel(false);
        let coordinator = Arc::new(Self {
            client,
            config,
            services: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            stopped_rx,
        });

        if let Err(source) = coordinator.reconcile().await {
            coordinator.client.stop();
            return Err(DiscoveryError::Bootstrap {
                api_server: coordinator.client.api_server(),
                source: Box::new(source),
            }
            .into());
        }

        info!(
            "started service discovery watcher for {}",
            coordinator.client.api_server()
        );
        tokio::spawn(Self::run_loop(coordinator.clone(), stopped_tx));

        Ok(coordinator)
    }

    /// Consistent copy of the current published nodes for every watched
    /// service. Never blocks on network I/O: each value is a shared
    /// reference to the watcher's last wholesale publish.
    pub fn snapshot(&self) -> HashMap<String, Arc<Vec<ServiceNode>>> {
        let table = self.services.lock();
        table
            .iter()
            .map(|(name, state)| (name.clone(), state.nodes.load_full()))
            .collect()
    }

    /// Number of entries currently in the watch table.
    pub fn watched_services(&self) -> usize {
        self.services.lock().len()
    }

    pub fn api_server(&self) -> String {
        self.client.api_server()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped_rx.borrow()
    }

    /// Cancels every watcher, waits for all of them to confirm termination
    /// and releases the client transport. Safe to call more than once and
    /// from concurrent callers; every call returns only after teardown has
    /// completed.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut stopped = self.stopped_rx.clone();
        // The sender lives in the reconcile loop task; an Err here means the
        // flag was already set and dropped.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// One reconcile cycle: enumerate, filter, then converge the watch table
    /// onto the desired set. Returns only after removed watchers confirmed
    /// termination and newly added watchers finished their first iteration.
    pub(crate) async fn reconcile(&self) -> Result<()> {
        let catalog = self.client.list_services().await?;
        let desired: HashSet<String> = catalog
            .into_iter()
            .filter(|(name, tags)| {
                should_watch_service_by_name(&self.config.services, name)
                    && should_watch_service_by_tags(&self.config.tags, tags)
            })
            .map(|(name, _)| name)
            .collect();

        let mut first_iterations = Vec::new();
        let mut removed = Vec::new();
        {
            let mut table = self.services.lock();

            for name in &desired {
                if table.contains_key(name) {
                    continue;
                }
                let (state, init_rx) = spawn_service_watcher(
                    name.clone(),
                    self.client.clone(),
                    self.cancel.child_token(),
                );
                table.insert(name.clone(), state);
                first_iterations.push(init_rx);
            }

            let stale: Vec<String> = table
                .keys()
                .filter(|name| !desired.contains(*name))
                .cloned()
                .collect();
            for name in stale {
                if let Some(state) = table.remove(&name) {
                    state.cancel.cancel();
                    removed.push(state);
                }
            }
        }

        for state in removed {
            let _ = state.handle.await;
            SERVICE_WATCHERS_STOPPED.inc();
        }

        // First iterations run concurrently; a receiver erroring out means
        // its watcher was cancelled before finishing, which is just as final.
        join_all(first_iterations).await;

        Ok(())
    }

    async fn run_loop(self: Arc<Self>, stopped_tx: watch::Sender<bool>) {
        let mut ticker = interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately and the
        // construction-time reconcile already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.cancel.is_cancelled() {
                break;
            }
            // An enumeration failure skips the cycle; existing watchers keep
            // running on their last known state.
            if let Err(err) = self.reconcile().await {
                error!(
                    "cannot reconcile services from {}: {}",
                    self.client.api_server(),
                    err
                );
            }
        }

        self.teardown().await;
        let _ = stopped_tx.send(true);
    }

    async fn teardown(&self) {
        let api_server = self.client.api_server();
        info!("stopping service discovery watchers for {}", api_server);
        let start_time = Instant::now();

        let states: Vec<ServiceState> = {
            let mut table = self.services.lock();
            table.drain().map(|(_, state)| state).collect()
        };
        for state in &states {
            state.cancel.cancel();
        }
        for state in states {
            let _ = state.handle.await;
            SERVICE_WATCHERS_STOPPED.inc();
        }

        self.client.stop();
        info!(
            "stopped service discovery watcher for {} in {:?}",
            api_server,
            start_time.elapsed()
        );
    }
}
