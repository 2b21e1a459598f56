//! Shared test fixtures.
//!
//! [`FakeCatalog`] is an in-memory Consul-like catalog whose blocking
//! queries genuinely long-poll: they return immediately when the caller's
//! index is stale and otherwise park on a notifier until the data changes or
//! the configured server-side wait elapses. That makes watcher cancellation
//! and pacing observable from tests without a network.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::CatalogClient;
use crate::ChangeIndex;
use crate::ClientError;
use crate::Result;
use crate::ServiceNode;
use crate::ServiceNodesUpdate;

static INIT: Once = Once::new();

pub(crate) fn enable_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub(crate) fn test_node(service: &str, id: &str) -> ServiceNode {
    ServiceNode {
        node: format!("node-{}", id),
        address: "10.0.0.1".to_string(),
        service_id: id.to_string(),
        service_name: service.to_string(),
        service_address: String::new(),
        service_port: 8080,
        tags: Vec::new(),
    }
}

#[derive(Clone, Default)]
struct FakeService {
    tags: Vec<String>,
    index: u64,
    nodes: Vec<ServiceNode>,
}

pub(crate) struct FakeCatalog {
    services: Mutex<HashMap<String, FakeService>>,
    changed: Notify,
    long_poll_wait: Duration,
    fail_listing: AtomicBool,
    fail_polls: AtomicBool,
    poll_calls: Mutex<HashMap<String, u64>>,
    stop_calls: AtomicU64,
}

impl FakeCatalog {
    pub(crate) fn new(long_poll_wait: Duration) -> Arc<Self> {
        Arc::new(Self {
            services: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            long_poll_wait,
            fail_listing: AtomicBool::new(false),
            fail_polls: AtomicBool::new(false),
            poll_calls: Mutex::new(HashMap::new()),
            stop_calls: AtomicU64::new(0),
        })
    }

    /// Registers (or replaces) a service and wakes every parked long poll.
    pub(crate) fn register(
        &self,
        name: &str,
        tags: &[&str],
        index: u64,
        nodes: Vec<ServiceNode>,
    ) {
        self.services.lock().insert(
            name.to_string(),
            FakeService {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                index,
                nodes,
            },
        );
        self.changed.notify_waiters();
    }

    pub(crate) fn deregister(&self, name: &str) {
        self.services.lock().remove(name);
        self.changed.notify_waiters();
    }

    pub(crate) fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    /// How many blocking queries have been issued for the given service.
    pub(crate) fn poll_count(&self, service: &str) -> u64 {
        self.poll_calls.lock().get(service).copied().unwrap_or(0)
    }

    pub(crate) fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_services(&self) -> Result<HashMap<String, Vec<String>>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("injected listing failure".to_string()).into());
        }
        let services = self.services.lock();
        Ok(services
            .iter()
            .map(|(name, service)| (name.clone(), service.tags.clone()))
            .collect())
    }

    async fn watch_service_nodes(
        &self,
        service: &str,
        last_index: ChangeIndex,
    ) -> Result<ServiceNodesUpdate> {
        *self
            .poll_calls
            .lock()
            .entry(service.to_string())
            .or_insert(0) += 1;

        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("injected poll failure".to_string()).into());
        }

        let deadline = sleep(self.long_poll_wait);
        tokio::pin!(deadline);
        loop {
            // Register for wakeups before inspecting state, otherwise an
            // update between the check and the await would be lost.
            let notified = self.changed.notified();
            {
                let services = self.services.lock();
                if let Some(current) = services.get(service) {
                    if ChangeIndex::new(current.index) != last_index {
                        return Ok(ServiceNodesUpdate {
                            nodes: current.nodes.clone(),
                            index: ChangeIndex::new(current.index),
                        });
                    }
                }
            }
            tokio::select! {
                _ = notified => continue,
                _ = &mut deadline => {
                    // Server-side wait elapsed: answer with the current
                    // state and an unchanged index.
                    let services = self.services.lock();
                    let (nodes, index) = services
                        .get(service)
                        .map(|s| (s.nodes.clone(), ChangeIndex::new(s.index)))
                        .unwrap_or((Vec::new(), last_index));
                    return Ok(ServiceNodesUpdate { nodes, index });
                }
            }
        }
    }

    fn api_server(&self) -> String {
        "http://fake-catalog:8500".to_string()
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}
