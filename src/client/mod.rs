//! The catalog client seam.
//!
//! Everything network-shaped lives behind [`CatalogClient`]: request
//! construction, authentication, TLS, proxying and JSON decoding are the
//! implementation's concern. The discovery core only consumes the decoded
//! results, so the whole watcher tree is testable against an in-memory
//! catalog.

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Opaque change token echoed back to the catalog on blocking queries.
///
/// The upstream guarantees it changes when data changes; this core only ever
/// compares two indexes for equality. No ordering or arithmetic is defined
/// on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeIndex(u64);

impl ChangeIndex {
    /// Sentinel for "never polled"; the first blocking query sends this so
    /// the server answers immediately with current data.
    pub const ZERO: ChangeIndex = ChangeIndex(0);

    pub fn new(raw: u64) -> Self {
        ChangeIndex(raw)
    }

    /// Raw value for client implementations to echo into the upstream query.
    /// The discovery core itself only compares indexes for equality.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// One discovered service instance.
///
/// Decoded from the upstream health endpoint by the client implementation;
/// opaque to the watcher tree, which only ever moves whole `Vec<ServiceNode>`
/// values around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    /// Catalog node name
    pub node: String,
    /// Node address; the service address below wins when non-empty
    pub address: String,
    pub service_id: String,
    pub service_name: String,
    #[serde(default)]
    pub service_address: String,
    pub service_port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of one blocking per-service query.
#[derive(Debug, Clone)]
pub struct ServiceNodesUpdate {
    pub nodes: Vec<ServiceNode>,
    pub index: ChangeIndex,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    /// Plain (non-blocking) enumeration of all service names in the catalog,
    /// each with its registered tags.
    ///
    /// Used by the coordinator's reconcile cycle; tags are needed there for
    /// the by-tag predicate, which the per-service endpoint cannot express.
    async fn list_services(&self) -> Result<HashMap<String, Vec<String>>>;

    /// One long poll for the given service's instances.
    ///
    /// Blocks server-side until the data changes relative to `last_index` or
    /// the configured wait elapses, whichever comes first. An unchanged
    /// catalog returns the same index. The returned future must abort the
    /// underlying request when dropped; the watcher relies on that for
    /// prompt cancellation.
    async fn watch_service_nodes(
        &self,
        service: &str,
        last_index: ChangeIndex,
    ) -> Result<ServiceNodesUpdate>;

    /// Human-readable identity of the API server, for logs and errors.
    fn api_server(&self) -> String;

    /// Release underlying transport resources. Idempotent.
    fn stop(&self);
}
