//! Configuration for one discovery target.
//!
//! A [`DiscoveryConfig`] captures every field that affects watch behavior.
//! It is its own sharing fingerprint: two configs compare equal exactly when
//! a coordinator built from one can serve consumers of the other, which is
//! what the registry keys on.

use std::collections::BTreeMap;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CHECK_INTERVAL_SECS;
use crate::constants::DEFAULT_LONG_POLL_WAIT_SECS;
use crate::constants::MIN_CHECK_INTERVAL_SECS;
use crate::Result;


#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryConfig {
    /// Catalog API server, e.g. "http://127.0.0.1:8500"
    pub server: String,

    /// Bearer token handed to the client implementation
    #[serde(default)]
    pub token: Option<String>,

    /// Datacenter to query; the server's own datacenter when unset
    #[serde(default)]
    pub datacenter: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub partition: Option<String>,

    /// Node metadata filter pairs, forwarded verbatim to the catalog
    #[serde(default)]
    pub node_meta: BTreeMap<String, String>,

    /// Service name allow-list; empty means watch everything
    #[serde(default)]
    pub services: Vec<String>,

    /// Tags every watched service must carry
    #[serde(default)]
    pub tags: Vec<String>,

    /// Optional server-side filter expression for the enumeration query
    #[serde(default)]
    pub filter: Option<String>,

    /// Allow stale reads from catalog followers
    #[serde(default = "default_allow_stale")]
    pub allow_stale: bool,

    /// Interval between reconcile cycles in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Server-side wait for blocking queries in seconds
    #[serde(default = "default_long_poll_wait")]
    pub long_poll_wait_secs: u64,
}

fn default_allow_stale() -> bool {
    true
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_long_poll_wait() -> u64 {
    DEFAULT_LONG_POLL_WAIT_SECS
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8500".to_string(),
            token: None,
            datacenter: None,
            namespace: None,
            partition: None,
            node_meta: BTreeMap::new(),
            services: Vec::new(),
            tags: Vec::new(),
            filter: None,
            allow_stale: default_allow_stale(),
            check_interval_secs: default_check_interval(),
            long_poll_wait_secs: default_long_poll_wait(),
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration with priority:
    /// 1. Hardcoded defaults
    /// 2. Config file (TOML)
    /// 3. Environment variables with `SD__` prefix (highest priority)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SD")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: DiscoveryConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Message("server address must not be empty".to_string()).into());
        }
        if self.long_poll_wait_secs == 0 {
            return Err(
                ConfigError::Message("long_poll_wait_secs must be positive".to_string()).into(),
            );
        }
        Ok(())
    }

    /// Reconcile interval with the 1s floor applied.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(MIN_CHECK_INTERVAL_SECS))
    }

    pub fn long_poll_wait(&self) -> Duration {
        Duration::from_secs(self.long_poll_wait_secs)
    }
}
