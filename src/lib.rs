//! Dynamic target-discovery engine for metrics collection.
//!
//! Watches a Consul-compatible catalog with one long-poll task per service
//! and keeps an always-fresh, tear-free snapshot of the discovered instances
//! for a scrape scheduler to read.

mod client;
mod config;
mod constants;
mod discovery;
mod errors;
mod metrics;
mod registry;

pub use client::*;
pub use config::*;
pub use discovery::*;
pub use errors::*;
pub use metrics::*;
pub use registry::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
