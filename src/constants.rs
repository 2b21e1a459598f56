// -
// Discovery timing defaults

/// Default interval between reconcile cycles, in seconds.
pub(crate) const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// Floor applied to the configured check interval.
pub(crate) const MIN_CHECK_INTERVAL_SECS: u64 = 1;

/// Default server-side wait for a blocking catalog query, in seconds.
pub(crate) const DEFAULT_LONG_POLL_WAIT_SECS: u64 = 50;

/// Delay before retrying after a failed per-service poll, to avoid a hot
/// error loop.
pub(crate) const POLL_ERROR_RETRY_DELAY_MS: u64 = 1_000;
