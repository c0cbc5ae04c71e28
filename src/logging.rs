//! Logging support.
//!
//! Diagnostics are emitted through `tracing` at the point they occur:
//! skipped version folders and unreadable directories log warnings,
//! readme and cache misses log at debug. The crate never installs a
//! global subscriber and never opens log files of its own; the
//! embedding binary owns subscriber assembly and output. This module
//! only provides the filter a host plugs into its subscriber.

use tracing_subscriber::EnvFilter;

/// Filter directive applied when `RUST_LOG` is not set.
///
/// Scoped to this crate so embedding an unconfigured host does not
/// silence or flood its own targets.
pub const DEFAULT_FILTER: &str = "packfeed=info";

/// Environment-driven filter for this crate's diagnostics.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. The host
/// decides where and when the composed subscriber is installed:
///
/// ```
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let _subscriber = tracing_subscriber::registry()
///     .with(packfeed::logging::env_filter())
///     .with(tracing_subscriber::fmt::layer());
/// ```
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
