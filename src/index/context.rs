//! Per-call cache policy.

/// Cache policy carried by each query.
///
/// By default cached per-id results are served for the rest of the
/// session even if the folder changed underneath; a feed's folder for
/// a given id only changes through this tool's own installs. Setting
/// `refresh_memory_cache` forces the next query to rescan and replace
/// the cached entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheContext {
    /// Recompute and overwrite cached entries instead of reusing them.
    pub refresh_memory_cache: bool,
}

impl CacheContext {
    /// Context that serves cached results.
    pub fn cached() -> Self {
        Self::default()
    }

    /// Context that forces a rescan.
    pub fn refresh() -> Self {
        Self {
            refresh_memory_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_serves_cache() {
        assert!(!CacheContext::default().refresh_memory_cache);
        assert!(!CacheContext::cached().refresh_memory_cache);
    }

    #[test]
    fn test_refresh() {
        assert!(CacheContext::refresh().refresh_memory_cache);
    }
}
