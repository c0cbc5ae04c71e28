//! Id and version auto-completion resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedResult, LocalPackageFeed};
use crate::version::PackageVersion;

/// Completes package ids and versions out of a local feed.
pub struct AutoCompleteResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl AutoCompleteResource {
    /// Create an auto-complete resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// Distinct package ids starting with the prefix, sorted,
    /// case-insensitive. Each id keeps the casing of its first
    /// occurrence.
    pub async fn ids_starting_with(
        &self,
        prefix: &str,
        include_prerelease: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<String>> {
        let feed = self.feed.clone();
        let prefix = prefix.to_lowercase();
        let cancel = cancel.clone();
        run_blocking(move || {
            let packages = feed.packages(&cancel)?;

            let mut ids: BTreeMap<String, String> = BTreeMap::new();
            for package in packages {
                if !include_prerelease && package.identity().version().is_prerelease() {
                    continue;
                }
                let id = package.identity().id();
                if id.to_lowercase().starts_with(&prefix) {
                    ids.entry(id.to_lowercase()).or_insert_with(|| id.to_string());
                }
            }
            Ok(ids.into_values().collect())
        })
        .await
    }

    /// All versions of an id, sorted ascending.
    pub async fn versions(
        &self,
        id: &str,
        include_prerelease: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageVersion>> {
        let feed = self.feed.clone();
        let id = id.to_string();
        let cancel = cancel.clone();
        run_blocking(move || {
            let packages = feed.find_by_id(&id, &cancel)?;
            let mut versions: Vec<PackageVersion> = packages
                .iter()
                .map(|p| p.identity().version().clone())
                .filter(|v| include_prerelease || !v.is_prerelease())
                .collect();
            versions.sort();
            Ok(versions)
        })
        .await
    }
}
