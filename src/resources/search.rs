//! In-memory package search over a local feed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedResult, LocalPackageFeed};
use crate::package::LocalPackageInfo;
use crate::resources::list::collapse_to_highest;
use crate::resources::metadata::{metadata_for, PackageMetadata};

/// Search options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilter {
    /// Include prerelease versions in results.
    pub include_prerelease: bool,
}

impl SearchFilter {
    /// Filter that only surfaces stable versions.
    pub fn stable() -> Self {
        Self::default()
    }

    /// Filter that includes prerelease versions.
    pub fn prerelease() -> Self {
        Self {
            include_prerelease: true,
        }
    }
}

/// Searches a local feed in memory.
///
/// Filters are applied over the full package list: correct but O(n),
/// acceptable because local feeds are small compared to a hosted
/// search index. Results collapse to the highest version per id.
pub struct PackageSearchResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl PackageSearchResource {
    /// Create a search resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// Search for packages whose id, description, or tags contain the
    /// term (case-insensitive). An empty term matches everything.
    pub async fn search(
        &self,
        term: &str,
        filter: &SearchFilter,
        skip: usize,
        take: usize,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageMetadata>> {
        let feed = self.feed.clone();
        let term = term.to_lowercase();
        let include_prerelease = filter.include_prerelease;
        let cancel = cancel.clone();
        run_blocking(move || {
            let mut packages = feed.packages(&cancel)?;
            if !include_prerelease {
                packages.retain(|p| !p.identity().version().is_prerelease());
            }

            // Match before collapsing so a hit on any version keeps the
            // id in the result set.
            let mut matched = Vec::new();
            for package in packages {
                if matches_term(&package, feed.as_ref(), &term)? {
                    matched.push(package);
                }
            }

            matched.sort_by(|a, b| a.identity().cmp(b.identity()));
            let collapsed = collapse_to_highest(matched);

            collapsed
                .iter()
                .skip(skip)
                .take(take)
                .map(|p| metadata_for(p, feed.as_ref()))
                .collect()
        })
        .await
    }
}

fn matches_term(
    package: &LocalPackageInfo,
    feed: &dyn LocalPackageFeed,
    term: &str,
) -> FeedResult<bool> {
    if term.is_empty() {
        return Ok(true);
    }
    if package.identity().id().to_lowercase().contains(term) {
        return Ok(true);
    }

    let metadata = metadata_for(package, feed)?;
    let description_hit = metadata
        .description
        .map(|d| d.to_lowercase().contains(term))
        .unwrap_or(false);
    let tags_hit = metadata
        .tags
        .map(|t| t.to_lowercase().contains(term))
        .unwrap_or(false);
    Ok(description_hit || tags_hit)
}
