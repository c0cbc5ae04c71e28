//! Dependency information resource.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedError, FeedResult, LocalPackageFeed};
use crate::index::PackageDependencyInfo;
use crate::package::{LocalPackageInfo, PackageIdentity};

/// Serves dependency information out of a local feed.
pub struct DependencyInfoResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl DependencyInfoResource {
    /// Create a dependency-info resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// Dependency groups for an exact identity, `None` when absent.
    pub async fn resolve(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<PackageDependencyInfo>> {
        let feed = self.feed.clone();
        let identity = identity.clone();
        let cancel = cancel.clone();
        run_blocking(move || match feed.get(&identity, &cancel)? {
            Some(package) => Ok(Some(info_for(&package, feed.as_ref())?)),
            None => Ok(None),
        })
        .await
    }

    /// Dependency information for every version of an id, sorted by
    /// version ascending. Empty when the id is unknown.
    pub async fn resolve_all(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageDependencyInfo>> {
        let feed = self.feed.clone();
        let id = id.to_string();
        let cancel = cancel.clone();
        run_blocking(move || {
            let mut packages = feed.find_by_id(&id, &cancel)?;
            packages.sort_by(|a, b| a.identity().cmp(b.identity()));
            packages
                .iter()
                .map(|p| info_for(p, feed.as_ref()))
                .collect()
        })
        .await
    }
}

fn info_for(
    package: &LocalPackageInfo,
    feed: &dyn LocalPackageFeed,
) -> FeedResult<PackageDependencyInfo> {
    let nuspec = package
        .nuspec()
        .map_err(|cause| FeedError::PackageMetadata {
            reference: package.identity().to_string(),
            source_root: feed.root().to_path_buf(),
            cause,
        })?;
    Ok(PackageDependencyInfo {
        identity: package.identity().clone(),
        dependency_groups: nuspec.dependency_groups().to_vec(),
    })
}
