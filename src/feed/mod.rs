//! Local package feeds.
//!
//! A feed is a folder whose shape determines how packages are
//! discovered. There are exactly four shapes:
//!
//! - [`FlatFeed`]: `root/{id}.{version}.nupkg`, also one level deep
//! - [`ExpandedFeed`]: `root/{id}/{version}/...` with completion markers
//! - [`UnzippedFeed`]: `root/{name}.nupkg` beside `root/{name}/`
//! - [`PackagesConfigFeed`]: `root/{id}.{version}/{id}.{version}.nupkg`
//!
//! All four implement [`LocalPackageFeed`] and share the same
//! deduplication contract: one entry per (id, version), deterministic.

mod error;
mod expanded;
mod flat;
pub(crate) mod folder;
mod packages_config;
mod unzipped;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use error::{FeedError, FeedResult};
pub use expanded::ExpandedFeed;
pub use flat::FlatFeed;
pub use folder::{detect_feed_type, version_from_file_name, version_from_id_prefix};
pub use packages_config::PackagesConfigFeed;
pub use unzipped::UnzippedFeed;

use crate::package::{LocalPackageInfo, PackageIdentity};

/// Shape of a local feed folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedType {
    /// Flat folder of nupkgs.
    FlatV2,
    /// Expanded per-id/per-version folder tree.
    ExpandedV3,
    /// Nupkg alongside its unzipped folder (template feeds).
    Unzipped,
    /// packages.config-style nested folders.
    PackagesConfig,
    /// Shape could not be determined.
    Unknown,
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedType::FlatV2 => "flat",
            FeedType::ExpandedV3 => "expanded",
            FeedType::Unzipped => "unzipped",
            FeedType::PackagesConfig => "packages-config",
            FeedType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Discovery over one local feed folder.
///
/// Implementations encapsulate the per-shape discovery algorithm and
/// share only the identity and package data types. Lookups return
/// `Ok(None)` / empty collections for absent packages; errors are
/// reserved for whole-source problems and corrupt packages.
pub trait LocalPackageFeed: Send + Sync {
    /// The shape of this feed.
    fn feed_type(&self) -> FeedType;

    /// The feed's root folder.
    fn root(&self) -> &Path;

    /// All discoverable packages, deduplicated by identity.
    fn packages(&self, cancel: &CancellationToken) -> FeedResult<Vec<Arc<LocalPackageInfo>>>;

    /// All versions of one id, deduplicated.
    fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>>;

    /// Exact lookup by identity.
    fn get(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>>;

    /// Exact lookup by nupkg path.
    fn get_by_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>>;

    /// True if the exact identity exists in this feed.
    fn exists(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<bool> {
        Ok(self.get(identity, cancel)?.is_some())
    }

    /// True if any version of the id exists in this feed.
    fn id_exists(&self, id: &str, cancel: &CancellationToken) -> FeedResult<bool> {
        Ok(!self.find_by_id(id, cancel)?.is_empty())
    }
}

/// Run a blocking feed scan on the blocking thread pool.
///
/// Directory walks are synchronous filesystem work; this keeps them off
/// the async worker threads while callers await the result.
pub(crate) async fn run_blocking<T, F>(f: F) -> FeedResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> FeedResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FeedError::TaskJoin(e.to_string()))?
}
