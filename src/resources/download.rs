//! Package download resource.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedError, FeedResult, LocalPackageFeed};
use crate::package::{LocalPackageInfo, PackageIdentity};

/// Result of a download lookup. Absence is a value, not an error.
pub enum DownloadOutcome {
    /// The package is available locally.
    Found(Arc<LocalPackageInfo>),
    /// The package is not in this feed.
    NotFound,
}

impl DownloadOutcome {
    /// True when the package was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// The found package, if any.
    pub fn package(&self) -> Option<&Arc<LocalPackageInfo>> {
        match self {
            Self::Found(package) => Some(package),
            Self::NotFound => None,
        }
    }
}

/// Fetches package bytes out of a local feed.
pub struct DownloadResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl DownloadResource {
    /// Create a download resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// Locate a package for download.
    ///
    /// A resolved dependency may already carry the package's local
    /// path; when `known_path` is given the lookup goes straight to it
    /// and only falls back to an identity search if that misses.
    pub async fn get(
        &self,
        identity: &PackageIdentity,
        known_path: Option<&Path>,
        cancel: &CancellationToken,
    ) -> FeedResult<DownloadOutcome> {
        let feed = self.feed.clone();
        let identity = identity.clone();
        let known_path: Option<PathBuf> = known_path.map(Path::to_path_buf);
        let cancel = cancel.clone();
        run_blocking(move || {
            if let Some(path) = known_path {
                if let Some(package) = feed.get_by_path(&path, &cancel)? {
                    return Ok(DownloadOutcome::Found(package));
                }
            }
            match feed.get(&identity, &cancel)? {
                Some(package) => Ok(DownloadOutcome::Found(package)),
                None => Ok(DownloadOutcome::NotFound),
            }
        })
        .await
    }

    /// Copy a package's bytes into `destination`.
    ///
    /// Returns `false` without writing anything when the package is not
    /// found.
    pub async fn copy_to<W>(
        &self,
        identity: &PackageIdentity,
        known_path: Option<&Path>,
        destination: &mut W,
        cancel: &CancellationToken,
    ) -> FeedResult<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let package = match self.get(identity, known_path, cancel).await? {
            DownloadOutcome::Found(package) => package,
            DownloadOutcome::NotFound => return Ok(false),
        };

        let path = package.path().to_path_buf();
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| FeedError::Io {
                path: path.clone(),
                source,
            })?;
        tokio::io::copy(&mut file, destination)
            .await
            .map_err(|source| FeedError::Io { path, source })?;
        Ok(true)
    }
}
