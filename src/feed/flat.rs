//! Flat-folder feed: nupkgs dropped into a directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::folder::{
    check_cancelled, dedup_by_identity, ensure_root_exists, is_possible_package_match,
    nupkg_files_chunked, package_from_nupkg,
};
use crate::feed::{FeedResult, FeedType, LocalPackageFeed};
use crate::package::{LocalPackageInfo, PackageIdentity};

/// A flat feed: `root/{id}.{version}.nupkg`, also searched one
/// directory level deep.
///
/// File names are only a hint; every candidate is confirmed by reading
/// the manifest inside the archive, because a name like
/// `a.b.1.0.0.nupkg` is ambiguous between ids `a.b` and `a`.
pub struct FlatFeed {
    root: PathBuf,
}

impl FlatFeed {
    /// Create a flat feed over the given root folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LocalPackageFeed for FlatFeed {
    fn feed_type(&self) -> FeedType {
        FeedType::FlatV2
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn packages(&self, cancel: &CancellationToken) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        let mut packages = Vec::new();
        for chunk in nupkg_files_chunked(&self.root, cancel)? {
            for path in chunk {
                check_cancelled(cancel)?;
                packages.push(package_from_nupkg(&path, &self.root)?);
            }
        }
        Ok(dedup_by_identity(packages))
    }

    fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        let mut packages = Vec::new();
        for chunk in nupkg_files_chunked(&self.root, cancel)? {
            for path in chunk {
                if !is_possible_package_match(&path, id) {
                    continue;
                }
                check_cancelled(cancel)?;
                let package = package_from_nupkg(&path, &self.root)?;
                // The filename guess can mis-split dotted ids; only the
                // manifest decides. Ex: packageA.1.1.0.nupkg looks like
                // packageA.1 1.0 when asked for id "packageA.1".
                if package.identity().has_id(id) {
                    packages.push(package);
                }
            }
        }
        Ok(dedup_by_identity(packages))
    }

    fn get(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        // Within each directory, favor the entry whose version string
        // matches exactly over a semantically-equal spelling (1.0 vs
        // 1.0.0), falling back to the first match in scan order.
        for chunk in nupkg_files_chunked(&self.root, cancel)? {
            let mut fallback: Option<Arc<LocalPackageInfo>> = None;

            for path in chunk {
                check_cancelled(cancel)?;
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let matches_identity =
                    crate::feed::folder::version_from_file_name(file_name, identity.id())
                        .map(|v| v == *identity.version())
                        .unwrap_or(false);
                if !matches_identity {
                    continue;
                }

                let package = package_from_nupkg(&path, &self.root)?;
                if package.identity() == identity {
                    let exact = package
                        .identity()
                        .version()
                        .as_str()
                        .eq_ignore_ascii_case(identity.version().as_str());
                    if exact {
                        return Ok(Some(package));
                    }
                    if fallback.is_none() {
                        fallback = Some(package);
                    }
                }
            }

            if fallback.is_some() {
                return Ok(fallback);
            }
        }

        Ok(None)
    }

    fn get_by_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        check_cancelled(cancel)?;
        if !path.is_file() {
            return Ok(None);
        }
        package_from_nupkg(path, &self.root).map(Some)
    }
}
