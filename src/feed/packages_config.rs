//! packages.config-style feed: one `{id}.{version}` folder per package.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::folder::{
    check_cancelled, dedup_by_identity, ensure_root_exists, package_from_nupkg, subdirectories,
    version_from_id_prefix,
};
use crate::feed::{FeedResult, FeedType, LocalPackageFeed};
use crate::package::{LocalPackageInfo, PackageIdentity, PACKAGE_EXTENSION};

/// A packages.config-style feed:
/// `root/{id}.{version}/{id}.{version}.nupkg`.
pub struct PackagesConfigFeed {
    root: PathBuf,
}

impl PackagesConfigFeed {
    /// Create a packages.config feed over the given root folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read the nupkg matching a package folder's own name, if present.
    fn package_in_dir(&self, dir: &Path) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let nupkg = dir.join(format!("{name}{PACKAGE_EXTENSION}"));
        if !nupkg.is_file() {
            return Ok(None);
        }
        package_from_nupkg(&nupkg, &self.root).map(Some)
    }
}

impl LocalPackageFeed for PackagesConfigFeed {
    fn feed_type(&self) -> FeedType {
        FeedType::PackagesConfig
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn packages(&self, cancel: &CancellationToken) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        let mut packages = Vec::new();
        for dir in subdirectories(&self.root, cancel)? {
            check_cancelled(cancel)?;
            if let Some(package) = self.package_in_dir(&dir)? {
                packages.push(package);
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
        for dir in subdirectories(&self.root, cancel)? {
            check_cancelled(cancel)?;
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Folder names are id.version; a parseable version with a
            // matching id prefix marks a candidate, confirmed below.
            if version_from_id_prefix(name, id).is_none() {
                continue;
            }
            if let Some(package) = self.package_in_dir(&dir)? {
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
        check_cancelled(cancel)?;

        // Fast path: the folder named with the exact version spelling.
        let id_version = format!("{}.{}", identity.id(), identity.version().as_str());
        let expected = self
            .root
            .join(&id_version)
            .join(format!("{id_version}{PACKAGE_EXTENSION}"));
        if expected.is_file() {
            let package = package_from_nupkg(&expected, &self.root)?;
            if package.identity() == identity {
                return Ok(Some(package));
            }
        }

        // Slow path: scan folders whose parsed version matches.
        for dir in subdirectories(&self.root, cancel)? {
            check_cancelled(cancel)?;
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(version) = version_from_id_prefix(name, identity.id()) else {
                continue;
            };
            if version != *identity.version() {
                continue;
            }
            if let Some(package) = self.package_in_dir(&dir)? {
                if package.identity() == identity {
                    return Ok(Some(package));
                }
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
