//! Expanded-folder feed: per-id/per-version install folders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::feed::folder::{
    check_cancelled, ensure_root_exists, package_from_nupkg, subdirectories,
};
use crate::feed::{FeedResult, FeedType, LocalPackageFeed};
use crate::layout::{VersionFolderPathResolver, NUPKG_METADATA_FILE};
use crate::package::{last_write_time_utc, LocalPackageInfo, PackageIdentity};
use crate::version::PackageVersion;

/// An expanded feed: `root/{id}/{version}/` install folders.
///
/// A version folder is visible only when the nupkg, the manifest, and a
/// completion marker are all present. Folders missing a marker are
/// in-progress or abandoned installs and are silently skipped, never
/// reported as corrupt.
pub struct ExpandedFeed {
    root: PathBuf,
    resolver: VersionFolderPathResolver,
}

impl ExpandedFeed {
    /// Create an expanded feed over the given root folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let resolver = VersionFolderPathResolver::new(&root);
        Self { root, resolver }
    }

    /// Read one version folder into a package record, if complete.
    ///
    /// `version_dir` is the folder actually found on disk; file names
    /// are resolved against it so unusual id-folder casing still works.
    fn package_in_dir(
        &self,
        id: &str,
        version: &PackageVersion,
        version_dir: &Path,
    ) -> Option<Arc<LocalPackageInfo>> {
        let nupkg = version_dir.join(self.resolver.package_file_name(id, version));
        let nuspec = version_dir.join(self.resolver.manifest_file_name(id));
        let hash = version_dir.join(self.resolver.hash_file_name(id, version));
        let metadata = version_dir.join(NUPKG_METADATA_FILE);

        if !nupkg.is_file() || !nuspec.is_file() {
            return None;
        }
        // Either marker proves the install completed; accepting the
        // legacy hash file keeps packages installed by older tooling
        // visible.
        if !hash.is_file() && !metadata.is_file() {
            return None;
        }

        let identity = PackageIdentity::new(id, version.clone());
        Some(Arc::new(LocalPackageInfo::with_nuspec_path(
            identity,
            &nupkg,
            nuspec,
            last_write_time_utc(&nupkg),
        )))
    }

    fn packages_for_id_dir(
        &self,
        id_dir: &Path,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        let Some(id) = id_dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            return Ok(Vec::new());
        };

        let mut packages = Vec::new();
        for version_dir in subdirectories(id_dir, cancel)? {
            check_cancelled(cancel)?;
            let Some(name) = version_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let version = match name.parse::<PackageVersion>() {
                Ok(version) => version,
                Err(_) => {
                    warn!(
                        "skipping version folder with unparseable name: {}",
                        version_dir.display()
                    );
                    continue;
                }
            };
            if let Some(package) = self.package_in_dir(&id, &version, &version_dir) {
                packages.push(package);
            }
        }
        Ok(packages)
    }
}

impl LocalPackageFeed for ExpandedFeed {
    fn feed_type(&self) -> FeedType {
        FeedType::ExpandedV3
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn packages(&self, cancel: &CancellationToken) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        let mut packages = Vec::new();
        for id_dir in subdirectories(&self.root, cancel)? {
            packages.extend(self.packages_for_id_dir(&id_dir, cancel)?);
        }
        Ok(packages)
    }

    fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;

        let id_dir = self.resolver.version_list_path(id);
        if !id_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for version_dir in subdirectories(&id_dir, cancel)? {
            check_cancelled(cancel)?;
            let Some(name) = version_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let version = match name.parse::<PackageVersion>() {
                Ok(version) => version,
                Err(_) => {
                    warn!(
                        "skipping version folder with unparseable name: {}",
                        version_dir.display()
                    );
                    continue;
                }
            };
            if let Some(package) = self.package_in_dir(id, &version, &version_dir) {
                packages.push(package);
            }
        }
        Ok(packages)
    }

    fn get(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.root)?;
        check_cancelled(cancel)?;

        let version_dir = self.resolver.install_path(identity.id(), identity.version());
        Ok(self.package_in_dir(identity.id(), identity.version(), &version_dir))
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
