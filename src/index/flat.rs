//! Per-id package index over a flat nupkg folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::feed::folder::{
    check_cancelled, ensure_root_exists, is_possible_package_match, nupkg_files_chunked,
    package_from_nupkg,
};
use crate::feed::{FeedError, FeedResult};
use crate::index::context::CacheContext;
use crate::index::PackageDependencyInfo;
use crate::package::LocalPackageInfo;
use crate::version::PackageVersion;

struct Inner {
    source_root: PathBuf,
    packages: DashMap<String, Arc<Vec<Arc<LocalPackageInfo>>>>,
}

/// Resolves versions and streams package bytes for single ids out of a
/// flat folder (`root/{id}.{version}.nupkg`).
///
/// Flat folders carry no per-id structure, so each first query for an
/// id scans every nupkg whose name could plausibly match and confirms
/// the id against the manifest inside. The confirmed package records
/// are cached per id for the lifetime of the instance.
#[derive(Clone)]
pub struct FlatPackageIndex {
    inner: Arc<Inner>,
}

impl FlatPackageIndex {
    /// Create an index over the given folder root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source_root: root.into(),
                packages: DashMap::new(),
            }),
        }
    }

    /// The folder root this index reads from.
    pub fn source_root(&self) -> &Path {
        &self.inner.source_root
    }

    /// All versions of `id` present in this folder.
    pub async fn all_versions(
        &self,
        id: &str,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageVersion>> {
        let packages = self.cached_packages(id, ctx, cancel).await?;
        Ok(packages
            .iter()
            .map(|p| p.identity().version().clone())
            .collect())
    }

    /// True when the exact (id, version) is present in this folder.
    pub async fn package_exists(
        &self,
        id: &str,
        version: &PackageVersion,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<bool> {
        Ok(self.find_package(id, version, ctx, cancel).await?.is_some())
    }

    /// Copy the package's bytes into `destination`.
    ///
    /// Returns `false` without writing anything when the version is not
    /// present in this folder.
    pub async fn copy_nupkg_to<W>(
        &self,
        id: &str,
        version: &PackageVersion,
        destination: &mut W,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(package) = self.find_package(id, version, ctx, cancel).await? else {
            return Ok(false);
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

    /// Dependency information for the exact (id, version), `None` when
    /// it is not present in this folder.
    pub async fn dependency_info(
        &self,
        id: &str,
        version: &PackageVersion,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<PackageDependencyInfo>> {
        let Some(package) = self.find_package(id, version, ctx, cancel).await? else {
            return Ok(None);
        };

        let source_root = self.inner.source_root.clone();
        let info = crate::feed::run_blocking(move || {
            let nuspec = package
                .nuspec()
                .map_err(|cause| FeedError::PackageMetadata {
                    reference: package.identity().to_string(),
                    source_root,
                    cause,
                })?;
            Ok(PackageDependencyInfo {
                identity: package.identity().clone(),
                dependency_groups: nuspec.dependency_groups().to_vec(),
            })
        })
        .await?;
        Ok(Some(info))
    }

    /// The cached package record for an exact (id, version).
    pub async fn find_package(
        &self,
        id: &str,
        version: &PackageVersion,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        let packages = self.cached_packages(id, ctx, cancel).await?;
        Ok(packages
            .iter()
            .find(|p| p.identity().version() == version)
            .cloned())
    }

    async fn cached_packages(
        &self,
        id: &str,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Arc<Vec<Arc<LocalPackageInfo>>>> {
        check_cancelled(cancel)?;

        let inner = self.inner.clone();
        let id = id.to_string();
        let refresh = ctx.refresh_memory_cache;
        let cancel = cancel.clone();
        crate::feed::run_blocking(move || inner.cached_packages(&id, refresh, &cancel)).await
    }
}

impl Inner {
    fn cached_packages(
        &self,
        id: &str,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Arc<Vec<Arc<LocalPackageInfo>>>> {
        let key = id.to_lowercase();

        if !refresh {
            if let Some(hit) = self.packages.get(&key) {
                return Ok(hit.clone());
            }
        }

        let scanned = Arc::new(self.scan_packages(id, cancel)?);

        if refresh {
            self.packages.insert(key, scanned.clone());
            Ok(scanned)
        } else {
            let entry = self.packages.entry(key).or_insert(scanned);
            Ok(entry.value().clone())
        }
    }

    fn scan_packages(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        ensure_root_exists(&self.source_root)?;

        let mut packages = Vec::new();
        for chunk in nupkg_files_chunked(&self.source_root, cancel)? {
            for path in chunk {
                if !is_possible_package_match(&path, id) {
                    continue;
                }
                check_cancelled(cancel)?;
                let package = package_from_nupkg(&path, &self.source_root)?;
                // Filename matches can mis-split dotted ids; the
                // manifest inside has the final say.
                if package.identity().has_id(id) {
                    packages.push(package);
                }
            }
        }
        Ok(packages)
    }
}
