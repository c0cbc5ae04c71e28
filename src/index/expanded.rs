//! Per-id version index over an expanded package folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::feed::folder::{check_cancelled, subdirectories};
use crate::feed::{FeedError, FeedResult};
use crate::index::context::CacheContext;
use crate::index::nuspec_cache::NuspecFileCache;
use crate::index::PackageDependencyInfo;
use crate::layout::{VersionFolderPathResolver, NUPKG_METADATA_FILE};
use crate::package::PackageIdentity;
use crate::version::PackageVersion;

struct Inner {
    source_root: PathBuf,
    resolver: VersionFolderPathResolver,
    fallback_folder: bool,
    versions: DashMap<String, Arc<Vec<PackageVersion>>>,
    nuspecs: Arc<NuspecFileCache>,
}

/// Resolves versions and streams package bytes for single ids out of an
/// expanded folder (`root/{id}/{version}/`), such as the global
/// packages folder or a fallback folder.
///
/// Discovered version lists are cached per id for the lifetime of the
/// instance; a restore queries the same id once per dependent edge, and
/// rescanning the folder every time would dominate the restore. The
/// cache is safe for concurrent use and only refreshed when the calling
/// context asks for it.
#[derive(Clone)]
pub struct ExpandedPackageIndex {
    inner: Arc<Inner>,
}

impl ExpandedPackageIndex {
    /// Create an index over the given folder root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            inner: Arc::new(Inner {
                resolver: VersionFolderPathResolver::new(&root),
                source_root: root,
                fallback_folder: false,
                versions: DashMap::new(),
                nuspecs: Arc::new(NuspecFileCache::new()),
            }),
        }
    }

    /// Mark this index as a fallback folder.
    ///
    /// Fallback folders are read-only and pre-populated; only the
    /// current `.nupkg.metadata` marker proves a complete install
    /// there. The primary folder stays permissive and accepts the
    /// legacy hash marker too, for packages installed by older tooling.
    pub fn with_fallback_folder(self, fallback: bool) -> Self {
        let inner = self.inner;
        Self {
            inner: Arc::new(Inner {
                source_root: inner.source_root.clone(),
                resolver: inner.resolver.clone(),
                fallback_folder: fallback,
                versions: DashMap::new(),
                nuspecs: inner.nuspecs.clone(),
            }),
        }
    }

    /// Share a nuspec parse cache with other components reading the
    /// same files.
    pub fn with_nuspec_cache(self, cache: Arc<NuspecFileCache>) -> Self {
        let inner = self.inner;
        Self {
            inner: Arc::new(Inner {
                source_root: inner.source_root.clone(),
                resolver: inner.resolver.clone(),
                fallback_folder: inner.fallback_folder,
                versions: DashMap::new(),
                nuspecs: cache,
            }),
        }
    }

    /// The folder root this index reads from.
    pub fn source_root(&self) -> &Path {
        &self.inner.source_root
    }

    /// True when this index treats its folder as a fallback folder.
    pub fn is_fallback_folder(&self) -> bool {
        self.inner.fallback_folder
    }

    /// All versions of `id` visible in this folder.
    pub async fn all_versions(
        &self,
        id: &str,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageVersion>> {
        check_cancelled(cancel)?;

        let inner = self.inner.clone();
        let id = id.to_string();
        let refresh = ctx.refresh_memory_cache;
        let cancel = cancel.clone();
        let versions = crate::feed::run_blocking(move || {
            inner.cached_versions(&id, refresh, &cancel)
        })
        .await?;
        Ok(versions.as_ref().clone())
    }

    /// True when the exact (id, version) is fully installed here.
    pub async fn package_exists(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> FeedResult<bool> {
        check_cancelled(cancel)?;
        Ok(self.inner.version_installed(id, version))
    }

    /// Copy the package's bytes into `destination`.
    ///
    /// Returns `false` without writing anything when the version is not
    /// fully installed in this folder.
    pub async fn copy_nupkg_to<W>(
        &self,
        id: &str,
        version: &PackageVersion,
        destination: &mut W,
        cancel: &CancellationToken,
    ) -> FeedResult<bool>
    where
        W: AsyncWrite + Unpin,
    {
        check_cancelled(cancel)?;

        if !self.inner.version_installed(id, version) {
            return Ok(false);
        }

        let path = self.inner.resolver.package_file_path(id, version);
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
    /// it is not installed here.
    pub async fn dependency_info(
        &self,
        id: &str,
        version: &PackageVersion,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<PackageDependencyInfo>> {
        check_cancelled(cancel)?;

        if !self.inner.version_installed(id, version) {
            return Ok(None);
        }

        let inner = self.inner.clone();
        let id = id.to_string();
        let version = version.clone();
        crate::feed::run_blocking(move || {
            let nuspec_path = inner.resolver.manifest_file_path(&id, &version);
            let nuspec = inner.nuspecs.get_or_parse(&nuspec_path).map_err(|cause| {
                FeedError::PackageMetadata {
                    reference: format!("{id}.{version}"),
                    source_root: inner.source_root.clone(),
                    cause,
                }
            })?;
            Ok(Some(PackageDependencyInfo {
                identity: PackageIdentity::new(id, version),
                dependency_groups: nuspec.dependency_groups().to_vec(),
            }))
        })
        .await
    }
}

impl Inner {
    /// Completion-marker check deciding whether a version is visible.
    fn version_installed(&self, id: &str, version: &PackageVersion) -> bool {
        let metadata = self.resolver.nupkg_metadata_path(id, version);
        if self.fallback_folder {
            metadata.is_file()
        } else {
            metadata.is_file() || self.resolver.hash_path(id, version).is_file()
        }
    }

    fn cached_versions(
        &self,
        id: &str,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Arc<Vec<PackageVersion>>> {
        let key = id.to_lowercase();

        if !refresh {
            if let Some(hit) = self.versions.get(&key) {
                return Ok(hit.clone());
            }
        }

        let scanned = Arc::new(self.scan_versions(id, cancel)?);

        if refresh {
            self.versions.insert(key, scanned.clone());
            Ok(scanned)
        } else {
            // First population wins under concurrent misses; every
            // caller then observes the same stored list.
            let entry = self.versions.entry(key).or_insert(scanned);
            Ok(entry.value().clone())
        }
    }

    fn scan_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageVersion>> {
        let id_dir = self.resolver.version_list_path(id);

        if !id_dir.is_dir() {
            // Distinguish a misconfigured source from a cache miss.
            if !self.source_root.is_dir() {
                return Err(FeedError::SourceNotFound {
                    source_root: self.source_root.clone(),
                });
            }
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
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
            // The marker file is written last during install; folders
            // without one are in-progress or abandoned installs.
            let visible = if self.fallback_folder {
                version_dir.join(NUPKG_METADATA_FILE).is_file()
            } else {
                version_dir.join(NUPKG_METADATA_FILE).is_file()
                    || version_dir
                        .join(self.resolver.hash_file_name(id, &version))
                        .is_file()
            };
            if visible {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn install_package(root: &Path, id: &str, version: &str, markers: &[&str]) {
        let dir = root.join(id).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{id}.{version}.nupkg")), b"nupkg-bytes").unwrap();
        fs::write(
            dir.join(format!("{id}.nuspec")),
            format!(
                "<package><metadata><id>{id}</id><version>{version}</version>\
                 <dependencies><dependency id=\"dep\" version=\"1.0.0\" /></dependencies>\
                 </metadata></package>"
            ),
        )
        .unwrap();
        for marker in markers {
            match *marker {
                "hash" => {
                    fs::write(dir.join(format!("{id}.{version}.nupkg.sha512")), b"hash").unwrap()
                }
                "metadata" => fs::write(dir.join(NUPKG_METADATA_FILE), b"{}").unwrap(),
                other => panic!("unknown marker {other}"),
            }
        }
    }

    fn version(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_all_versions_requires_marker() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);
        install_package(temp.path(), "a", "2.0.0", &["metadata"]);
        install_package(temp.path(), "a", "3.0.0", &[]);

        let index = ExpandedPackageIndex::new(temp.path());
        let versions = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(versions, vec![version("1.0.0"), version("2.0.0")]);
    }

    #[tokio::test]
    async fn test_fallback_folder_requires_metadata_marker() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);
        install_package(temp.path(), "a", "2.0.0", &["metadata"]);

        let index = ExpandedPackageIndex::new(temp.path()).with_fallback_folder(true);
        let versions = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(versions, vec![version("2.0.0")]);
    }

    #[tokio::test]
    async fn test_cached_results_are_stale_until_refresh() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let first = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // New install after the first query.
        install_package(temp.path(), "a", "2.0.0", &["hash"]);

        // Cached query must NOT see it.
        let stale = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);

        // Refresh recomputes and overwrites.
        let fresh = index
            .all_versions("a", &CacheContext::refresh(), &token())
            .await
            .unwrap();
        assert_eq!(fresh.len(), 2);

        // And the overwritten entry now serves the new list.
        let after = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_key_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let lower = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        let upper = index
            .all_versions("A", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(lower, upper);
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let index = ExpandedPackageIndex::new("/definitely/not/present");
        let err = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_id_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let versions = index
            .all_versions("other", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_junk_version_folders_skipped() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);
        fs::create_dir_all(temp.path().join("a").join("not-a-version")).unwrap();

        let index = ExpandedPackageIndex::new(temp.path());
        let versions = index
            .all_versions("a", &CacheContext::cached(), &token())
            .await
            .unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn test_copy_nupkg_to() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let mut out = Vec::new();
        let copied = index
            .copy_nupkg_to("a", &version("1.0.0"), &mut out, &token())
            .await
            .unwrap();
        assert!(copied);
        assert_eq!(out, b"nupkg-bytes");
    }

    #[tokio::test]
    async fn test_copy_nupkg_absent_returns_false() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let mut out = Vec::new();
        let copied = index
            .copy_nupkg_to("a", &version("9.9.9"), &mut out, &token())
            .await
            .unwrap();
        assert!(!copied);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_dependency_info() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["metadata"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let info = index
            .dependency_info("a", &version("1.0.0"), &token())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.identity.id(), "a");
        assert_eq!(info.dependency_groups.len(), 1);
        assert_eq!(info.dependency_groups[0].dependencies[0].id, "dep");

        let absent = index
            .dependency_info("a", &version("2.0.0"), &token())
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_nuspec_is_wrapped() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);
        fs::write(temp.path().join("a/1.0.0/a.nuspec"), "<broken").unwrap();

        let index = ExpandedPackageIndex::new(temp.path());
        let err = index
            .dependency_info("a", &version("1.0.0"), &token())
            .await
            .unwrap_err();
        match err {
            FeedError::PackageMetadata { reference, .. } => {
                assert_eq!(reference, "a.1.0.0");
            }
            other => panic!("expected PackageMetadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_queries_agree() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);
        install_package(temp.path(), "a", "2.0.0", &["metadata"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index
                    .all_versions("a", &CacheContext::cached(), &CancellationToken::new())
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        for result in &results {
            assert_eq!(result, &results[0]);
            assert_eq!(result.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "a", "1.0.0", &["hash"]);

        let index = ExpandedPackageIndex::new(temp.path());
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let err = index
            .all_versions("a", &CacheContext::cached(), &cancelled)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
