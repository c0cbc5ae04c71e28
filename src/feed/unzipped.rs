//! Unzipped feed: nupkg files alongside their expanded folders.
//!
//! Used for template-style feeds, which are small: the whole feed is
//! indexed in memory once and served from the index afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::feed::folder::{check_cancelled, ensure_root_exists, nupkg_files, package_from_nupkg};
use crate::feed::{FeedResult, FeedType, LocalPackageFeed};
use crate::package::{
    last_write_time_utc, LocalPackageInfo, PackageIdentity, PackageReadError, MANIFEST_EXTENSION,
    PACKAGE_EXTENSION,
};

struct UnzippedIndex {
    by_identity: HashMap<PackageIdentity, Arc<LocalPackageInfo>>,
    by_path: HashMap<PathBuf, Arc<LocalPackageInfo>>,
}

/// An unzipped feed: `root/{name}.nupkg` beside `root/{name}/`.
///
/// A package counts only when both forms are present. The index is
/// built lazily on first access and then frozen for the lifetime of
/// the feed; later on-disk changes are not observed.
pub struct UnzippedFeed {
    root: PathBuf,
    index: Mutex<Option<Arc<UnzippedIndex>>>,
}

impl UnzippedFeed {
    /// Create an unzipped feed over the given root folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(None),
        }
    }

    /// The lazily-built, then immutable, feed index.
    ///
    /// Built at most once; a cancelled build leaves the slot empty so a
    /// later call can retry.
    fn index(&self, cancel: &CancellationToken) -> FeedResult<Arc<UnzippedIndex>> {
        let mut slot = self.index.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }

        let built = Arc::new(self.build_index(cancel)?);
        *slot = Some(built.clone());
        Ok(built)
    }

    fn build_index(&self, cancel: &CancellationToken) -> FeedResult<UnzippedIndex> {
        ensure_root_exists(&self.root)?;

        let mut by_identity = HashMap::new();
        let mut by_path = HashMap::new();

        for nupkg in nupkg_files(&self.root, cancel)? {
            check_cancelled(cancel)?;

            let Some(file_name) = nupkg.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let stem = &file_name[..file_name.len() - PACKAGE_EXTENSION.len()];
            let folder = self.root.join(stem);
            if !folder.is_dir() {
                // A bare nupkg without its expanded folder is not part
                // of an unzipped feed.
                continue;
            }

            let package = self.read_package(&nupkg, &folder)?;
            by_identity
                .entry(package.identity().clone())
                .or_insert_with(|| package.clone());
            by_path.insert(nupkg.clone(), package);
        }

        Ok(UnzippedIndex {
            by_identity,
            by_path,
        })
    }

    /// Build the package record, preferring the loose nuspec inside the
    /// expanded folder over cracking the archive open.
    fn read_package(&self, nupkg: &Path, folder: &Path) -> FeedResult<Arc<LocalPackageInfo>> {
        let Some(nuspec_path) = first_nuspec_in(folder) else {
            return package_from_nupkg(nupkg, &self.root);
        };

        let wrap = |cause: PackageReadError| crate::feed::FeedError::PackageMetadata {
            reference: nuspec_path.display().to_string(),
            source_root: self.root.clone(),
            cause,
        };

        let xml = std::fs::read_to_string(&nuspec_path).map_err(|source| {
            wrap(PackageReadError::ManifestIo {
                path: nuspec_path.clone(),
                source,
            })
        })?;
        let nuspec = crate::package::parse_nuspec(&xml).map_err(|source| {
            wrap(PackageReadError::Manifest {
                path: nuspec_path.clone(),
                source,
            })
        })?;

        let info = LocalPackageInfo::with_nuspec_path(
            nuspec.identity(),
            nupkg,
            &nuspec_path,
            last_write_time_utc(nupkg),
        )
        .with_parsed_nuspec(Arc::new(nuspec));
        Ok(Arc::new(info))
    }
}

fn first_nuspec_in(dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to enumerate {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut nuspecs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_ascii_lowercase().ends_with(MANIFEST_EXTENSION))
                    .unwrap_or(false)
        })
        .collect();
    nuspecs.sort();
    nuspecs.into_iter().next()
}

impl LocalPackageFeed for UnzippedFeed {
    fn feed_type(&self) -> FeedType {
        FeedType::Unzipped
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn packages(&self, cancel: &CancellationToken) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        let index = self.index(cancel)?;
        let mut packages: Vec<Arc<LocalPackageInfo>> =
            index.by_identity.values().cloned().collect();
        packages.sort_by(|a, b| a.identity().cmp(b.identity()));
        Ok(packages)
    }

    fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<Arc<LocalPackageInfo>>> {
        let index = self.index(cancel)?;
        let mut packages: Vec<Arc<LocalPackageInfo>> = index
            .by_identity
            .values()
            .filter(|p| p.identity().has_id(id))
            .cloned()
            .collect();
        packages.sort_by(|a, b| a.identity().cmp(b.identity()));
        Ok(packages)
    }

    fn get(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        let index = self.index(cancel)?;
        Ok(index.by_identity.get(identity).cloned())
    }

    fn get_by_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<Arc<LocalPackageInfo>>> {
        let index = self.index(cancel)?;
        Ok(index.by_path.get(path).cloned())
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

    fn nuspec_xml(id: &str, version: &str) -> String {
        format!(
            "<package><metadata><id>{id}</id><version>{version}</version></metadata></package>"
        )
    }

    /// Lay down `root/{name}.nupkg` + `root/{name}/{id}.nuspec`.
    fn install_template(root: &Path, name: &str, id: &str, version: &str) {
        fs::write(root.join(format!("{name}.nupkg")), b"stub-not-read").unwrap();
        let folder = root.join(name);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(format!("{id}.nuspec")), nuspec_xml(id, version)).unwrap();
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(id, version.parse().unwrap())
    }

    #[test]
    fn test_packages_requires_both_forms() {
        let temp = TempDir::new().unwrap();
        install_template(temp.path(), "a.1.0.0", "a", "1.0.0");
        // A nupkg without its folder is ignored.
        fs::write(temp.path().join("b.1.0.0.nupkg"), b"stub").unwrap();
        // A folder without its nupkg is ignored too.
        fs::create_dir(temp.path().join("c.1.0.0")).unwrap();

        let feed = UnzippedFeed::new(temp.path());
        let packages = feed.packages(&token()).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].identity(), &identity("a", "1.0.0"));
    }

    #[test]
    fn test_get_by_identity_and_path() {
        let temp = TempDir::new().unwrap();
        install_template(temp.path(), "a.1.0.0", "a", "1.0.0");

        let feed = UnzippedFeed::new(temp.path());
        assert!(feed.get(&identity("A", "1.0"), &token()).unwrap().is_some());

        let nupkg_path = temp.path().join("a.1.0.0.nupkg");
        assert!(feed.get_by_path(&nupkg_path, &token()).unwrap().is_some());
        assert!(feed
            .get_by_path(&temp.path().join("other.nupkg"), &token())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_index_is_frozen_after_first_access() {
        let temp = TempDir::new().unwrap();
        install_template(temp.path(), "a.1.0.0", "a", "1.0.0");

        let feed = UnzippedFeed::new(temp.path());
        assert_eq!(feed.packages(&token()).unwrap().len(), 1);

        // New content after the first scan is not observed.
        install_template(temp.path(), "b.1.0.0", "b", "1.0.0");
        assert_eq!(feed.packages(&token()).unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_id() {
        let temp = TempDir::new().unwrap();
        install_template(temp.path(), "a.1.0.0", "a", "1.0.0");
        install_template(temp.path(), "a.2.0.0", "a", "2.0.0");
        install_template(temp.path(), "b.1.0.0", "b", "1.0.0");

        let feed = UnzippedFeed::new(temp.path());
        let found = feed.find_by_id("A", &token()).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_cancelled_build_retries() {
        let temp = TempDir::new().unwrap();
        install_template(temp.path(), "a.1.0.0", "a", "1.0.0");

        let feed = UnzippedFeed::new(temp.path());
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(feed.packages(&cancelled).unwrap_err().is_cancelled());

        // The aborted build cached nothing; a fresh call succeeds.
        assert_eq!(feed.packages(&token()).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let feed = UnzippedFeed::new("/definitely/not/present");
        assert!(matches!(
            feed.packages(&token()),
            Err(crate::feed::FeedError::SourceNotFound { .. })
        ));
    }
}
