//! Package metadata resource.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedError, FeedResult, LocalPackageFeed};
use crate::package::{LocalPackageInfo, PackageIdentity};

/// Display metadata for one package, as served to search and listing
/// surfaces.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    /// The package identity.
    pub identity: PackageIdentity,
    /// Package description, if declared.
    pub description: Option<String>,
    /// Author list, if declared.
    pub authors: Option<String>,
    /// Space-separated tags, if declared.
    pub tags: Option<String>,
    /// Publish-date proxy: the package file's last write time.
    pub published: DateTime<Utc>,
}

/// Build the metadata record for a discovered package.
///
/// Manifest problems surface as the wrapped metadata error naming the
/// package and its source root.
pub(crate) fn metadata_for(
    package: &LocalPackageInfo,
    feed: &dyn LocalPackageFeed,
) -> FeedResult<PackageMetadata> {
    let nuspec = package
        .nuspec()
        .map_err(|cause| FeedError::PackageMetadata {
            reference: package.identity().to_string(),
            source_root: feed.root().to_path_buf(),
            cause,
        })?;

    Ok(PackageMetadata {
        identity: package.identity().clone(),
        description: nuspec.description().map(str::to_string),
        authors: nuspec.authors().map(str::to_string),
        tags: nuspec.tags().map(str::to_string),
        published: package.last_write_utc(),
    })
}

/// Serves package metadata out of a local feed.
pub struct PackageMetadataResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl PackageMetadataResource {
    /// Create a metadata resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// Metadata for every version of an id, optionally without
    /// prereleases. Sorted by version ascending.
    pub async fn metadata_for_id(
        &self,
        id: &str,
        include_prerelease: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageMetadata>> {
        let feed = self.feed.clone();
        let id = id.to_string();
        let cancel = cancel.clone();
        run_blocking(move || {
            let mut packages = feed.find_by_id(&id, &cancel)?;
            if !include_prerelease {
                packages.retain(|p| !p.identity().version().is_prerelease());
            }
            packages.sort_by(|a, b| a.identity().cmp(b.identity()));
            packages
                .iter()
                .map(|p| metadata_for(p, feed.as_ref()))
                .collect()
        })
        .await
    }

    /// Metadata for an exact identity, `None` when absent.
    pub async fn metadata(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<PackageMetadata>> {
        let feed = self.feed.clone();
        let identity = identity.clone();
        let cancel = cancel.clone();
        run_blocking(move || {
            match feed.get(&identity, &cancel)? {
                Some(package) => Ok(Some(metadata_for(&package, feed.as_ref())?)),
                None => Ok(None),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FlatFeed;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn write_nupkg(dir: &Path, id: &str, version: &str, description: &str) {
        let path = dir.join(format!("{id}.{version}.nupkg"));
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(format!("{id}.nuspec"), options).unwrap();
        writer
            .write_all(
                format!(
                    "<package><metadata><id>{id}</id><version>{version}</version>\
                     <description>{description}</description>\
                     <authors>tester</authors></metadata></package>"
                )
                .as_bytes(),
            )
            .unwrap();
        writer.finish().unwrap();
    }

    fn resource(root: &Path) -> PackageMetadataResource {
        PackageMetadataResource::new(Arc::new(FlatFeed::new(root)))
    }

    #[tokio::test]
    async fn test_metadata_for_id() {
        let temp = TempDir::new().unwrap();
        write_nupkg(temp.path(), "a", "1.0.0", "first");
        write_nupkg(temp.path(), "a", "2.0.0-beta", "second");
        write_nupkg(temp.path(), "b", "1.0.0", "other");

        let resource = resource(temp.path());
        let stable = resource.metadata_for_id("a", false, &token()).await.unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].description.as_deref(), Some("first"));

        let all = resource.metadata_for_id("a", true, &token()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_exact() {
        let temp = TempDir::new().unwrap();
        write_nupkg(temp.path(), "a", "1.0.0", "first");

        let resource = resource(temp.path());
        let identity = PackageIdentity::new("A", "1.0.0".parse().unwrap());
        let found = resource.metadata(&identity, &token()).await.unwrap().unwrap();
        assert_eq!(found.identity, identity);
        assert_eq!(found.authors.as_deref(), Some("tester"));

        let absent = PackageIdentity::new("a", "9.0.0".parse().unwrap());
        assert!(resource.metadata(&absent, &token()).await.unwrap().is_none());
    }
}
