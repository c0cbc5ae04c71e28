//! Package listing resource and the latest-version collapse pass.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::feed::{run_blocking, FeedResult, LocalPackageFeed};
use crate::package::LocalPackageInfo;
use crate::resources::metadata::{metadata_for, PackageMetadata};

/// Collapse a sequence of packages to the highest version per id.
///
/// PRECONDITION: the input must already be grouped by id (e.g. sorted
/// by identity). The collapse is a single forward pass comparing
/// adjacent runs, not a group-by: passing ungrouped input silently
/// yields one entry per run, not per id.
pub fn collapse_to_highest(packages: Vec<Arc<LocalPackageInfo>>) -> Vec<Arc<LocalPackageInfo>> {
    let mut collapsed: Vec<Arc<LocalPackageInfo>> = Vec::new();

    for package in packages {
        match collapsed.last_mut() {
            Some(last) if last.identity().has_id(package.identity().id()) => {
                if package.identity().version() > last.identity().version() {
                    *last = package;
                }
            }
            _ => collapsed.push(package),
        }
    }

    collapsed
}

/// Enumerates a local feed, optionally filtered and collapsed to the
/// latest version per id.
pub struct PackageListResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl PackageListResource {
    /// Create a list resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// List packages.
    ///
    /// `search_term` filters by id substring when present;
    /// `include_prerelease` keeps prerelease versions;
    /// `all_versions` lists every version instead of collapsing to the
    /// highest per id.
    pub async fn list(
        &self,
        search_term: Option<&str>,
        include_prerelease: bool,
        all_versions: bool,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageMetadata>> {
        let feed = self.feed.clone();
        let term = search_term.map(|t| t.to_lowercase());
        let cancel = cancel.clone();
        run_blocking(move || {
            let mut packages = feed.packages(&cancel)?;

            if let Some(term) = &term {
                packages.retain(|p| p.identity().id().to_lowercase().contains(term));
            }
            if !include_prerelease {
                packages.retain(|p| !p.identity().version().is_prerelease());
            }

            packages.sort_by(|a, b| a.identity().cmp(b.identity()));
            if !all_versions {
                packages = collapse_to_highest(packages);
            }

            packages
                .iter()
                .map(|p| metadata_for(p, feed.as_ref()))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FlatFeed;
    use crate::package::PackageIdentity;
    use chrono::Utc;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn package(id: &str, version: &str) -> Arc<LocalPackageInfo> {
        Arc::new(LocalPackageInfo::new(
            PackageIdentity::new(id, version.parse().unwrap()),
            format!("/feed/{id}.{version}.nupkg"),
            Utc::now(),
        ))
    }

    #[test]
    fn test_collapse_grouped_input() {
        let input = vec![
            package("A", "1.0"),
            package("A", "2.0"),
            package("B", "1.0"),
            package("B", "1.5"),
            package("C", "3.0"),
        ];

        let collapsed = collapse_to_highest(input);
        let summary: Vec<String> = collapsed
            .iter()
            .map(|p| p.identity().to_string())
            .collect();
        assert_eq!(summary, vec!["A.2.0", "B.1.5", "C.3.0"]);
    }

    #[test]
    fn test_collapse_is_case_insensitive_within_a_run() {
        let input = vec![package("a", "1.0"), package("A", "2.0")];
        let collapsed = collapse_to_highest(input);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].identity().version(), &"2.0".parse().unwrap());
    }

    #[test]
    fn test_collapse_ungrouped_input_produces_duplicates() {
        // The collapse only compares adjacent runs. Ungrouped input
        // produces duplicate ids; callers own the grouping.
        let input = vec![
            package("A", "1.0"),
            package("B", "1.0"),
            package("A", "2.0"),
        ];

        let collapsed = collapse_to_highest(input);
        assert_eq!(collapsed.len(), 3);
    }

    #[test]
    fn test_collapse_empty() {
        assert!(collapse_to_highest(Vec::new()).is_empty());
    }

    fn write_nupkg(dir: &Path, id: &str, version: &str) {
        let path = dir.join(format!("{id}.{version}.nupkg"));
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(format!("{id}.nuspec"), options).unwrap();
        writer
            .write_all(
                format!(
                    "<package><metadata><id>{id}</id><version>{version}</version></metadata></package>"
                )
                .as_bytes(),
            )
            .unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_list_latest_only() {
        let temp = TempDir::new().unwrap();
        write_nupkg(temp.path(), "a", "1.0.0");
        write_nupkg(temp.path(), "a", "2.0.0");
        write_nupkg(temp.path(), "b", "1.0.0");

        let resource = PackageListResource::new(Arc::new(FlatFeed::new(temp.path())));
        let listed = resource.list(None, false, false, &token()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].identity.to_string(), "a.2.0.0");
    }

    #[tokio::test]
    async fn test_list_all_versions_and_prerelease() {
        let temp = TempDir::new().unwrap();
        write_nupkg(temp.path(), "a", "1.0.0");
        write_nupkg(temp.path(), "a", "2.0.0-beta");

        let resource = PackageListResource::new(Arc::new(FlatFeed::new(temp.path())));

        let stable = resource.list(None, false, true, &token()).await.unwrap();
        assert_eq!(stable.len(), 1);

        let all = resource.list(None, true, true, &token()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_list_with_term() {
        let temp = TempDir::new().unwrap();
        write_nupkg(temp.path(), "alpha", "1.0.0");
        write_nupkg(temp.path(), "beta", "1.0.0");

        let resource = PackageListResource::new(Arc::new(FlatFeed::new(temp.path())));
        let listed = resource
            .list(Some("alp"), false, false, &token())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identity.id(), "alpha");
    }
}
