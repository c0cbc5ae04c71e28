//! Resource provider registry and the per-source repository.
//!
//! Resource selection is driven by a statically-declared, ordered
//! provider table. Probing walks the table in declaration order, so
//! selection is deterministic and testable in isolation; the flat by-id
//! provider is declared before the expanded one and wins whenever the
//! feed shape is ambiguous.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::feed::{
    detect_feed_type, ExpandedFeed, FeedError, FeedResult, FeedType, FlatFeed, LocalPackageFeed,
    PackagesConfigFeed, UnzippedFeed,
};
use crate::index::{ByIdResource, ExpandedPackageIndex, FlatPackageIndex};
use crate::resources::{
    AutoCompleteResource, DependencyInfoResource, DownloadResource, PackageListResource,
    PackageMetadataResource, PackageSearchResource, ReadmeResource,
};
use crate::source::PackageSource;

/// Resource categories a provider can register under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Per-id version resolution and byte streaming.
    FindById,
    /// In-memory search.
    Search,
    /// Display metadata.
    Metadata,
    /// Dependency information.
    DependencyInfo,
    /// Package byte fetching.
    Download,
    /// Readme text.
    Readme,
    /// Id/version completion.
    AutoComplete,
    /// Feed enumeration.
    List,
}

/// Identifies one concrete provider in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderId {
    FlatById,
    ExpandedById,
    LocalSearch,
    LocalMetadata,
    LocalDependencyInfo,
    LocalDownload,
    LocalReadme,
    LocalAutoComplete,
    LocalList,
}

/// One registered provider.
pub struct ProviderEntry {
    /// Which concrete provider this is.
    pub id: ProviderId,
    /// The resource category it serves.
    pub kind: ResourceKind,
    /// Human-readable name for diagnostics.
    pub name: &'static str,
    /// Whether the provider can serve a feed of the given shape.
    pub supports: fn(FeedType) -> bool,
}

/// The provider registry, in probe order.
///
/// Order within a resource kind is the priority order; the first
/// supporting entry wins.
pub static PROVIDERS: &[ProviderEntry] = &[
    // The flat by-id provider is probed first: when the shape is
    // ambiguous, flat scanning still works over nupkgs wherever they
    // sit one level deep.
    ProviderEntry {
        id: ProviderId::FlatById,
        kind: ResourceKind::FindById,
        name: "flat-by-id",
        supports: |t| {
            matches!(
                t,
                FeedType::FlatV2
                    | FeedType::PackagesConfig
                    | FeedType::Unzipped
                    | FeedType::Unknown
            )
        },
    },
    ProviderEntry {
        id: ProviderId::ExpandedById,
        kind: ResourceKind::FindById,
        name: "expanded-by-id",
        supports: |t| matches!(t, FeedType::ExpandedV3),
    },
    ProviderEntry {
        id: ProviderId::LocalSearch,
        kind: ResourceKind::Search,
        name: "local-search",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalMetadata,
        kind: ResourceKind::Metadata,
        name: "local-metadata",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalDependencyInfo,
        kind: ResourceKind::DependencyInfo,
        name: "local-dependency-info",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalDownload,
        kind: ResourceKind::Download,
        name: "local-download",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalReadme,
        kind: ResourceKind::Readme,
        name: "local-readme",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalAutoComplete,
        kind: ResourceKind::AutoComplete,
        name: "local-autocomplete",
        supports: |_| true,
    },
    ProviderEntry {
        id: ProviderId::LocalList,
        kind: ResourceKind::List,
        name: "local-list",
        supports: |_| true,
    },
];

/// First provider of a kind that supports the feed type.
pub(crate) fn select_provider(kind: ResourceKind, feed_type: FeedType) -> Option<&'static ProviderEntry> {
    PROVIDERS
        .iter()
        .filter(|e| e.kind == kind)
        .find(|e| (e.supports)(feed_type))
}

/// A package source plus its typed resources.
///
/// Constructed once per logical source; detected feed type, the feed
/// instance, and the by-id resource (which carries session caches) are
/// each computed once and reused for the repository's lifetime.
pub struct SourceRepository {
    source: PackageSource,
    feed_type: OnceLock<FeedType>,
    feed: OnceLock<Arc<dyn LocalPackageFeed>>,
    by_id: OnceLock<ByIdResource>,
}

impl SourceRepository {
    /// Create a repository for a source.
    ///
    /// Rejects sources whose root is not a local folder path; HTTP
    /// sources belong to a different layer entirely.
    pub fn new(source: PackageSource) -> FeedResult<Self> {
        let root = source.root().to_string_lossy();
        if root.trim().is_empty() {
            return Err(FeedError::InvalidSource {
                root: root.into_owned(),
                reason: "source root is empty".to_string(),
            });
        }
        let lower = root.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Err(FeedError::InvalidSource {
                root: root.into_owned(),
                reason: "not a local folder path".to_string(),
            });
        }

        Ok(Self {
            source,
            feed_type: OnceLock::new(),
            feed: OnceLock::new(),
            by_id: OnceLock::new(),
        })
    }

    /// The underlying source.
    pub fn source(&self) -> &PackageSource {
        &self.source
    }

    /// The source's feed type: the configured override if present,
    /// detected from the folder shape otherwise. Detected once.
    pub fn feed_type(&self, cancel: &CancellationToken) -> FeedResult<FeedType> {
        if let Some(feed_type) = self.feed_type.get() {
            return Ok(*feed_type);
        }

        let detected = match self.source.feed_type_override() {
            Some(feed_type) => feed_type,
            None => detect_feed_type(self.source.root(), cancel)?,
        };
        // A cancelled detection returned above; only real results are
        // pinned.
        Ok(*self.feed_type.get_or_init(|| detected))
    }

    /// The feed instance for this source, constructed once.
    pub fn feed(&self, cancel: &CancellationToken) -> FeedResult<Arc<dyn LocalPackageFeed>> {
        if let Some(feed) = self.feed.get() {
            return Ok(feed.clone());
        }

        let root = self.source.root();
        let feed: Arc<dyn LocalPackageFeed> = match self.feed_type(cancel)? {
            FeedType::ExpandedV3 => Arc::new(ExpandedFeed::new(root)),
            FeedType::Unzipped => Arc::new(UnzippedFeed::new(root)),
            FeedType::PackagesConfig => Arc::new(PackagesConfigFeed::new(root)),
            // Unknown folders default to flat scanning.
            FeedType::FlatV2 | FeedType::Unknown => Arc::new(FlatFeed::new(root)),
        };
        Ok(self.feed.get_or_init(|| feed).clone())
    }

    /// The by-id resource for this source, selected through the
    /// provider table and constructed once. Carries the per-id caches
    /// for the session.
    pub fn find_package_by_id(&self, cancel: &CancellationToken) -> FeedResult<ByIdResource> {
        if let Some(by_id) = self.by_id.get() {
            return Ok(by_id.clone());
        }

        let feed_type = self.feed_type(cancel)?;
        let entry = select_provider(ResourceKind::FindById, feed_type).ok_or_else(|| {
            FeedError::InvalidSource {
                root: self.source.root().display().to_string(),
                reason: format!("no by-id provider for {feed_type} feeds"),
            }
        })?;

        let resource = match entry.id {
            ProviderId::FlatById => {
                ByIdResource::Flat(FlatPackageIndex::new(self.source.root()))
            }
            ProviderId::ExpandedById => {
                ByIdResource::Expanded(ExpandedPackageIndex::new(self.source.root()))
            }
            other => {
                return Err(FeedError::InvalidSource {
                    root: self.source.root().display().to_string(),
                    reason: format!("provider {other:?} cannot serve by-id queries"),
                })
            }
        };
        Ok(self.by_id.get_or_init(|| resource).clone())
    }

    /// The search resource for this source.
    pub fn search(&self, cancel: &CancellationToken) -> FeedResult<PackageSearchResource> {
        Ok(PackageSearchResource::new(self.feed(cancel)?))
    }

    /// The metadata resource for this source.
    pub fn metadata(&self, cancel: &CancellationToken) -> FeedResult<PackageMetadataResource> {
        Ok(PackageMetadataResource::new(self.feed(cancel)?))
    }

    /// The dependency-info resource for this source.
    pub fn dependency_info(
        &self,
        cancel: &CancellationToken,
    ) -> FeedResult<DependencyInfoResource> {
        Ok(DependencyInfoResource::new(self.feed(cancel)?))
    }

    /// The download resource for this source.
    pub fn download(&self, cancel: &CancellationToken) -> FeedResult<DownloadResource> {
        Ok(DownloadResource::new(self.feed(cancel)?))
    }

    /// The readme resource for this source.
    pub fn readme(&self, cancel: &CancellationToken) -> FeedResult<ReadmeResource> {
        Ok(ReadmeResource::new(self.feed(cancel)?))
    }

    /// The auto-complete resource for this source.
    pub fn autocomplete(&self, cancel: &CancellationToken) -> FeedResult<AutoCompleteResource> {
        Ok(AutoCompleteResource::new(self.feed(cancel)?))
    }

    /// The list resource for this source.
    pub fn list(&self, cancel: &CancellationToken) -> FeedResult<PackageListResource> {
        Ok(PackageListResource::new(self.feed(cancel)?))
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

    #[test]
    fn test_provider_order_flat_before_expanded() {
        let flat = PROVIDERS
            .iter()
            .position(|e| e.id == ProviderId::FlatById)
            .unwrap();
        let expanded = PROVIDERS
            .iter()
            .position(|e| e.id == ProviderId::ExpandedById)
            .unwrap();
        assert!(flat < expanded);
    }

    #[test]
    fn test_every_kind_has_a_provider() {
        for kind in [
            ResourceKind::FindById,
            ResourceKind::Search,
            ResourceKind::Metadata,
            ResourceKind::DependencyInfo,
            ResourceKind::Download,
            ResourceKind::Readme,
            ResourceKind::AutoComplete,
            ResourceKind::List,
        ] {
            assert!(
                select_provider(kind, FeedType::FlatV2).is_some(),
                "no provider for {kind:?}"
            );
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let first = select_provider(ResourceKind::FindById, FeedType::Unknown).unwrap();
        let second = select_provider(ResourceKind::FindById, FeedType::Unknown).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, ProviderId::FlatById);
    }

    #[test]
    fn test_expanded_feed_selects_expanded_by_id() {
        let entry = select_provider(ResourceKind::FindById, FeedType::ExpandedV3).unwrap();
        assert_eq!(entry.id, ProviderId::ExpandedById);
    }

    #[test]
    fn test_repository_rejects_http_sources() {
        let source = PackageSource::new("remote", "https://example.com/v3/index.json");
        assert!(matches!(
            SourceRepository::new(source),
            Err(FeedError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_repository_rejects_empty_root() {
        let source = PackageSource::new("empty", "");
        assert!(matches!(
            SourceRepository::new(source),
            Err(FeedError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_feed_type_override_wins() {
        let temp = TempDir::new().unwrap();
        let source = PackageSource::new("templates", temp.path())
            .with_feed_type(FeedType::Unzipped);
        let repo = SourceRepository::new(source).unwrap();

        assert_eq!(repo.feed_type(&token()).unwrap(), FeedType::Unzipped);
        assert_eq!(repo.feed(&token()).unwrap().feed_type(), FeedType::Unzipped);
    }

    #[test]
    fn test_detection_pins_feed_type() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.1.0.0.nupkg"), b"stub").unwrap();

        let repo = SourceRepository::new(PackageSource::new("local", temp.path())).unwrap();
        assert_eq!(repo.feed_type(&token()).unwrap(), FeedType::FlatV2);

        // Reshaping the folder afterwards does not re-detect.
        fs::remove_file(temp.path().join("a.1.0.0.nupkg")).unwrap();
        assert_eq!(repo.feed_type(&token()).unwrap(), FeedType::FlatV2);
    }

    #[test]
    fn test_by_id_resource_matches_feed_type() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.1.0.0.nupkg"), b"stub").unwrap();

        let repo = SourceRepository::new(PackageSource::new("local", temp.path())).unwrap();
        assert!(matches!(
            repo.find_package_by_id(&token()).unwrap(),
            ByIdResource::Flat(_)
        ));

        let expanded_root = TempDir::new().unwrap();
        let version_dir = expanded_root.path().join("a").join("1.0.0");
        fs::create_dir_all(&version_dir).unwrap();
        fs::write(version_dir.join("a.1.0.0.nupkg"), b"stub").unwrap();
        fs::write(version_dir.join("a.nuspec"), b"stub").unwrap();
        fs::write(version_dir.join("a.1.0.0.nupkg.sha512"), b"hash").unwrap();

        let repo =
            SourceRepository::new(PackageSource::new("cache", expanded_root.path())).unwrap();
        assert!(matches!(
            repo.find_package_by_id(&token()).unwrap(),
            ByIdResource::Expanded(_)
        ));
    }

    #[test]
    fn test_feed_instance_is_shared() {
        let temp = TempDir::new().unwrap();
        let repo = SourceRepository::new(PackageSource::new("local", temp.path())).unwrap();

        let first = repo.feed(&token()).unwrap();
        let second = repo.feed(&token()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
