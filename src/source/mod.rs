//! Package sources and resource selection.

mod provider;

use std::path::{Path, PathBuf};

pub use provider::{ProviderEntry, ProviderId, ResourceKind, SourceRepository, PROVIDERS};

use crate::feed::FeedType;

/// One configured package source: a named local folder.
#[derive(Debug, Clone)]
pub struct PackageSource {
    name: String,
    root: PathBuf,
    feed_type_override: Option<FeedType>,
}

impl PackageSource {
    /// Create a source with a display name and a root folder.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            feed_type_override: None,
        }
    }

    /// Pin the feed type instead of detecting it from the folder
    /// shape. Required for unzipped and packages.config feeds, which
    /// are never inferred.
    pub fn with_feed_type(mut self, feed_type: FeedType) -> Self {
        self.feed_type_override = Some(feed_type);
        self
    }

    /// The source's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source's root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The pinned feed type, if any.
    pub fn feed_type_override(&self) -> Option<FeedType> {
        self.feed_type_override
    }
}
