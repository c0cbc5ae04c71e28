//! Shared nuspec parse cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::package::{parse_nuspec, Nuspec, PackageReadError};

/// Nuspec files parsed from disk, keyed by path.
///
/// A restore session asks for the same manifest once per dependent
/// query; caching the parse keeps that linear instead of quadratic.
/// The cache can be shared between components reading the same files.
#[derive(Default)]
pub struct NuspecFileCache {
    cache: DashMap<PathBuf, Arc<Nuspec>>,
}

impl NuspecFileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the nuspec at `path`, or serve the cached parse.
    ///
    /// Failed parses are not cached; a later call retries.
    pub fn get_or_parse(&self, path: &Path) -> Result<Arc<Nuspec>, PackageReadError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }

        let xml = std::fs::read_to_string(path).map_err(|source| PackageReadError::ManifestIo {
            path: path.to_path_buf(),
            source,
        })?;
        let nuspec = parse_nuspec(&xml).map_err(|source| PackageReadError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = self
            .cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(nuspec));
        Ok(entry.value().clone())
    }

    /// Number of cached manifests.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
