//! Path computation for expanded (per-version folder) package layouts.

use std::path::{Path, PathBuf};

use crate::layout::{HASH_FILE_SUFFIX, NUPKG_METADATA_FILE};
use crate::version::PackageVersion;

/// Computes every path associated with an installed package under an
/// expanded folder root.
///
/// The layout is `root/{id}/{version}/...` with the id and the
/// normalized version lowercased. This is pure path arithmetic: the
/// resolver performs no I/O and always produces identical output for
/// identical input, so instances can be shared freely across threads
/// and outputs diffed across runs.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use packfeed::layout::VersionFolderPathResolver;
///
/// let resolver = VersionFolderPathResolver::new("/packages");
/// let version = "1.0.0".parse().unwrap();
///
/// assert_eq!(
///     resolver.install_path("PackageA", &version),
///     PathBuf::from("/packages/packagea/1.0.0")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct VersionFolderPathResolver {
    root: PathBuf,
}

impl VersionFolderPathResolver {
    /// Create a resolver over the given root folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root folder this resolver computes paths under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every installed version of an id:
    /// `root/{id}`.
    pub fn version_list_path(&self, id: &str) -> PathBuf {
        self.root.join(id.to_lowercase())
    }

    /// Install folder for one package version:
    /// `root/{id}/{version}`.
    pub fn install_path(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.version_list_path(id)
            .join(version.normalized().to_lowercase())
    }

    /// Manifest path: `root/{id}/{version}/{id}.nuspec`.
    pub fn manifest_file_path(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.manifest_file_name(id))
    }

    /// Package file path: `root/{id}/{version}/{id}.{version}.nupkg`.
    pub fn package_file_path(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.package_file_name(id, version))
    }

    /// Legacy completion marker:
    /// `root/{id}/{version}/{id}.{version}.nupkg.sha512`.
    pub fn hash_path(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.hash_file_name(id, version))
    }

    /// Current completion marker:
    /// `root/{id}/{version}/.nupkg.metadata`.
    pub fn nupkg_metadata_path(&self, id: &str, version: &PackageVersion) -> PathBuf {
        self.install_path(id, version).join(NUPKG_METADATA_FILE)
    }

    /// File name of the manifest: `{id}.nuspec`.
    pub fn manifest_file_name(&self, id: &str) -> String {
        format!("{}{}", id.to_lowercase(), crate::package::MANIFEST_EXTENSION)
    }

    /// File name of the package: `{id}.{version}.nupkg`.
    pub fn package_file_name(&self, id: &str, version: &PackageVersion) -> String {
        format!(
            "{}.{}{}",
            id.to_lowercase(),
            version.normalized().to_lowercase(),
            crate::package::PACKAGE_EXTENSION
        )
    }

    /// File name of the legacy hash marker: `{id}.{version}.nupkg.sha512`.
    pub fn hash_file_name(&self, id: &str, version: &PackageVersion) -> String {
        format!(
            "{}.{}{}",
            id.to_lowercase(),
            version.normalized().to_lowercase(),
            HASH_FILE_SUFFIX
        )
    }
}
