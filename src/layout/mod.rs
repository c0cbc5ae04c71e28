//! On-disk layout contracts for expanded package folders.

mod version_folder;

pub use version_folder::VersionFolderPathResolver;

/// Completion marker written when a package install fully finishes.
pub const NUPKG_METADATA_FILE: &str = ".nupkg.metadata";

/// Legacy completion marker suffix (`{id}.{version}.nupkg.sha512`).
pub const HASH_FILE_SUFFIX: &str = ".nupkg.sha512";
