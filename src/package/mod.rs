//! Core package data model: identities, manifests, archives, and
//! discovered-package records shared by every feed variant.

mod archive;
mod identity;
mod info;
mod nuspec;

pub use archive::{ArchiveError, PackageArchive};
pub use identity::PackageIdentity;
pub use info::{LocalPackageInfo, PackageReadError};
pub use nuspec::{parse_nuspec, DependencyGroup, Nuspec, NuspecError, PackageDependency};

pub(crate) use info::last_write_time_utc;

/// File extension of package archives.
pub const PACKAGE_EXTENSION: &str = ".nupkg";

/// File extension of package manifests.
pub const MANIFEST_EXTENSION: &str = ".nuspec";
