//! Package identity: the (id, version) pair naming a package.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::version::PackageVersion;

/// Immutable (id, version) pair uniquely naming a package.
///
/// Ids compare case-insensitively at every boundary; versions compare
/// semantically. Suitable as a map or set key.
#[derive(Debug, Clone)]
pub struct PackageIdentity {
    id: String,
    version: PackageVersion,
}

impl PackageIdentity {
    /// Create a new identity.
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// The package id, in its original casing.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The package version.
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// True if the given id names this package, ignoring case.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.version)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        let ids = self
            .id
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.id.bytes().map(|b| b.to_ascii_lowercase()));
        ids.then_with(|| self.version.cmp(&other.version))
    }
}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.id.bytes() {
            b.to_ascii_lowercase().hash(state);
        }
        self.version.hash(state);
    }
}
