//! Package version parsing and ordering.
//!
//! Package versions follow semantic versioning, with tolerance for the
//! legacy four-part form (`1.2.3.4`) still found in older feeds. The
//! original string is preserved so exact lookups can prefer the
//! non-normalized spelling over a semantically-equal one.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease};
use thiserror::Error;

/// Error parsing a package version string.
#[derive(Debug, Error)]
pub enum VersionParseError {
    /// The version string is empty.
    #[error("version string is empty")]
    Empty,

    /// A numeric component could not be parsed.
    #[error("invalid numeric component '{0}'")]
    InvalidNumber(String),

    /// The version has more than four numeric components.
    #[error("too many version components in '{0}'")]
    TooManyParts(String),

    /// The prerelease label is not valid.
    #[error("invalid prerelease label '{0}'")]
    InvalidPrerelease(String),

    /// The build metadata is not valid.
    #[error("invalid build metadata '{0}'")]
    InvalidBuildMetadata(String),
}

/// A package version.
///
/// Wraps a semantic version plus a legacy `revision` component for
/// four-part versions. Build metadata is parsed but ignored for
/// equality and ordering, matching semantic versioning precedence.
///
/// # Example
///
/// ```
/// use packfeed::version::PackageVersion;
///
/// let a: PackageVersion = "1.0".parse().unwrap();
/// let b: PackageVersion = "1.0.0".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.normalized(), "1.0.0");
/// ```
#[derive(Debug, Clone)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    pre: Prerelease,
    build: BuildMetadata,
    original: String,
}

impl PackageVersion {
    /// Create a three-part release version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            pre: Prerelease::EMPTY,
            build: BuildMetadata::EMPTY,
            original: format!("{major}.{minor}.{patch}"),
        }
    }

    /// Parse a version string.
    ///
    /// Accepts one to four dot-separated numeric components, an optional
    /// `-prerelease` label, and optional `+build` metadata. Missing
    /// components default to zero (`"1.0"` parses as `1.0.0`).
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let original = input.trim();
        if original.is_empty() {
            return Err(VersionParseError::Empty);
        }

        // Split off build metadata, then the prerelease label.
        let (rest, build) = match original.split_once('+') {
            Some((rest, build)) => (
                rest,
                BuildMetadata::new(build)
                    .map_err(|_| VersionParseError::InvalidBuildMetadata(build.to_string()))?,
            ),
            None => (original, BuildMetadata::EMPTY),
        };

        let (numbers, pre) = match rest.split_once('-') {
            Some((numbers, pre)) => (
                numbers,
                Prerelease::new(pre)
                    .map_err(|_| VersionParseError::InvalidPrerelease(pre.to_string()))?,
            ),
            None => (rest, Prerelease::EMPTY),
        };

        let mut parts = [0u64; 4];
        let mut count = 0;
        for piece in numbers.split('.') {
            if count == 4 {
                return Err(VersionParseError::TooManyParts(original.to_string()));
            }
            parts[count] = piece
                .parse::<u64>()
                .map_err(|_| VersionParseError::InvalidNumber(piece.to_string()))?;
            count += 1;
        }
        if count == 0 {
            return Err(VersionParseError::Empty);
        }

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            revision: parts[3],
            pre,
            build,
            original: original.to_string(),
        })
    }

    /// Major version component.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor version component.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch version component.
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Legacy fourth component; zero for semantic versions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if this version carries a prerelease label.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The prerelease label, empty for release versions.
    pub fn prerelease(&self) -> &str {
        self.pre.as_str()
    }

    /// The version string exactly as it was parsed.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Canonical form used in on-disk layouts.
    ///
    /// Always three numeric components, the revision appended only when
    /// non-zero, the prerelease label preserved, build metadata dropped:
    /// `"1.0"` → `"1.0.0"`, `"1.0.0.1-beta+x"` → `"1.0.0.1-beta"`.
    pub fn normalized(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision > 0 {
            out.push('.');
            out.push_str(&self.revision.to_string());
        }
        if !self.pre.is_empty() {
            out.push('-');
            out.push_str(self.pre.as_str());
        }
        out
    }
}

impl FromStr for PackageVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| self.revision.cmp(&other.revision))
            // An empty prerelease compares greater than any label.
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.revision.hash(state);
        self.pre.as_str().hash(state);
    }
}
