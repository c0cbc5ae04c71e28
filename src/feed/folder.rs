//! Shared folder-scanning utilities for the feed variants.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::feed::{FeedError, FeedResult, FeedType};
use crate::layout::VersionFolderPathResolver;
use crate::package::{last_write_time_utc, LocalPackageInfo, PackageReadError, PACKAGE_EXTENSION};
use crate::version::PackageVersion;

/// Bail out with [`FeedError::Cancelled`] when the token is cancelled.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> FeedResult<()> {
    if cancel.is_cancelled() {
        return Err(FeedError::Cancelled);
    }
    Ok(())
}

/// Require the source root to exist on disk.
///
/// A missing root is a whole-source problem and fatal; it must not be
/// mistaken for "no packages here".
pub(crate) fn ensure_root_exists(root: &Path) -> FeedResult<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(FeedError::SourceNotFound {
            source_root: root.to_path_buf(),
        })
    }
}

/// Enumerate subdirectories, logging and swallowing I/O problems.
///
/// Per-entry filesystem errors must not abort a whole-folder scan; on
/// failure this logs a warning and returns an empty list. Cancellation
/// is the exception and always propagates.
pub(crate) fn subdirectories(
    dir: &Path,
    cancel: &CancellationToken,
) -> FeedResult<Vec<PathBuf>> {
    check_cancelled(cancel)?;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to enumerate {}: {}", dir.display(), e);
            return Ok(Vec::new());
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        check_cancelled(cancel)?;
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                }
            }
            Err(e) => {
                warn!("failed to enumerate {}: {}", dir.display(), e);
                return Ok(Vec::new());
            }
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Find `*.nupkg` files directly inside a directory.
pub(crate) fn nupkg_files(dir: &Path, cancel: &CancellationToken) -> FeedResult<Vec<PathBuf>> {
    check_cancelled(cancel)?;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to enumerate {}: {}", dir.display(), e);
            return Ok(Vec::new());
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        check_cancelled(cancel)?;
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() && has_package_extension(&path) {
                    files.push(path);
                }
            }
            Err(e) => {
                warn!("failed to enumerate {}: {}", dir.display(), e);
                return Ok(Vec::new());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Discover nupkgs from a flat folder: the root itself plus one
/// directory level deep, grouped by containing directory.
///
/// The per-directory grouping lets exact lookups preserve the legacy
/// preference for a non-normalized version match within one directory.
pub(crate) fn nupkg_files_chunked(
    root: &Path,
    cancel: &CancellationToken,
) -> FeedResult<Vec<Vec<PathBuf>>> {
    let mut chunks = Vec::new();

    let top = nupkg_files(root, cancel)?;
    if !top.is_empty() {
        chunks.push(top);
    }

    for dir in subdirectories(root, cancel)? {
        let files = nupkg_files(&dir, cancel)?;
        if !files.is_empty() {
            chunks.push(files);
        }
    }

    Ok(chunks)
}

fn has_package_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase().ends_with(PACKAGE_EXTENSION))
        .unwrap_or(false)
}

/// Parse a version out of an `{id}.{version}` string, given the
/// expected id. Returns `None` when the prefix does not match or the
/// remainder is not a version.
pub fn version_from_id_prefix(name: &str, id: &str) -> Option<PackageVersion> {
    let prefix_len = id.len() + 1;
    if name.len() <= prefix_len || !name.is_char_boundary(id.len()) {
        return None;
    }
    if !name[..id.len()].eq_ignore_ascii_case(id) || name.as_bytes()[id.len()] != b'.' {
        return None;
    }
    name[prefix_len..].parse().ok()
}

/// Parse a version out of a nupkg file name, given the expected id.
///
/// An imperfect, filename-only guess: `a.b.1.0.0.nupkg` could be id
/// `a.b` version `1.0.0` or id `a` with an impossible version. The
/// result must be confirmed against the package's own manifest. Symbol
/// packages (`.symbols.nupkg`) are skipped.
pub fn version_from_file_name(file_name: &str, id: &str) -> Option<PackageVersion> {
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(PACKAGE_EXTENSION) {
        return None;
    }
    let stem = &file_name[..file_name.len() - PACKAGE_EXTENSION.len()];
    if stem.to_ascii_lowercase().ends_with(".symbols") {
        return None;
    }
    version_from_id_prefix(stem, id)
}

/// True if the file name plausibly belongs to the id. Must be verified
/// against the nuspec before trusting it.
pub(crate) fn is_possible_package_match(path: &Path, id: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| version_from_file_name(n, id))
        .is_some()
}

/// Drop duplicate identities, keeping the first occurrence.
///
/// Physically duplicated packages (the same id+version present both as
/// a loose folder and a nupkg, or in several subfolders) must surface
/// exactly once in listings.
pub(crate) fn dedup_by_identity(
    packages: Vec<Arc<LocalPackageInfo>>,
) -> Vec<Arc<LocalPackageInfo>> {
    let mut seen = std::collections::HashSet::new();
    packages
        .into_iter()
        .filter(|p| seen.insert(p.identity().clone()))
        .collect()
}

/// Read a package record out of a nupkg, confirming identity from the
/// manifest inside. Corrupt archives and manifests become a single
/// wrapped metadata error naming the file and the source root.
pub(crate) fn package_from_nupkg(
    path: &Path,
    source_root: &Path,
) -> FeedResult<Arc<LocalPackageInfo>> {
    let wrap = |cause: PackageReadError| FeedError::PackageMetadata {
        reference: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        source_root: source_root.to_path_buf(),
        cause,
    };

    let mut archive = crate::package::PackageArchive::open(path)
        .map_err(|e| wrap(PackageReadError::Archive(e)))?;
    let nuspec = archive
        .read_nuspec()
        .map_err(|e| wrap(PackageReadError::Archive(e)))?;

    let info = LocalPackageInfo::new(nuspec.identity(), path, last_write_time_utc(path))
        .with_parsed_nuspec(Arc::new(nuspec));
    Ok(Arc::new(info))
}

/// Detect the shape of a local feed folder.
///
/// Any nupkg at the top level or one directory deep makes the feed
/// flat; an `{id}/{version}` folder holding a complete package makes it
/// expanded; anything else (including a missing root) is unknown.
/// Unzipped and packages.config feeds are chosen explicitly by the
/// caller, never inferred.
pub fn detect_feed_type(root: &Path, cancel: &CancellationToken) -> FeedResult<FeedType> {
    check_cancelled(cancel)?;

    if !root.is_dir() {
        return Ok(FeedType::Unknown);
    }

    if !nupkg_files(root, cancel)?.is_empty() {
        return Ok(FeedType::FlatV2);
    }

    let resolver = VersionFolderPathResolver::new(root);
    for id_dir in subdirectories(root, cancel)? {
        if !nupkg_files(&id_dir, cancel)?.is_empty() {
            return Ok(FeedType::FlatV2);
        }

        let Some(id) = id_dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        for version_dir in subdirectories(&id_dir, cancel)? {
            let Some(version) = version_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<PackageVersion>().ok())
            else {
                continue;
            };
            // Resolve file names against the directory actually found,
            // so oddly-cased id folders don't defeat detection.
            let complete = version_dir
                .join(resolver.package_file_name(&id, &version))
                .is_file()
                && version_dir.join(resolver.manifest_file_name(&id)).is_file()
                && (version_dir.join(resolver.hash_file_name(&id, &version)).is_file()
                    || version_dir.join(crate::layout::NUPKG_METADATA_FILE).is_file());
            if complete {
                return Ok(FeedType::ExpandedV3);
            }
        }
    }

    debug!("could not determine feed type for {}", root.display());
    Ok(FeedType::Unknown)
}
