//! Discovered-package records.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::package::archive::{ArchiveError, PackageArchive};
use crate::package::nuspec::{parse_nuspec, Nuspec, NuspecError};
use crate::package::PackageIdentity;

/// Error reading package metadata off disk.
#[derive(Debug, Error)]
pub enum PackageReadError {
    /// The standalone nuspec file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The standalone nuspec file is malformed.
    #[error("malformed manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: NuspecError,
    },

    /// The package archive could not be read.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// One discovered package in a local feed.
///
/// Identity and paths are immutable once constructed. The nuspec is
/// parsed at most once per instance; archive readers are opened fresh
/// per call because archive handles cannot be shared across readers.
#[derive(Debug)]
pub struct LocalPackageInfo {
    identity: PackageIdentity,
    /// Path of the `.nupkg` file.
    path: PathBuf,
    /// Direct path to the nuspec for expanded layouts; `None` when the
    /// manifest must come out of the archive.
    nuspec_path: Option<PathBuf>,
    last_write_utc: DateTime<Utc>,
    nuspec: Mutex<Option<Arc<Nuspec>>>,
}

impl LocalPackageInfo {
    /// Create a record for a package backed by a nupkg file alone.
    pub fn new(
        identity: PackageIdentity,
        path: impl Into<PathBuf>,
        last_write_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            path: path.into(),
            nuspec_path: None,
            last_write_utc,
            nuspec: Mutex::new(None),
        }
    }

    /// Create a record whose manifest lives beside the nupkg on disk.
    pub fn with_nuspec_path(
        identity: PackageIdentity,
        path: impl Into<PathBuf>,
        nuspec_path: impl Into<PathBuf>,
        last_write_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            path: path.into(),
            nuspec_path: Some(nuspec_path.into()),
            last_write_utc,
            nuspec: Mutex::new(None),
        }
    }

    /// Attach an already-parsed nuspec, avoiding a later re-parse.
    pub fn with_parsed_nuspec(self, nuspec: Arc<Nuspec>) -> Self {
        *self.nuspec.lock().unwrap_or_else(|e| e.into_inner()) = Some(nuspec);
        self
    }

    /// The package identity.
    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    /// Absolute path of the `.nupkg` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the standalone nuspec file, if the layout provides one.
    pub fn nuspec_path(&self) -> Option<&Path> {
        self.nuspec_path.as_deref()
    }

    /// Last write time of the package, used as a publish-date proxy.
    pub fn last_write_utc(&self) -> DateTime<Utc> {
        self.last_write_utc
    }

    /// The parsed nuspec manifest.
    ///
    /// Parsed at most once per instance; concurrent first callers
    /// serialize on an internal lock. A failed parse is not cached, so
    /// a later call retries.
    pub fn nuspec(&self) -> Result<Arc<Nuspec>, PackageReadError> {
        let mut slot = self.nuspec.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(nuspec) = slot.as_ref() {
            return Ok(nuspec.clone());
        }

        let parsed = Arc::new(self.load_nuspec()?);
        *slot = Some(parsed.clone());
        Ok(parsed)
    }

    /// Open a fresh reader over the package archive.
    ///
    /// Each call returns a new reader; the caller owns it for the
    /// duration of one use.
    pub fn open_archive(&self) -> Result<PackageArchive, PackageReadError> {
        Ok(PackageArchive::open(&self.path)?)
    }

    fn load_nuspec(&self) -> Result<Nuspec, PackageReadError> {
        match &self.nuspec_path {
            Some(nuspec_path) => {
                let xml =
                    fs::read_to_string(nuspec_path).map_err(|source| PackageReadError::ManifestIo {
                        path: nuspec_path.clone(),
                        source,
                    })?;
                parse_nuspec(&xml).map_err(|source| PackageReadError::Manifest {
                    path: nuspec_path.clone(),
                    source,
                })
            }
            None => Ok(self.open_archive()?.read_nuspec().map_err(PackageReadError::Archive)?),
        }
    }
}

/// Read a file's mtime as UTC, falling back to the epoch when the
/// filesystem cannot report one.
pub(crate) fn last_write_time_utc(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn nuspec_xml(id: &str, version: &str) -> String {
        format!(
            "<package><metadata><id>{id}</id><version>{version}</version></metadata></package>"
        )
    }

    fn write_nupkg(dir: &Path, file_name: &str, id: &str, version: &str) -> PathBuf {
        let path = dir.join(file_name);
        let file = fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer
            .start_file(format!("{id}.nuspec"), options)
            .unwrap();
        writer.write_all(nuspec_xml(id, version).as_bytes()).unwrap();
        writer.finish().unwrap();
        path
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(id, version.parse().unwrap())
    }

    #[test]
    fn test_nuspec_from_archive() {
        let temp = TempDir::new().unwrap();
        let path = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");

        let info = LocalPackageInfo::new(identity("a", "1.0.0"), &path, Utc::now());
        let nuspec = info.nuspec().unwrap();
        assert_eq!(nuspec.id(), "a");
    }

    #[test]
    fn test_nuspec_from_standalone_file() {
        let temp = TempDir::new().unwrap();
        let nupkg = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");
        let nuspec_path = temp.path().join("a.nuspec");
        fs::write(&nuspec_path, nuspec_xml("a", "1.0.0")).unwrap();

        let info = LocalPackageInfo::with_nuspec_path(
            identity("a", "1.0.0"),
            &nupkg,
            &nuspec_path,
            Utc::now(),
        );
        assert_eq!(info.nuspec().unwrap().id(), "a");
    }

    #[test]
    fn test_nuspec_memoized() {
        let temp = TempDir::new().unwrap();
        let nupkg = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");
        let nuspec_path = temp.path().join("a.nuspec");
        fs::write(&nuspec_path, nuspec_xml("a", "1.0.0")).unwrap();

        let info = LocalPackageInfo::with_nuspec_path(
            identity("a", "1.0.0"),
            &nupkg,
            &nuspec_path,
            Utc::now(),
        );

        let first = info.nuspec().unwrap();

        // Corrupt the file; the memoized parse must still be served.
        fs::write(&nuspec_path, "<broken").unwrap();
        let second = info.nuspec().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_pre_parsed_nuspec_is_reused() {
        let temp = TempDir::new().unwrap();
        let nupkg = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");

        let parsed = Arc::new(parse_nuspec(&nuspec_xml("a", "1.0.0")).unwrap());
        let info = LocalPackageInfo::new(identity("a", "1.0.0"), &nupkg, Utc::now())
            .with_parsed_nuspec(parsed.clone());

        assert!(Arc::ptr_eq(&parsed, &info.nuspec().unwrap()));
    }

    #[test]
    fn test_open_archive_returns_fresh_reader() {
        let temp = TempDir::new().unwrap();
        let path = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");

        let info = LocalPackageInfo::new(identity("a", "1.0.0"), &path, Utc::now());
        let mut first = info.open_archive().unwrap();
        let mut second = info.open_archive().unwrap();

        assert_eq!(first.read_nuspec().unwrap().id(), "a");
        assert_eq!(second.read_nuspec().unwrap().id(), "a");
    }

    #[test]
    fn test_failed_parse_not_cached() {
        let temp = TempDir::new().unwrap();
        let nupkg = write_nupkg(temp.path(), "a.1.0.0.nupkg", "a", "1.0.0");
        let nuspec_path = temp.path().join("a.nuspec");
        fs::write(&nuspec_path, "<broken").unwrap();

        let info = LocalPackageInfo::with_nuspec_path(
            identity("a", "1.0.0"),
            &nupkg,
            &nuspec_path,
            Utc::now(),
        );
        assert!(info.nuspec().is_err());

        // Repair the file; the next call retries and succeeds.
        fs::write(&nuspec_path, nuspec_xml("a", "1.0.0")).unwrap();
        assert_eq!(info.nuspec().unwrap().id(), "a");
    }
}
