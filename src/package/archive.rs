//! Package archive access.
//!
//! A package file (`.nupkg`) is a zip archive carrying the nuspec
//! manifest at its root. Readers are cheap to open and must not be
//! shared across threads; callers open a fresh reader per use.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::package::nuspec::{parse_nuspec, Nuspec, NuspecError};

/// Error reading a package archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file could not be opened.
    #[error("failed to open package archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is not a readable zip file.
    #[error("package archive {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry could not be read out of the archive.
    #[error("failed to read entry '{entry}' from {path}: {source}")]
    Entry {
        path: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// The archive carries no nuspec manifest.
    #[error("package archive {path} has no nuspec entry")]
    MissingNuspec { path: PathBuf },

    /// The nuspec inside the archive is malformed.
    #[error("package archive {path} has a malformed nuspec")]
    Nuspec {
        path: PathBuf,
        #[source]
        source: NuspecError,
    },
}

/// An open package archive.
///
/// Holds an exclusive handle on the underlying zip; create one per use
/// and drop it when done.
pub struct PackageArchive {
    path: PathBuf,
    zip: zip::ZipArchive<File>,
}

impl PackageArchive {
    /// Open a package archive for reading.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ArchiveError::Open {
            path: path.clone(),
            source,
        })?;
        let zip = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Corrupt {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, zip })
    }

    /// Path of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the root-level nuspec entry, if present.
    pub fn nuspec_entry(&self) -> Option<String> {
        self.zip
            .file_names()
            .find(|name| !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec"))
            .map(str::to_string)
    }

    /// Read and parse the nuspec manifest.
    pub fn read_nuspec(&mut self) -> Result<Nuspec, ArchiveError> {
        let entry = self
            .nuspec_entry()
            .ok_or_else(|| ArchiveError::MissingNuspec {
                path: self.path.clone(),
            })?;
        let xml = self.read_entry_string(&entry)?;
        parse_nuspec(&xml).map_err(|source| ArchiveError::Nuspec {
            path: self.path.clone(),
            source,
        })
    }

    /// Read a named entry as text, `None` if the entry does not exist.
    ///
    /// Entry names use forward slashes, as stored in the archive.
    pub fn read_text_entry(&mut self, name: &str) -> Result<Option<String>, ArchiveError> {
        let entry = match self.find_entry(name) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        self.read_entry_string(&entry).map(Some)
    }

    /// Locate an entry by name, ignoring case.
    fn find_entry(&self, name: &str) -> Option<String> {
        self.zip
            .file_names()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(str::to_string)
    }

    fn read_entry_string(&mut self, entry: &str) -> Result<String, ArchiveError> {
        let mut file = self.zip.by_name(entry).map_err(|source| match source {
            zip::result::ZipError::Io(io) => ArchiveError::Entry {
                path: self.path.clone(),
                entry: entry.to_string(),
                source: io,
            },
            other => ArchiveError::Corrupt {
                path: self.path.clone(),
                source: other,
            },
        })?;

        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|source| ArchiveError::Entry {
                path: self.path.clone(),
                entry: entry.to_string(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
