//! Source configuration file handling.
//!
//! Loads and saves the `sources.ini` file listing named package sources
//! and fallback folders:
//!
//! ```ini
//! [packageSources]
//! local = /home/user/feeds/local
//! shared = /opt/packages
//!
//! [fallbackFolders]
//! preinstalled = /opt/fallback
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::source::PackageSource;

const SOURCES_SECTION: &str = "packageSources";
const FALLBACK_SECTION: &str = "fallbackFolders";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the config file.
    #[error("failed to read sources config: {0}")]
    Read(#[from] ini::Error),

    /// Failed to write the config file.
    #[error("failed to write sources config: {0}")]
    Write(std::io::Error),

    /// Failed to create the config directory.
    #[error("failed to create config directory: {0}")]
    Directory(std::io::Error),

    /// A source entry is unusable.
    #[error("invalid source entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },
}

/// The configured package sources.
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    /// Named package sources, in file order.
    pub sources: Vec<PackageSource>,
    /// Fallback folders consulted after the primary sources.
    pub fallback_folders: Vec<PathBuf>,
}

impl SourcesConfig {
    /// Load configuration from the default path
    /// (`~/.packfeed/sources.ini`). Missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file is not an error: it yields an empty
    /// configuration.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;

        let mut sources = Vec::new();
        if let Some(props) = ini.section(Some(SOURCES_SECTION)) {
            for (name, root) in props.iter() {
                if root.trim().is_empty() {
                    return Err(ConfigError::InvalidEntry {
                        name: name.to_string(),
                        reason: "source path is empty".to_string(),
                    });
                }
                sources.push(PackageSource::new(name, root));
            }
        }

        let mut fallback_folders = Vec::new();
        if let Some(props) = ini.section(Some(FALLBACK_SECTION)) {
            for (name, root) in props.iter() {
                if root.trim().is_empty() {
                    return Err(ConfigError::InvalidEntry {
                        name: name.to_string(),
                        reason: "fallback folder path is empty".to_string(),
                    });
                }
                fallback_folders.push(PathBuf::from(root));
            }
        }

        Ok(Self {
            sources,
            fallback_folders,
        })
    }

    /// Save configuration to a specific path, creating parent
    /// directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Directory)?;
        }

        let mut ini = Ini::new();
        for source in &self.sources {
            ini.with_section(Some(SOURCES_SECTION))
                .set(source.name(), source.root().to_string_lossy().into_owned());
        }
        for (index, folder) in self.fallback_folders.iter().enumerate() {
            ini.with_section(Some(FALLBACK_SECTION)).set(
                format!("fallback{index}"),
                folder.to_string_lossy().into_owned(),
            );
        }

        ini.write_to_file(path).map_err(ConfigError::Write)
    }

    /// Find a source by name, case-insensitively.
    pub fn source(&self, name: &str) -> Option<&PackageSource> {
        self.sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

/// Path to the config directory (`~/.packfeed`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".packfeed")
}

/// Path to the config file (`~/.packfeed/sources.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("sources.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SourcesConfig::load_from(&temp.path().join("absent.ini")).unwrap();
        assert!(config.sources.is_empty());
        assert!(config.fallback_folders.is_empty());
    }

    #[test]
    fn test_load_sources_and_fallbacks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sources.ini");
        std::fs::write(
            &path,
            "[packageSources]\nlocal = /feeds/local\nshared = /opt/packages\n\n\
             [fallbackFolders]\npre = /opt/fallback\n",
        )
        .unwrap();

        let config = SourcesConfig::load_from(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name(), "local");
        assert_eq!(config.sources[0].root(), Path::new("/feeds/local"));
        assert_eq!(config.fallback_folders, vec![PathBuf::from("/opt/fallback")]);
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("sources.ini");

        let config = SourcesConfig {
            sources: vec![
                PackageSource::new("local", "/feeds/local"),
                PackageSource::new("shared", "/opt/packages"),
            ],
            fallback_folders: vec![PathBuf::from("/opt/fallback")],
        };
        config.save_to(&path).unwrap();

        let loaded = SourcesConfig::load_from(&path).unwrap();
        assert_eq!(loaded.sources.len(), 2);
        assert_eq!(loaded.sources[1].name(), "shared");
        assert_eq!(loaded.fallback_folders.len(), 1);
    }

    #[test]
    fn test_empty_path_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sources.ini");
        std::fs::write(&path, "[packageSources]\nbad = \n").unwrap();

        assert!(matches!(
            SourcesConfig::load_from(&path),
            Err(ConfigError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_source_lookup_by_name() {
        let config = SourcesConfig {
            sources: vec![PackageSource::new("Local", "/feeds/local")],
            fallback_folders: Vec::new(),
        };
        assert!(config.source("local").is_some());
        assert!(config.source("missing").is_none());
    }
}
