//! Packfeed - local package feed discovery, caching, and resolution.
//!
//! This library locates, parses, and serves package metadata and
//! binaries from local filesystem-based feeds: flat nupkg folders,
//! expanded per-version folder trees (global package caches and
//! fallback folders), unzipped template feeds, and packages.config
//! style folders.
//!
//! # High-Level API
//!
//! A [`source::SourceRepository`] detects a folder's shape and hands
//! out typed resources over it:
//!
//! ```ignore
//! use packfeed::index::CacheContext;
//! use packfeed::source::{PackageSource, SourceRepository};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = PackageSource::new("local", "/feeds/local");
//! let repo = SourceRepository::new(source)?;
//!
//! let cancel = CancellationToken::new();
//! let by_id = repo.find_package_by_id(&cancel)?;
//! let versions = by_id.all_versions("serilog", &CacheContext::cached(), &cancel).await?;
//! ```

pub mod config;
pub mod feed;
pub mod index;
pub mod layout;
pub mod logging;
pub mod package;
pub mod resources;
pub mod source;
pub mod version;

/// Version of the packfeed library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
