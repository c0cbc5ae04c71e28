//! Per-id package indexes.
//!
//! A restore of a large dependency graph queries the same package ids
//! repeatedly across transitive references. The indexes here answer
//! those queries out of a process-lifetime, per-id memory cache instead
//! of rescanning the folder every time. Two folder shapes are covered:
//! [`FlatPackageIndex`] for flat nupkg folders and
//! [`ExpandedPackageIndex`] for expanded per-version folders.

mod context;
mod expanded;
mod flat;
mod nuspec_cache;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

pub use context::CacheContext;
pub use expanded::ExpandedPackageIndex;
pub use flat::FlatPackageIndex;
pub use nuspec_cache::NuspecFileCache;

use crate::feed::FeedResult;
use crate::package::{DependencyGroup, PackageIdentity};
use crate::version::PackageVersion;

/// Dependency information for one resolved package.
#[derive(Debug, Clone)]
pub struct PackageDependencyInfo {
    /// The package the information belongs to.
    pub identity: PackageIdentity,
    /// Dependency groups from the package manifest.
    pub dependency_groups: Vec<DependencyGroup>,
}

/// A by-id resource over either index shape.
///
/// The two index types have incompatible internals (one caches bare
/// versions, the other whole package records), so dispatch goes through
/// an enum rather than a trait object.
#[derive(Clone)]
pub enum ByIdResource {
    /// Flat-folder index.
    Flat(FlatPackageIndex),
    /// Expanded-folder index.
    Expanded(ExpandedPackageIndex),
}

impl ByIdResource {
    /// All versions of `id` visible to this resource.
    pub async fn all_versions(
        &self,
        id: &str,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Vec<PackageVersion>> {
        match self {
            Self::Flat(index) => index.all_versions(id, ctx, cancel).await,
            Self::Expanded(index) => index.all_versions(id, ctx, cancel).await,
        }
    }

    /// True when the exact (id, version) is available.
    pub async fn package_exists(
        &self,
        id: &str,
        version: &PackageVersion,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<bool> {
        match self {
            Self::Flat(index) => index.package_exists(id, version, ctx, cancel).await,
            Self::Expanded(index) => index.package_exists(id, version, cancel).await,
        }
    }

    /// Copy the package's bytes into `destination`; `false` when absent.
    pub async fn copy_nupkg_to<W>(
        &self,
        id: &str,
        version: &PackageVersion,
        destination: &mut W,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<bool>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Self::Flat(index) => {
                index
                    .copy_nupkg_to(id, version, destination, ctx, cancel)
                    .await
            }
            Self::Expanded(index) => index.copy_nupkg_to(id, version, destination, cancel).await,
        }
    }

    /// Dependency information for the exact (id, version).
    pub async fn dependency_info(
        &self,
        id: &str,
        version: &PackageVersion,
        ctx: &CacheContext,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<PackageDependencyInfo>> {
        match self {
            Self::Flat(index) => index.dependency_info(id, version, ctx, cancel).await,
            Self::Expanded(index) => index.dependency_info(id, version, cancel).await,
        }
    }
}
