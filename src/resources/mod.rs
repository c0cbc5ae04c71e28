//! Local resource adapters.
//!
//! Each adapter wraps a [`LocalPackageFeed`](crate::feed::LocalPackageFeed)
//! and translates folder discovery into the generic resource contracts
//! used uniformly with remote sources, so calling code need not care
//! whether a feed is a folder or an HTTP endpoint. Filtering happens in
//! memory over the full package list; local feeds are small.

mod autocomplete;
mod dependency_info;
mod download;
mod list;
mod metadata;
mod readme;
mod search;

pub use autocomplete::AutoCompleteResource;
pub use dependency_info::DependencyInfoResource;
pub use download::{DownloadOutcome, DownloadResource};
pub use list::{collapse_to_highest, PackageListResource};
pub use metadata::{PackageMetadata, PackageMetadataResource};
pub use readme::ReadmeResource;
pub use search::{PackageSearchResource, SearchFilter};
