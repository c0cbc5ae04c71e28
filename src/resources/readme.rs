//! Package readme resource.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::feed::{run_blocking, FeedResult, LocalPackageFeed};
use crate::package::{LocalPackageInfo, PackageIdentity};

/// Serves package readme text out of a local feed.
///
/// Every missing link in the chain (unknown package, no readme entry
/// in the manifest, file absent on disk or in the archive) yields
/// `Ok(None)`. "No readme" is never an error.
pub struct ReadmeResource {
    feed: Arc<dyn LocalPackageFeed>,
}

impl ReadmeResource {
    /// Create a readme resource over the given feed.
    pub fn new(feed: Arc<dyn LocalPackageFeed>) -> Self {
        Self { feed }
    }

    /// The readme text for an exact identity, if one exists.
    pub async fn readme(
        &self,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> FeedResult<Option<String>> {
        let feed = self.feed.clone();
        let identity = identity.clone();
        let cancel = cancel.clone();
        run_blocking(move || {
            let Some(package) = feed.get(&identity, &cancel)? else {
                return Ok(None);
            };
            Ok(readme_for(&package))
        })
        .await
    }
}

fn readme_for(package: &LocalPackageInfo) -> Option<String> {
    let nuspec = match package.nuspec() {
        Ok(nuspec) => nuspec,
        Err(e) => {
            debug!(
                "no readme for {}: manifest unreadable: {}",
                package.identity(),
                e
            );
            return None;
        }
    };
    let relative = nuspec.readme()?;

    // Expanded layouts have the content loose beside the manifest;
    // otherwise the file lives inside the archive.
    if let Some(nuspec_path) = package.nuspec_path() {
        let install_dir = nuspec_path.parent()?;
        let candidate = install_dir.join(relative.replace('\\', "/"));
        return match std::fs::read_to_string(&candidate) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("no readme at {}: {}", candidate.display(), e);
                None
            }
        };
    }

    let mut archive = match package.open_archive() {
        Ok(archive) => archive,
        Err(e) => {
            debug!("no readme for {}: {}", package.identity(), e);
            return None;
        }
    };
    match archive.read_text_entry(&relative.replace('\\', "/")) {
        Ok(text) => text,
        Err(e) => {
            debug!("no readme for {}: {}", package.identity(), e);
            None
        }
    }
}
