//! Sources able to turn a URL into a real track.

use async_trait::async_trait;
use url::Url;

use crate::entity::TrackPtr;

/// A collection (local database, service, file reader...) that can look up
/// tracks by URL.
#[async_trait]
pub trait TrackProvider: Send + Sync {
    /// Name used in log messages.
    fn name(&self) -> &str;

    /// Cheap pre-check; `false` means [`TrackProvider::track_for_url`] is
    /// not worth calling.
    fn possibly_contains_track(&self, url: &Url) -> bool;

    async fn track_for_url(&self, url: &Url) -> Option<TrackPtr>;
}
