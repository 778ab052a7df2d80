//! Resolution of proxy tracks against the registered track providers.

use std::sync::Arc;

use amkmeta::{Base, ProxyTrack, TrackProvider};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Asks each [`TrackProvider`] in turn for the real track behind a proxy.
#[derive(Clone, Default)]
pub struct ProxyResolver {
    providers: Vec<Arc<dyn TrackProvider>>,
}

impl ProxyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, provider: Arc<dyn TrackProvider>) {
        debug!(provider = provider.name(), "track provider registered");
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Arc<dyn TrackProvider>] {
        &self.providers
    }

    /// Resolves `proxy` in a background task. The handle yields whether a
    /// provider found the track.
    pub fn resolve(&self, proxy: Arc<ProxyTrack>) -> JoinHandle<bool> {
        let resolver = self.clone();
        tokio::spawn(async move { resolver.resolve_now(&proxy).await })
    }

    /// Tries the providers in registration order and resolves `proxy` with
    /// the first track found. Already resolved proxies are left alone.
    pub async fn resolve_now(&self, proxy: &ProxyTrack) -> bool {
        let Some(url) = proxy.url() else {
            return true;
        };

        for provider in &self.providers {
            if !provider.possibly_contains_track(&url) {
                continue;
            }
            trace!(provider = provider.name(), %url, "asking provider");
            if let Some(track) = provider.track_for_url(&url).await {
                debug!(provider = provider.name(), %url, "track found");
                proxy.update_track(Some(track));
                return true;
            }
        }

        debug!(entity=%proxy.entity_id(), %url, "no provider knows this track");
        false
    }
}

impl std::fmt::Debug for ProxyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResolver")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amkmeta::{MemoryCollection, MemoryTrack, Track};

    fn collection() -> Arc<MemoryCollection> {
        let collection = MemoryCollection::new("Local");
        collection.insert(
            MemoryTrack::builder("file:///music/a.ogg".parse().unwrap())
                .title("Found")
                .artist("Band"),
        );
        Arc::new(collection)
    }

    #[tokio::test]
    async fn resolves_with_the_first_provider_that_knows_the_url() {
        let mut resolver = ProxyResolver::new();
        resolver.add(Arc::new(MemoryCollection::new("Empty")));
        resolver.add(collection());

        let proxy = ProxyTrack::new("file:///music/a.ogg".parse().unwrap());
        assert!(resolver.resolve(proxy.clone()).await.unwrap());
        assert!(proxy.is_resolved());
        assert_eq!(proxy.name(), "Found");
    }

    #[tokio::test]
    async fn unknown_urls_stay_unresolved() {
        let mut resolver = ProxyResolver::new();
        resolver.add(collection());

        let proxy = ProxyTrack::new("file:///music/other.ogg".parse().unwrap());
        assert!(!resolver.resolve_now(&proxy).await);
        assert!(!proxy.is_resolved());
    }
}
