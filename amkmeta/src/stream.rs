//! Network streams, whose metadata arrives late and changes while playing.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use crate::entity::{
    AlbumPtr, ArtistPtr, Base, ComposerPtr, EntityPtr, GenrePtr, Track, TrackPtr, YearPtr,
    entity_plumbing,
};
use crate::observer::Observable;

/// Metadata known before a stream starts playing, typically read from a
/// playlist entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitialInfo {
    pub artist: String,
    pub album: String,
    pub title: String,
    /// Milliseconds, 0 when unknown.
    pub length: i64,
    pub track_number: i32,
}

/// Tracks that can be seeded with [`InitialInfo`].
pub trait Stream: Send + Sync {
    fn set_initial_info(&self, info: InitialInfo);
}

#[derive(Clone, Debug, Default)]
struct StreamMeta {
    initial: InitialInfo,
    /// Title announced by the stream itself ("Artist - Title" in most cases).
    now_playing: Option<String>,
}

/// A track backed by a network stream.
pub struct StreamTrack {
    url: Url,
    meta: RwLock<StreamMeta>,
    observable: Observable,
    this: Weak<StreamTrack>,
}

impl StreamTrack {
    pub fn new(url: Url) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            url,
            meta: RwLock::new(StreamMeta::default()),
            observable: Observable::new(),
            this: this.clone(),
        })
    }

    pub fn initial_info(&self) -> InitialInfo {
        self.meta.read().initial.clone()
    }

    pub fn now_playing(&self) -> Option<String> {
        self.meta.read().now_playing.clone()
    }

    /// Records the title announced by the stream and notifies observers.
    pub fn update_now_playing(&self, title: impl Into<String>) {
        let title = title.into();
        debug!(url=%self.url, title=%title, "stream title changed");
        self.meta.write().now_playing = Some(title);
        self.notify();
    }

    fn notify(&self) {
        if let Some(this) = self.this.upgrade() {
            EntityPtr::Track(this).notify_observers();
        }
    }
}

impl Stream for StreamTrack {
    fn set_initial_info(&self, info: InitialInfo) {
        debug!(url=%self.url, title=%info.title, "stream seeded");
        self.meta.write().initial = info;
        self.notify();
    }
}

impl Base for StreamTrack {
    entity_plumbing!(Track);

    fn name(&self) -> String {
        let meta = self.meta.read();
        match &meta.now_playing {
            Some(title) => title.clone(),
            None => meta.initial.title.clone(),
        }
    }

    fn pretty_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            self.url.to_string()
        } else {
            name
        }
    }
}

impl Track for StreamTrack {
    fn playable_url(&self) -> Option<Url> {
        Some(self.url.clone())
    }

    fn pretty_url(&self) -> String {
        self.url.to_string()
    }

    fn uid_url(&self) -> String {
        self.url.to_string()
    }

    // Stream sub-entities are not tracked; the initial artist and album
    // only surface through `initial_info`.
    fn artist(&self) -> Option<ArtistPtr> {
        None
    }

    fn album(&self) -> Option<AlbumPtr> {
        None
    }

    fn genre(&self) -> Option<GenrePtr> {
        None
    }

    fn composer(&self) -> Option<ComposerPtr> {
        None
    }

    fn year(&self) -> Option<YearPtr> {
        None
    }

    fn length(&self) -> i64 {
        self.meta.read().initial.length
    }

    fn track_number(&self) -> i32 {
        self.meta.read().initial.track_number
    }

    fn disc_number(&self) -> i32 {
        0
    }

    fn file_type(&self) -> String {
        "stream".to_string()
    }

    fn as_stream(&self) -> Option<&dyn Stream> {
        Some(self)
    }
}

impl From<Arc<StreamTrack>> for EntityPtr {
    fn from(value: Arc<StreamTrack>) -> Self {
        EntityPtr::Track(value as TrackPtr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prefers_announced_title() {
        let stream = StreamTrack::new("http://radio.example/live".parse().unwrap());
        assert_eq!(stream.pretty_name(), "http://radio.example/live");

        stream.set_initial_info(InitialInfo {
            title: "Radio Example".into(),
            length: 0,
            ..Default::default()
        });
        assert_eq!(stream.name(), "Radio Example");

        stream.update_now_playing("Band - Song");
        assert_eq!(stream.name(), "Band - Song");
        assert_eq!(stream.initial_info().title, "Radio Example");
        assert_eq!(stream.file_type(), "stream");
    }
}
