//! Placeholder tracks that stand in for a track not looked up yet.
//!
//! A [`ProxyTrack`] is created from a URL and, optionally, a few cached
//! fields (read from a playlist for instance). Its holders can display it,
//! subscribe to it and pass it around right away. Once a provider finds the
//! real track, [`ProxyTrack::update_track`] swaps it in: from then on every
//! accessor delegates to the real track, the cache is gone, and changes of
//! the real track are relayed to the proxy's own observers.

use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, warn};
use url::Url;

use crate::capability::{Capability, CapabilityType};
use crate::entity::{
    Album, AlbumPtr, Artist, ArtistPtr, Base, Composer, ComposerPtr, EntityPtr, Genre, GenrePtr,
    Track, TrackList, TrackPtr, Year, YearPtr, entity_plumbing, pretty_url, thin_ptr,
    url_file_name,
};
use crate::fields::{Field, FieldMap};
use crate::observer::{Observable, Observer, Subscriptions};
use crate::stream::InitialInfo;

/// Metadata known about a track before it is resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CachedFields {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub genre: String,
    pub composer: String,
    pub year: i32,
    /// Milliseconds.
    pub length: i64,
    pub bpm: f64,
    pub track_number: i32,
    pub disc_number: i32,
}

impl CachedFields {
    /// Reads the cacheable fields out of a metadata hash; missing or
    /// mistyped entries stay empty.
    pub fn from_field_map(fields: &FieldMap) -> Self {
        let text = |field| {
            fields
                .get(&field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let int = |field: Field| fields.get(&field).and_then(|v| v.as_i64()).unwrap_or(0);
        // Hors plage : considéré comme absent
        let small = |field: Field| i32::try_from(int(field)).unwrap_or(0);

        Self {
            artist: text(Field::Artist),
            album: text(Field::Album),
            title: text(Field::Title),
            genre: text(Field::Genre),
            composer: text(Field::Composer),
            year: small(Field::Year),
            length: int(Field::Length),
            bpm: fields
                .get(&Field::Bpm)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            track_number: small(Field::TrackNr),
            disc_number: small(Field::DiscNumber),
        }
    }

    fn initial_info(&self) -> InitialInfo {
        InitialInfo {
            artist: self.artist.clone(),
            album: self.album.clone(),
            title: self.title.clone(),
            length: self.length,
            track_number: self.track_number,
        }
    }
}

enum ProxyState {
    Unresolved { url: Url, cache: CachedFields },
    Resolved(TrackPtr),
}

/// State shared between the proxy and its sub-entities. It is also the
/// observer subscribed to the real track.
struct ProxyShared {
    proxy: Weak<ProxyTrack>,
    state: RwLock<ProxyState>,
    subscriptions: Subscriptions,
}

impl ProxyShared {
    /// Runs `resolved` on the real track (outside the lock), or
    /// `unresolved` on the cache.
    fn read<R>(
        &self,
        resolved: impl FnOnce(&TrackPtr) -> R,
        unresolved: impl FnOnce(&Url, &CachedFields) -> R,
    ) -> R {
        let real = match &*self.state.read() {
            ProxyState::Resolved(track) => track.clone(),
            ProxyState::Unresolved { url, cache } => return unresolved(url, cache),
        };
        resolved(&real)
    }

    fn real_track(&self) -> Option<TrackPtr> {
        match &*self.state.read() {
            ProxyState::Resolved(track) => Some(track.clone()),
            ProxyState::Unresolved { .. } => None,
        }
    }
}

impl Observer for ProxyShared {
    fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    fn track_changed(&self, _track: &TrackPtr) {
        if let Some(proxy) = self.proxy.upgrade() {
            EntityPtr::Track(proxy).notify_observers();
        }
    }
}

/// A track that forwards to its real track once one has been found.
pub struct ProxyTrack {
    d: Arc<ProxyShared>,
    observable: Observable,
    artist: Arc<ProxyArtist>,
    album: Arc<ProxyAlbum>,
    genre: Arc<ProxyGenre>,
    composer: Arc<ProxyComposer>,
    year: Arc<ProxyYear>,
}

impl ProxyTrack {
    pub fn new(url: Url) -> Arc<Self> {
        Self::with_cache(url, CachedFields::default())
    }

    pub fn with_cache(url: Url, cache: CachedFields) -> Arc<Self> {
        Arc::new_cyclic(|this| {
            let d = Arc::new(ProxyShared {
                proxy: this.clone(),
                state: RwLock::new(ProxyState::Unresolved { url, cache }),
                subscriptions: Subscriptions::new(),
            });
            let shared = Arc::downgrade(&d);
            ProxyTrack {
                artist: ProxyArtist::new(shared.clone()),
                album: ProxyAlbum::new(shared.clone()),
                genre: ProxyGenre::new(shared.clone()),
                composer: ProxyComposer::new(shared.clone()),
                year: ProxyYear::new(shared),
                d,
                observable: Observable::new(),
            }
        })
    }

    /// Proxy seeded from a metadata hash (see [`crate::field_map`]).
    pub fn from_fields(url: Url, fields: &FieldMap) -> Arc<Self> {
        Self::with_cache(url, CachedFields::from_field_map(fields))
    }

    /// URL the proxy was created for; `None` once resolved.
    pub fn url(&self) -> Option<Url> {
        match &*self.d.state.read() {
            ProxyState::Unresolved { url, .. } => Some(url.clone()),
            ProxyState::Resolved(_) => None,
        }
    }

    /// Snapshot of the cached fields; `None` once resolved.
    pub fn cached_fields(&self) -> Option<CachedFields> {
        match &*self.d.state.read() {
            ProxyState::Unresolved { cache, .. } => Some(cache.clone()),
            ProxyState::Resolved(_) => None,
        }
    }

    /// The track this proxy forwards to, if resolved.
    pub fn real_track(&self) -> Option<TrackPtr> {
        self.d.real_track()
    }

    /// Resolves the proxy with `track`.
    ///
    /// `None` does nothing. Streams receive the cached fields first; then
    /// the proxy subscribes to `track`, drops its cache and notifies its
    /// own observers. A proxy is resolved at most once: later calls are
    /// ignored.
    pub fn update_track(&self, track: Option<TrackPtr>) {
        let Some(track) = track else {
            return;
        };
        if thin_ptr(track.as_ref()) == thin_ptr(self) {
            warn!(entity=%self.entity_id(), "refusing to resolve a proxy with itself");
            return;
        }

        let state = self.d.state.upgradable_read();
        let cache = match &*state {
            ProxyState::Resolved(current) => {
                debug!(
                    entity=%self.entity_id(),
                    current=%current.uid_url(),
                    ignored=%track.uid_url(),
                    "proxy already resolved"
                );
                return;
            }
            ProxyState::Unresolved { cache, .. } => cache,
        };

        if let Some(stream) = track.as_stream() {
            stream.set_initial_info(cache.initial_info());
        }

        let observer: Arc<dyn Observer> = self.d.clone();
        track.observable().subscribe(&observer);

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        debug!(entity=%self.entity_id(), track=%track.uid_url(), "proxy resolved");
        *state = ProxyState::Resolved(track);
        drop(state);

        self.notify();
    }

    fn notify(&self) {
        if let Some(this) = self.d.proxy.upgrade() {
            EntityPtr::Track(this).notify_observers();
        }
    }
}

impl Base for ProxyTrack {
    entity_plumbing!(Track);

    fn name(&self) -> String {
        self.d.read(|t| t.name(), |_, c| c.title.clone())
    }

    fn pretty_name(&self) -> String {
        self.d.read(
            |t| t.pretty_name(),
            |url, c| {
                if c.title.is_empty() {
                    url_file_name(url)
                } else {
                    c.title.clone()
                }
            },
        )
    }

    fn sortable_name(&self) -> String {
        self.d.read(|t| t.sortable_name(), |_, c| c.title.clone())
    }

    fn has_capability_interface(&self, kind: CapabilityType) -> bool {
        self.d
            .real_track()
            .is_some_and(|t| t.has_capability_interface(kind))
    }

    fn create_capability_interface(&self, kind: CapabilityType) -> Option<Box<dyn Capability>> {
        self.d.real_track()?.create_capability_interface(kind)
    }
}

impl Track for ProxyTrack {
    fn playable_url(&self) -> Option<Url> {
        self.d.read(|t| t.playable_url(), |url, _| Some(url.clone()))
    }

    fn pretty_url(&self) -> String {
        self.d.read(|t| t.pretty_url(), |url, _| pretty_url(url))
    }

    fn uid_url(&self) -> String {
        self.d.read(|t| t.uid_url(), |url, _| url.to_string())
    }

    fn artist(&self) -> Option<ArtistPtr> {
        self.d
            .read(|t| t.artist(), |_, _| Some(self.artist.clone() as ArtistPtr))
    }

    fn album(&self) -> Option<AlbumPtr> {
        self.d
            .read(|t| t.album(), |_, _| Some(self.album.clone() as AlbumPtr))
    }

    fn genre(&self) -> Option<GenrePtr> {
        self.d
            .read(|t| t.genre(), |_, _| Some(self.genre.clone() as GenrePtr))
    }

    fn composer(&self) -> Option<ComposerPtr> {
        self.d
            .read(|t| t.composer(), |_, _| Some(self.composer.clone() as ComposerPtr))
    }

    fn year(&self) -> Option<YearPtr> {
        self.d
            .read(|t| t.year(), |_, _| Some(self.year.clone() as YearPtr))
    }

    fn comment(&self) -> String {
        self.d.read(|t| t.comment(), |_, _| String::new())
    }

    fn bpm(&self) -> f64 {
        self.d.read(|t| t.bpm(), |_, c| c.bpm)
    }

    fn length(&self) -> i64 {
        self.d.read(|t| t.length(), |_, c| c.length)
    }

    fn track_number(&self) -> i32 {
        self.d.read(|t| t.track_number(), |_, c| c.track_number)
    }

    fn disc_number(&self) -> i32 {
        self.d.read(|t| t.disc_number(), |_, c| c.disc_number)
    }

    fn sample_rate(&self) -> i32 {
        self.d.read(|t| t.sample_rate(), |_, _| 0)
    }

    fn bitrate(&self) -> i32 {
        self.d.read(|t| t.bitrate(), |_, _| 0)
    }

    fn filesize(&self) -> u64 {
        self.d.read(|t| t.filesize(), |_, _| 0)
    }

    fn file_type(&self) -> String {
        self.d.read(|t| t.file_type(), |_, _| String::new())
    }

    fn rating(&self) -> i32 {
        self.d.read(|t| t.rating(), |_, _| 0)
    }

    fn score(&self) -> f64 {
        self.d.read(|t| t.score(), |_, _| 0.0)
    }

    fn play_count(&self) -> u32 {
        self.d.read(|t| t.play_count(), |_, _| 0)
    }

    fn is_resolved(&self) -> bool {
        self.d.real_track().is_some()
    }

    fn equals(&self, other: &dyn Track) -> bool {
        if thin_ptr(self) == thin_ptr(other) {
            return true;
        }
        match self.d.real_track() {
            Some(real) => real.equals(other),
            None => false,
        }
    }
}

impl From<Arc<ProxyTrack>> for EntityPtr {
    fn from(value: Arc<ProxyTrack>) -> Self {
        EntityPtr::Track(value as TrackPtr)
    }
}

/// Generates a proxy sub-entity. `$real` picks the real sub-entity off the
/// real track, `$cached` builds the name from the cache.
macro_rules! proxy_entity {
    ($name:ident: $kind:ident, $ptr:ty, $real:expr, $cached:expr) => {
        pub struct $name {
            d: Weak<ProxyShared>,
            observable: Observable,
        }

        impl $name {
            fn new(d: Weak<ProxyShared>) -> Arc<Self> {
                Arc::new(Self {
                    d,
                    observable: Observable::new(),
                })
            }

            /// The real sub-entity; `None` while unresolved, when the real
            /// track has none, or once the owning proxy is gone.
            pub fn real(&self) -> Option<$ptr> {
                let real: fn(&TrackPtr) -> Option<$ptr> = $real;
                self.d.upgrade()?.real_track().as_ref().and_then(real)
            }

            fn cached_name(&self) -> String {
                let cached: fn(&CachedFields) -> String = $cached;
                match self.d.upgrade() {
                    Some(d) => d.read(|_| String::new(), |_, c| cached(c)),
                    None => String::new(),
                }
            }

            fn is_resolved(&self) -> bool {
                self.d.upgrade().is_some_and(|d| d.real_track().is_some())
            }
        }

        impl Base for $name {
            entity_plumbing!($kind);

            fn name(&self) -> String {
                if self.is_resolved() {
                    self.real().map(|e| e.name()).unwrap_or_default()
                } else {
                    self.cached_name()
                }
            }

            fn pretty_name(&self) -> String {
                if self.is_resolved() {
                    self.real().map(|e| e.pretty_name()).unwrap_or_default()
                } else {
                    self.cached_name()
                }
            }

            fn sortable_name(&self) -> String {
                match self.real() {
                    Some(e) => e.sortable_name(),
                    None => self.name(),
                }
            }

            fn has_capability_interface(&self, kind: CapabilityType) -> bool {
                self.real().is_some_and(|e| e.has_capability_interface(kind))
            }

            fn create_capability_interface(
                &self,
                kind: CapabilityType,
            ) -> Option<Box<dyn Capability>> {
                self.real()?.create_capability_interface(kind)
            }
        }

        impl $name {
            /// Equality through the real sub-entities when both sides have
            /// one, identity otherwise.
            fn proxy_equals(&self, other: &dyn $kind) -> bool {
                if thin_ptr(self) == thin_ptr(other) {
                    return true;
                }
                let Some(mine) = self.real() else {
                    return false;
                };
                match other.as_any().downcast_ref::<$name>() {
                    Some(proxy) => proxy.real().is_some_and(|theirs| mine.equals(theirs.as_ref())),
                    None => mine.equals(other),
                }
            }
        }
    };
}

proxy_entity!(
    ProxyArtist: Artist,
    ArtistPtr,
    |t| t.artist(),
    |c| c.artist.clone()
);
proxy_entity!(ProxyAlbum: Album, AlbumPtr, |t| t.album(), |c| c.album.clone());
proxy_entity!(ProxyGenre: Genre, GenrePtr, |t| t.genre(), |c| c.genre.clone());
proxy_entity!(
    ProxyComposer: Composer,
    ComposerPtr,
    |t| t.composer(),
    |c| c.composer.clone()
);
proxy_entity!(ProxyYear: Year, YearPtr, |t| t.year(), |c| {
    if c.year == 0 {
        String::new()
    } else {
        c.year.to_string()
    }
});

impl Artist for ProxyArtist {
    fn tracks(&self) -> TrackList {
        self.real().map(|e| e.tracks()).unwrap_or_default()
    }

    fn equals(&self, other: &dyn Artist) -> bool {
        self.proxy_equals(other)
    }
}

impl Album for ProxyAlbum {
    fn is_compilation(&self) -> bool {
        self.real().is_some_and(|e| e.is_compilation())
    }

    fn has_album_artist(&self) -> bool {
        self.real().is_some_and(|e| e.has_album_artist())
    }

    fn album_artist(&self) -> Option<ArtistPtr> {
        self.real()?.album_artist()
    }

    fn tracks(&self) -> TrackList {
        self.real().map(|e| e.tracks()).unwrap_or_default()
    }

    fn equals(&self, other: &dyn Album) -> bool {
        self.proxy_equals(other)
    }
}

impl Genre for ProxyGenre {
    fn tracks(&self) -> TrackList {
        self.real().map(|e| e.tracks()).unwrap_or_default()
    }

    fn equals(&self, other: &dyn Genre) -> bool {
        self.proxy_equals(other)
    }
}

impl Composer for ProxyComposer {
    fn tracks(&self) -> TrackList {
        self.real().map(|e| e.tracks()).unwrap_or_default()
    }

    fn equals(&self, other: &dyn Composer) -> bool {
        self.proxy_equals(other)
    }
}

impl Year for ProxyYear {
    fn tracks(&self) -> TrackList {
        self.real().map(|e| e.tracks()).unwrap_or_default()
    }

    fn equals(&self, other: &dyn Year) -> bool {
        self.proxy_equals(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldValue;

    #[test]
    fn cache_is_read_from_field_map() {
        let mut fields = FieldMap::new();
        fields.insert(Field::Title, "Roygbiv".into());
        fields.insert(Field::Artist, "Boards of Canada".into());
        fields.insert(Field::Year, FieldValue::Int(1998));
        fields.insert(Field::Length, FieldValue::Text("151000".into()));
        fields.insert(Field::TrackNr, FieldValue::Bool(true));

        let cache = CachedFields::from_field_map(&fields);
        assert_eq!(cache.title, "Roygbiv");
        assert_eq!(cache.artist, "Boards of Canada");
        assert_eq!(cache.year, 1998);
        assert_eq!(cache.length, 151_000);
        assert_eq!(cache.track_number, 0);
        assert_eq!(cache.album, "");
    }

    #[test]
    fn out_of_range_numbers_are_unset() {
        let mut fields = FieldMap::new();
        fields.insert(Field::Year, FieldValue::Int(i64::from(i32::MAX) + 1));
        fields.insert(Field::TrackNr, FieldValue::Int(-(1 << 40)));
        fields.insert(Field::DiscNumber, FieldValue::Int(2));
        fields.insert(Field::Length, FieldValue::Int(1 << 40));

        let cache = CachedFields::from_field_map(&fields);
        assert_eq!(cache.year, 0);
        assert_eq!(cache.track_number, 0);
        assert_eq!(cache.disc_number, 2);
        assert_eq!(cache.length, 1 << 40);
    }

    #[test]
    fn year_proxy_name_is_empty_when_unset() {
        let proxy = ProxyTrack::new("file:///a.ogg".parse().unwrap());
        assert_eq!(proxy.year().unwrap().name(), "");
        assert_eq!(proxy.year().unwrap().year(), 0);
    }
}
