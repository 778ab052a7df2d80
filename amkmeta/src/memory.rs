//! In-memory entities and a small collection of them.
//!
//! These are the real tracks the rest of the crate is written against: a
//! [`MemoryTrack`] owns its metadata, notifies its observers from every
//! setter and shares artist, album, genre, composer and year objects with
//! the other tracks of its [`MemoryCollection`].

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use url::Url;

use crate::capability::{Capability, CapabilityDelegate, CapabilityType};
use crate::entity::{
    Album, AlbumPtr, Artist, ArtistPtr, Base, Composer, ComposerPtr, EntityPtr, Genre, GenrePtr,
    Track, TrackList, TrackPtr, Year, YearPtr, entity_plumbing, pretty_url, sortable_artist_name,
    url_file_name,
};
use crate::observer::Observable;
use crate::provider::TrackProvider;

/// Weak list of the tracks referring to an entity.
#[derive(Default)]
struct TrackRefs(Mutex<Vec<Weak<dyn Track>>>);

impl TrackRefs {
    fn add(&self, track: &TrackPtr) {
        let mut tracks = self.0.lock();
        tracks.retain(|t| t.strong_count() > 0);
        tracks.push(Arc::downgrade(track));
    }

    fn list(&self) -> TrackList {
        self.0.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

macro_rules! memory_entity {
    ($(#[$doc:meta])* $name:ident: $kind:ident) => {
        $(#[$doc])*
        pub struct $name {
            name: String,
            tracks: TrackRefs,
            observable: Observable,
        }

        impl $name {
            pub fn new(name: impl Into<String>) -> Arc<Self> {
                Arc::new(Self {
                    name: name.into(),
                    tracks: TrackRefs::default(),
                    observable: Observable::new(),
                })
            }
        }

        impl $kind for $name {
            fn tracks(&self) -> TrackList {
                self.tracks.list()
            }
        }
    };
}

memory_entity!(MemoryArtist: Artist);
memory_entity!(MemoryGenre: Genre);
memory_entity!(MemoryComposer: Composer);
memory_entity!(
    /// Year entity, named after the number ("1997").
    MemoryYear: Year
);

impl Base for MemoryArtist {
    entity_plumbing!(Artist);

    fn name(&self) -> String {
        self.name.clone()
    }

    fn sortable_name(&self) -> String {
        sortable_artist_name(&self.name)
    }
}

impl Base for MemoryGenre {
    entity_plumbing!(Genre);

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Base for MemoryComposer {
    entity_plumbing!(Composer);

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Base for MemoryYear {
    entity_plumbing!(Year);

    fn name(&self) -> String {
        self.name.clone()
    }
}

pub struct MemoryAlbum {
    name: String,
    album_artist: Option<ArtistPtr>,
    compilation: bool,
    tracks: TrackRefs,
    observable: Observable,
}

impl MemoryAlbum {
    pub fn new(name: impl Into<String>, album_artist: Option<ArtistPtr>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            album_artist,
            compilation: false,
            tracks: TrackRefs::default(),
            observable: Observable::new(),
        })
    }

    /// Album without album artist gathering tracks of various artists.
    pub fn compilation(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            album_artist: None,
            compilation: true,
            tracks: TrackRefs::default(),
            observable: Observable::new(),
        })
    }
}

impl Base for MemoryAlbum {
    entity_plumbing!(Album);

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Album for MemoryAlbum {
    fn is_compilation(&self) -> bool {
        self.compilation
    }

    fn album_artist(&self) -> Option<ArtistPtr> {
        self.album_artist.clone()
    }

    fn tracks(&self) -> TrackList {
        self.tracks.list()
    }
}

#[derive(Clone, Debug, Default)]
struct TrackData {
    title: String,
    comment: String,
    length: i64,
    track_number: i32,
    disc_number: i32,
    bpm: f64,
    sample_rate: i32,
    bitrate: i32,
    filesize: u64,
    file_type: String,
    rating: i32,
    score: f64,
    play_count: u32,
}

/// A track whose metadata lives in memory.
pub struct MemoryTrack {
    url: Url,
    data: RwLock<TrackData>,
    artist: Option<Arc<MemoryArtist>>,
    album: Option<Arc<MemoryAlbum>>,
    genre: Option<Arc<MemoryGenre>>,
    composer: Option<Arc<MemoryComposer>>,
    year: Option<Arc<MemoryYear>>,
    capabilities: CapabilityDelegate,
    observable: Observable,
    this: Weak<MemoryTrack>,
}

impl MemoryTrack {
    pub fn builder(url: Url) -> MemoryTrackBuilder {
        MemoryTrackBuilder::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.data.write().title = title.into();
        self.notify();
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        self.data.write().comment = comment.into();
        self.notify();
    }

    pub fn set_length(&self, length: i64) {
        self.data.write().length = length;
        self.notify();
    }

    /// Rating on a 0..=10 scale (half stars).
    pub fn set_rating(&self, rating: i32) {
        self.data.write().rating = rating.clamp(0, 10);
        self.notify();
    }

    pub fn set_score(&self, score: f64) {
        self.data.write().score = score;
        self.notify();
    }

    pub fn set_play_count(&self, play_count: u32) {
        self.data.write().play_count = play_count;
        self.notify();
    }

    /// Records one more playback.
    pub fn finished_playing(&self) {
        {
            let mut data = self.data.write();
            data.play_count = data.play_count.saturating_add(1);
        }
        self.notify();
    }

    fn notify(&self) {
        if let Some(this) = self.this.upgrade() {
            EntityPtr::Track(this).notify_observers();
        }
    }
}

impl Base for MemoryTrack {
    entity_plumbing!(Track);

    fn name(&self) -> String {
        self.data.read().title.clone()
    }

    fn pretty_name(&self) -> String {
        let title = self.name();
        if title.is_empty() {
            url_file_name(&self.url)
        } else {
            title
        }
    }

    fn has_capability_interface(&self, kind: CapabilityType) -> bool {
        self.capabilities.has(kind)
    }

    fn create_capability_interface(&self, kind: CapabilityType) -> Option<Box<dyn Capability>> {
        self.capabilities.create(kind)
    }
}

impl Track for MemoryTrack {
    fn playable_url(&self) -> Option<Url> {
        Some(self.url.clone())
    }

    fn pretty_url(&self) -> String {
        pretty_url(&self.url)
    }

    fn uid_url(&self) -> String {
        self.url.to_string()
    }

    fn artist(&self) -> Option<ArtistPtr> {
        self.artist.clone().map(|a| a as ArtistPtr)
    }

    fn album(&self) -> Option<AlbumPtr> {
        self.album.clone().map(|a| a as AlbumPtr)
    }

    fn genre(&self) -> Option<GenrePtr> {
        self.genre.clone().map(|g| g as GenrePtr)
    }

    fn composer(&self) -> Option<ComposerPtr> {
        self.composer.clone().map(|c| c as ComposerPtr)
    }

    fn year(&self) -> Option<YearPtr> {
        self.year.clone().map(|y| y as YearPtr)
    }

    fn comment(&self) -> String {
        self.data.read().comment.clone()
    }

    fn bpm(&self) -> f64 {
        self.data.read().bpm
    }

    fn length(&self) -> i64 {
        self.data.read().length
    }

    fn track_number(&self) -> i32 {
        self.data.read().track_number
    }

    fn disc_number(&self) -> i32 {
        self.data.read().disc_number
    }

    fn sample_rate(&self) -> i32 {
        self.data.read().sample_rate
    }

    fn bitrate(&self) -> i32 {
        self.data.read().bitrate
    }

    fn filesize(&self) -> u64 {
        self.data.read().filesize
    }

    fn file_type(&self) -> String {
        let data = self.data.read();
        if data.file_type.is_empty() {
            url_file_name(&self.url)
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default()
        } else {
            data.file_type.clone()
        }
    }

    fn rating(&self) -> i32 {
        self.data.read().rating
    }

    fn score(&self) -> f64 {
        self.data.read().score
    }

    fn play_count(&self) -> u32 {
        self.data.read().play_count
    }
}

impl From<Arc<MemoryTrack>> for EntityPtr {
    fn from(value: Arc<MemoryTrack>) -> Self {
        EntityPtr::Track(value as TrackPtr)
    }
}

/// Builder for [`MemoryTrack`].
///
/// Sub-entities given by name are created fresh; use the `with_*` methods
/// (or a [`MemoryCollection`]) to share them between tracks.
pub struct MemoryTrackBuilder {
    url: Url,
    data: TrackData,
    artist_name: Option<String>,
    album_name: Option<String>,
    album_artist_name: Option<String>,
    genre_name: Option<String>,
    composer_name: Option<String>,
    year: Option<i32>,
    artist: Option<Arc<MemoryArtist>>,
    album: Option<Arc<MemoryAlbum>>,
    genre: Option<Arc<MemoryGenre>>,
    composer: Option<Arc<MemoryComposer>>,
    year_entity: Option<Arc<MemoryYear>>,
    capabilities: CapabilityDelegate,
}

macro_rules! builder_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $ty) -> Self {
                self.data.$field = $field;
                self
            }
        )*
    };
}

impl MemoryTrackBuilder {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            data: TrackData::default(),
            artist_name: None,
            album_name: None,
            album_artist_name: None,
            genre_name: None,
            composer_name: None,
            year: None,
            artist: None,
            album: None,
            genre: None,
            composer: None,
            year_entity: None,
            capabilities: CapabilityDelegate::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.data.title = title.into();
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.data.comment = comment.into();
        self
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.data.file_type = file_type.into();
        self
    }

    builder_setters!(
        length: i64,
        track_number: i32,
        disc_number: i32,
        bpm: f64,
        sample_rate: i32,
        bitrate: i32,
        filesize: u64,
        rating: i32,
        score: f64,
        play_count: u32,
    );

    pub fn artist(mut self, name: impl Into<String>) -> Self {
        self.artist_name = Some(name.into());
        self
    }

    pub fn album(mut self, name: impl Into<String>) -> Self {
        self.album_name = Some(name.into());
        self
    }

    pub fn album_artist(mut self, name: impl Into<String>) -> Self {
        self.album_artist_name = Some(name.into());
        self
    }

    pub fn genre(mut self, name: impl Into<String>) -> Self {
        self.genre_name = Some(name.into());
        self
    }

    pub fn composer(mut self, name: impl Into<String>) -> Self {
        self.composer_name = Some(name.into());
        self
    }

    /// Sets the year; 0 means unknown.
    pub fn year(mut self, year: i32) -> Self {
        self.year = (year != 0).then_some(year);
        self
    }

    pub fn with_artist(mut self, artist: Arc<MemoryArtist>) -> Self {
        self.artist = Some(artist);
        self
    }

    pub fn with_album(mut self, album: Arc<MemoryAlbum>) -> Self {
        self.album = Some(album);
        self
    }

    pub fn with_genre(mut self, genre: Arc<MemoryGenre>) -> Self {
        self.genre = Some(genre);
        self
    }

    pub fn with_composer(mut self, composer: Arc<MemoryComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn with_year(mut self, year: Arc<MemoryYear>) -> Self {
        self.year_entity = Some(year);
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilityDelegate) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn build(self) -> Arc<MemoryTrack> {
        let artist = self.artist.or_else(|| self.artist_name.map(MemoryArtist::new));
        let album = self.album.or_else(|| {
            self.album_name.map(|name| {
                let album_artist = self
                    .album_artist_name
                    .map(|n| MemoryArtist::new(n) as ArtistPtr);
                MemoryAlbum::new(name, album_artist)
            })
        });
        let genre = self.genre.or_else(|| self.genre_name.map(MemoryGenre::new));
        let composer = self
            .composer
            .or_else(|| self.composer_name.map(MemoryComposer::new));
        let year = self
            .year_entity
            .or_else(|| self.year.map(|y| MemoryYear::new(y.to_string())));

        let track = Arc::new_cyclic(|this| MemoryTrack {
            url: self.url,
            data: RwLock::new(self.data),
            artist,
            album,
            genre,
            composer,
            year,
            capabilities: self.capabilities,
            observable: Observable::new(),
            this: this.clone(),
        });

        let as_track: TrackPtr = track.clone();
        if let Some(artist) = &track.artist {
            artist.tracks.add(&as_track);
        }
        if let Some(album) = &track.album {
            album.tracks.add(&as_track);
        }
        if let Some(genre) = &track.genre {
            genre.tracks.add(&as_track);
        }
        if let Some(composer) = &track.composer {
            composer.tracks.add(&as_track);
        }
        if let Some(year) = &track.year {
            year.tracks.add(&as_track);
        }
        track
    }
}

#[derive(Default)]
struct Index {
    tracks: HashMap<String, Arc<MemoryTrack>>,
    artists: HashMap<String, Arc<MemoryArtist>>,
    albums: HashMap<(String, String), Arc<MemoryAlbum>>,
    genres: HashMap<String, Arc<MemoryGenre>>,
    composers: HashMap<String, Arc<MemoryComposer>>,
    years: HashMap<i32, Arc<MemoryYear>>,
}

/// Tracks indexed by URL, sharing sub-entities by name.
#[derive(Default)]
pub struct MemoryCollection {
    name: String,
    index: RwLock<Index>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: RwLock::new(Index::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the track, reusing this collection's artist, album, genre,
    /// composer and year objects, and stores it under its URL.
    pub fn insert(&self, mut builder: MemoryTrackBuilder) -> Arc<MemoryTrack> {
        let mut index = self.index.write();

        if builder.artist.is_none() {
            if let Some(name) = builder.artist_name.take() {
                builder.artist = Some(
                    index
                        .artists
                        .entry(name.clone())
                        .or_insert_with(|| MemoryArtist::new(name))
                        .clone(),
                );
            }
        }

        if builder.album.is_none() {
            if let Some(name) = builder.album_name.take() {
                let album_artist_name = builder.album_artist_name.take().unwrap_or_default();
                let album_artist = (!album_artist_name.is_empty()).then(|| {
                    index
                        .artists
                        .entry(album_artist_name.clone())
                        .or_insert_with(|| MemoryArtist::new(album_artist_name.clone()))
                        .clone() as ArtistPtr
                });
                builder.album = Some(
                    index
                        .albums
                        .entry((name.clone(), album_artist_name))
                        .or_insert_with(|| MemoryAlbum::new(name, album_artist))
                        .clone(),
                );
            }
        }

        if builder.genre.is_none() {
            if let Some(name) = builder.genre_name.take() {
                builder.genre = Some(
                    index
                        .genres
                        .entry(name.clone())
                        .or_insert_with(|| MemoryGenre::new(name))
                        .clone(),
                );
            }
        }

        if builder.composer.is_none() {
            if let Some(name) = builder.composer_name.take() {
                builder.composer = Some(
                    index
                        .composers
                        .entry(name.clone())
                        .or_insert_with(|| MemoryComposer::new(name))
                        .clone(),
                );
            }
        }

        if builder.year_entity.is_none() {
            if let Some(year) = builder.year.take() {
                builder.year_entity = Some(
                    index
                        .years
                        .entry(year)
                        .or_insert_with(|| MemoryYear::new(year.to_string()))
                        .clone(),
                );
            }
        }

        let track = builder.build();
        debug!(collection=%self.name, url=%track.url, "track added");
        index.tracks.insert(track.uid_url(), track.clone());
        track
    }

    pub fn track(&self, url: &Url) -> Option<Arc<MemoryTrack>> {
        self.index.read().tracks.get(url.as_str()).cloned()
    }

    pub fn artist(&self, name: &str) -> Option<Arc<MemoryArtist>> {
        self.index.read().artists.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.index.read().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().tracks.is_empty()
    }
}

#[async_trait]
impl TrackProvider for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn possibly_contains_track(&self, url: &Url) -> bool {
        self.index.read().tracks.contains_key(url.as_str())
    }

    async fn track_for_url(&self, url: &Url) -> Option<TrackPtr> {
        self.track(url).map(|track| track as TrackPtr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("file://{path}")).unwrap()
    }

    #[test]
    fn builder_fills_every_field() {
        let track = MemoryTrack::builder(url("/music/abba/waterloo.mp3"))
            .title("Waterloo")
            .artist("ABBA")
            .album("Waterloo")
            .album_artist("ABBA")
            .genre("Pop")
            .composer("Benny Andersson")
            .year(1974)
            .length(168_000)
            .track_number(1)
            .disc_number(1)
            .build();

        assert_eq!(track.name(), "Waterloo");
        assert_eq!(track.artist().unwrap().name(), "ABBA");
        assert!(track.album().unwrap().has_album_artist());
        assert_eq!(track.year().unwrap().year(), 1974);
        assert_eq!(track.length(), 168_000);
        assert_eq!(track.file_type(), "mp3");
        assert_eq!(track.artist().unwrap().tracks().len(), 1);
    }

    #[test]
    fn untitled_track_is_named_after_its_file() {
        let track = MemoryTrack::builder(url("/music/untitled.ogg")).build();
        assert_eq!(track.name(), "");
        assert_eq!(track.pretty_name(), "untitled.ogg");
        assert!(track.artist().is_none());
    }

    #[test]
    fn collection_shares_sub_entities() {
        let collection = MemoryCollection::new("local");
        let a = collection.insert(
            MemoryTrack::builder(url("/music/1.ogg"))
                .artist("The Band")
                .album("Music from Big Pink"),
        );
        let b = collection.insert(
            MemoryTrack::builder(url("/music/2.ogg"))
                .artist("The Band")
                .album("Music from Big Pink"),
        );

        let artist_a = a.artist().unwrap();
        let artist_b = b.artist().unwrap();
        assert!(*artist_a == *artist_b);
        assert_eq!(artist_a.tracks().len(), 2);
        assert_eq!(artist_a.sortable_name(), "Band, The");
        assert!(*a.album().unwrap() == *b.album().unwrap());
        assert_eq!(collection.len(), 2);
        assert!(collection.track(&url("/music/2.ogg")).is_some());
    }

    #[test]
    fn rating_is_clamped() {
        let track = MemoryTrack::builder(url("/music/x.ogg")).build();
        track.set_rating(14);
        assert_eq!(track.rating(), 10);
        track.finished_playing();
        track.finished_playing();
        assert_eq!(track.play_count(), 2);
    }

    #[test]
    fn collection_answers_track_lookups() {
        let collection = MemoryCollection::new("local");
        collection.insert(MemoryTrack::builder(url("/music/known.ogg")).title("Known"));

        let known = url("/music/known.ogg");
        let unknown = url("/music/unknown.ogg");
        assert!(collection.possibly_contains_track(&known));
        assert!(!collection.possibly_contains_track(&unknown));

        let found = tokio_test::block_on(collection.track_for_url(&known)).unwrap();
        assert_eq!(found.name(), "Known");
        assert!(tokio_test::block_on(collection.track_for_url(&unknown)).is_none());
    }
}
