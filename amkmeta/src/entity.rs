//! Entity traits: tracks and the artists, albums, genres, composers and
//! years they refer to.
//!
//! Entities are shared through [`Arc`] trait objects ([`TrackPtr`],
//! [`ArtistPtr`], ...). Every entity embeds an [`Observable`] and exposes it
//! through [`Base::observable`]; call [`EntityPtr::notify_observers`] (or the
//! concrete type's setters, which do it for you) after a mutation.

use std::{any::Any, fmt, sync::Arc};

use url::Url;

use crate::capability::{Capability, CapabilityType};
use crate::observer::{EntityId, Observable};
use crate::stream::Stream;

pub type TrackPtr = Arc<dyn Track>;
pub type ArtistPtr = Arc<dyn Artist>;
pub type AlbumPtr = Arc<dyn Album>;
pub type GenrePtr = Arc<dyn Genre>;
pub type ComposerPtr = Arc<dyn Composer>;
pub type YearPtr = Arc<dyn Year>;

pub type TrackList = Vec<TrackPtr>;

/// Kind of an entity, used for display fallbacks and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Track,
    Artist,
    Album,
    Genre,
    Composer,
    Year,
}

impl EntityKind {
    /// Display name used when an entity has no name of its own.
    pub fn unknown_label(self) -> &'static str {
        match self {
            EntityKind::Track => "Unknown Track",
            EntityKind::Artist => "Unknown Artist",
            EntityKind::Album => "Unknown Album",
            EntityKind::Genre => "Unknown Genre",
            EntityKind::Composer => "Unknown Composer",
            EntityKind::Year => "Unknown Year",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Track => "track",
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Genre => "genre",
            EntityKind::Composer => "composer",
            EntityKind::Year => "year",
        };
        f.write_str(name)
    }
}

/// Root of every metadata entity.
pub trait Base: Send + Sync + 'static {
    fn kind(&self) -> EntityKind;

    /// Raw name, possibly empty.
    fn name(&self) -> String;

    /// Name for display, never empty.
    fn pretty_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            self.kind().unknown_label().to_string()
        } else {
            name
        }
    }

    fn sortable_name(&self) -> String {
        self.name()
    }

    fn observable(&self) -> &Observable;

    fn as_any(&self) -> &dyn Any;

    /// Whether [`Base::create_capability_interface`] can build `kind`.
    ///
    /// Callers normally go through [`CapabilityExt`](crate::CapabilityExt).
    fn has_capability_interface(&self, _kind: CapabilityType) -> bool {
        false
    }

    /// Builds a fresh capability object; the caller owns it.
    fn create_capability_interface(&self, _kind: CapabilityType) -> Option<Box<dyn Capability>> {
        None
    }

    fn entity_id(&self) -> EntityId {
        self.observable().id()
    }
}

/// Address of the object behind a reference, without the vtable.
pub(crate) fn thin_ptr<T: ?Sized>(value: &T) -> *const () {
    (value as *const T).cast::<()>()
}

pub trait Track: Base {
    /// Url the engine can play, if any.
    fn playable_url(&self) -> Option<Url>;

    /// Location shown to the user.
    fn pretty_url(&self) -> String;

    /// Unique key for this track.
    fn uid_url(&self) -> String;

    fn artist(&self) -> Option<ArtistPtr>;

    fn album(&self) -> Option<AlbumPtr>;

    fn genre(&self) -> Option<GenrePtr>;

    fn composer(&self) -> Option<ComposerPtr>;

    fn year(&self) -> Option<YearPtr>;

    fn comment(&self) -> String {
        String::new()
    }

    fn bpm(&self) -> f64 {
        0.0
    }

    /// Length in milliseconds, 0 when unknown.
    fn length(&self) -> i64;

    fn track_number(&self) -> i32;

    fn disc_number(&self) -> i32;

    fn sample_rate(&self) -> i32 {
        0
    }

    /// Bitrate in kbit/s.
    fn bitrate(&self) -> i32 {
        0
    }

    fn filesize(&self) -> u64 {
        0
    }

    /// File type such as "ogg", "mp3" or "stream".
    fn file_type(&self) -> String {
        String::new()
    }

    fn rating(&self) -> i32 {
        0
    }

    fn score(&self) -> f64 {
        0.0
    }

    fn play_count(&self) -> u32 {
        0
    }

    /// False while the track is a placeholder waiting for its real object.
    fn is_resolved(&self) -> bool {
        true
    }

    /// Streams accept initial metadata before they are played.
    fn as_stream(&self) -> Option<&dyn Stream> {
        None
    }

    fn equals(&self, other: &dyn Track) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

pub trait Artist: Base {
    fn tracks(&self) -> TrackList {
        Vec::new()
    }

    fn equals(&self, other: &dyn Artist) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

/// Sort key for artist names: "The Beatles" becomes "Beatles, The".
pub fn sortable_artist_name(name: &str) -> String {
    match name.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("the ") && name.len() > 4 => {
            format!("{}, {}", &name[4..], &name[..3])
        }
        _ => name.to_string(),
    }
}

pub trait Album: Base {
    /// Whether the album gathers tracks of various artists.
    fn is_compilation(&self) -> bool {
        false
    }

    fn has_album_artist(&self) -> bool {
        self.album_artist().is_some()
    }

    fn album_artist(&self) -> Option<ArtistPtr> {
        None
    }

    fn tracks(&self) -> TrackList {
        Vec::new()
    }

    fn equals(&self, other: &dyn Album) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

pub trait Genre: Base {
    fn tracks(&self) -> TrackList {
        Vec::new()
    }

    fn equals(&self, other: &dyn Genre) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

pub trait Composer: Base {
    fn tracks(&self) -> TrackList {
        Vec::new()
    }

    fn equals(&self, other: &dyn Composer) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

pub trait Year: Base {
    /// Numeric year, 0 when unset.
    fn year(&self) -> i32 {
        self.name().trim().parse().unwrap_or(0)
    }

    fn tracks(&self) -> TrackList {
        Vec::new()
    }

    fn equals(&self, other: &dyn Year) -> bool {
        thin_ptr(self) == thin_ptr(other)
    }
}

macro_rules! impl_dyn_eq {
    ($($kind:ident),*) => {
        $(
            impl PartialEq for dyn $kind {
                fn eq(&self, other: &Self) -> bool {
                    self.equals(other)
                }
            }

            impl fmt::Debug for dyn $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($kind))
                        .field("id", &self.entity_id())
                        .field("name", &self.name())
                        .finish()
                }
            }
        )*
    };
}

impl_dyn_eq!(Track, Artist, Album, Genre, Composer, Year);

/// Strong reference to an entity of any kind.
#[derive(Clone, Debug)]
pub enum EntityPtr {
    Track(TrackPtr),
    Artist(ArtistPtr),
    Album(AlbumPtr),
    Genre(GenrePtr),
    Composer(ComposerPtr),
    Year(YearPtr),
}

macro_rules! with_entity {
    ($ptr:expr, $entity:ident => $body:expr) => {
        match $ptr {
            EntityPtr::Track($entity) => $body,
            EntityPtr::Artist($entity) => $body,
            EntityPtr::Album($entity) => $body,
            EntityPtr::Genre($entity) => $body,
            EntityPtr::Composer($entity) => $body,
            EntityPtr::Year($entity) => $body,
        }
    };
}

impl EntityPtr {
    pub fn kind(&self) -> EntityKind {
        with_entity!(self, entity => entity.kind())
    }

    pub fn id(&self) -> EntityId {
        with_entity!(self, entity => entity.entity_id())
    }

    pub fn name(&self) -> String {
        with_entity!(self, entity => entity.name())
    }

    pub fn pretty_name(&self) -> String {
        with_entity!(self, entity => entity.pretty_name())
    }

    pub fn observable(&self) -> &Observable {
        with_entity!(self, entity => entity.observable())
    }

    /// Tells every observer of the entity that its metadata changed.
    pub fn notify_observers(&self) {
        self.observable().notify(self);
    }

    pub fn as_track(&self) -> Option<&TrackPtr> {
        match self {
            EntityPtr::Track(track) => Some(track),
            _ => None,
        }
    }
}

macro_rules! impl_entity_from {
    ($($variant:ident => $ptr:ty),*) => {
        $(
            impl From<$ptr> for EntityPtr {
                fn from(value: $ptr) -> Self {
                    EntityPtr::$variant(value)
                }
            }
        )*
    };
}

impl_entity_from!(
    Track => TrackPtr,
    Artist => ArtistPtr,
    Album => AlbumPtr,
    Genre => GenrePtr,
    Composer => ComposerPtr,
    Year => YearPtr
);

/// Notifies the observers of any entity handle.
pub fn notify_observers(entity: impl Into<EntityPtr>) {
    entity.into().notify_observers();
}

/// Generates the [`Base`] plumbing shared by every concrete entity: kind,
/// observable access and `Any` conversion. The type needs an
/// `observable: Observable` field.
macro_rules! entity_plumbing {
    ($kind:ident) => {
        fn kind(&self) -> $crate::entity::EntityKind {
            $crate::entity::EntityKind::$kind
        }

        fn observable(&self) -> &$crate::observer::Observable {
            &self.observable
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }
    };
}

pub(crate) use entity_plumbing;

/// Location for display: a local path for `file` URLs, the URL otherwise.
pub fn pretty_url(url: &Url) -> String {
    match url.to_file_path() {
        Ok(path) if url.scheme() == "file" => path.display().to_string(),
        _ => url.to_string(),
    }
}

/// Last path component of `url`, empty when there is none.
pub fn url_file_name(url: &Url) -> String {
    if url.scheme() == "file" {
        if let Some(name) = url.to_file_path().ok().and_then(|p| p.file_name().map(|n| n.to_owned())) {
            return name.to_string_lossy().into_owned();
        }
    }
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}
