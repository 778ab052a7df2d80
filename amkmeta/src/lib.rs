//! # amkmeta
//!
//! Metadata entities (tracks, artists, albums, genres, composers, years)
//! and the machinery around them:
//!
//! - [`observer`]: subscription of observers to entities and change
//!   notification fan-out
//! - [`capability`]: optional behaviours created on demand
//! - [`proxy`]: placeholder tracks resolved later by a [`TrackProvider`]
//! - [`memory`] and [`stream`]: concrete entities
//! - [`fields`]: field names and metadata hashes
//!
//! ## Example
//!
//! ```
//! use amkmeta::{Base, MemoryTrack, ProxyTrack, Track};
//!
//! let url: url::Url = "file:///music/song.flac".parse().unwrap();
//! let proxy = ProxyTrack::new(url.clone());
//! assert!(!proxy.is_resolved());
//! assert_eq!(proxy.pretty_name(), "song.flac");
//!
//! let real = MemoryTrack::builder(url).title("Song").artist("Band").build();
//! proxy.update_track(Some(real));
//! assert!(proxy.is_resolved());
//! assert_eq!(proxy.artist().unwrap().name(), "Band");
//! ```

pub mod capability;
pub mod entity;
pub mod fields;
pub mod memory;
pub mod observer;
pub mod provider;
pub mod proxy;
pub mod stream;

pub use capability::{
    Action, ActionsCapability, BookmarkThisCapability, BoundedPlaybackCapability, Capability,
    CapabilityDelegate, CapabilityExt, CapabilityInterface, CapabilityType, MultiSourceCapability,
    ReadLabelCapability, SourceInfoCapability,
};
pub use entity::{
    Album, AlbumPtr, Artist, ArtistPtr, Base, Composer, ComposerPtr, EntityKind, EntityPtr, Genre,
    GenrePtr, Track, TrackList, TrackPtr, Year, YearPtr, notify_observers, pretty_url,
    sortable_artist_name, url_file_name,
};
pub use fields::{Field, FieldMap, FieldValue, field_map};
pub use memory::{
    MemoryAlbum, MemoryArtist, MemoryCollection, MemoryComposer, MemoryGenre, MemoryTrack,
    MemoryTrackBuilder, MemoryYear,
};
pub use observer::{EntityId, Observable, Observer, ObserverExt, ObserverId, Subscriptions};
pub use provider::TrackProvider;
pub use proxy::{
    CachedFields, ProxyAlbum, ProxyArtist, ProxyComposer, ProxyGenre, ProxyTrack, ProxyYear,
};
pub use stream::{InitialInfo, Stream, StreamTrack};
