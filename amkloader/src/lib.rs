//! # amkloader - Chargement de pistes depuis des URL, dossiers et playlists
//!
//! Cette crate transforme une liste de sources en une liste ordonnée de
//! pistes :
//! - Énumération des dossiers (récursive par défaut), triés dossiers d'abord
//! - Lecture des playlists M3U/EXTM3U, PLS, XSPF, ASX, SMIL et RAM, avec
//!   métadonnées pré-remplies
//! - Une [`amkmeta::ProxyTrack`] par piste, résolue par les
//!   [`amkmeta::TrackProvider`] enregistrés
//! - Attente bornée de la résolution complète (option `full_metadata_required`)
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use amkloader::{LoaderOptions, Source, TrackLoader};
//! use amkmeta::Base;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let loader = TrackLoader::new(LoaderOptions::default());
//! let tracks = loader
//!     .load(vec![
//!         Source::parse("/home/me/Music"),
//!         Source::parse("http://radio.example/live.pls"),
//!     ])
//!     .await;
//!
//! for track in &tracks {
//!     println!("{}", track.pretty_name());
//! }
//! # }
//! ```

mod discovery;
mod error;
mod loader;
mod playlist;
mod resolver;
mod source;

#[cfg(feature = "amkconfig")]
mod config_ext;

// Réexports publics
pub use discovery::{
    DEFAULT_AUDIO_EXTENSIONS, DEFAULT_PLAYLIST_EXTENSIONS, DirEntryInfo, directory_sensitive_cmp,
    has_extension, list_directory, locale_aware_cmp,
};
pub use error::{Error, Result};
pub use loader::{LoaderOptions, TrackLoader};
pub use playlist::{PlaylistEntry, PlaylistFormat, load_playlist, parse_playlist};
pub use resolver::ProxyResolver;
pub use source::{Source, file_url};

#[cfg(feature = "amkconfig")]
pub use config_ext::LoaderConfigExt;
