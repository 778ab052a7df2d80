//! Track field identifiers and the metadata hash built from them.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::entity::{Album, Base, Track, Year};

/// A track metadata field, with a stable lowercase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    #[serde(rename = "filename")]
    Url,
    Title,
    Artist,
    Album,
    Genre,
    Composer,
    Year,
    Comment,
    TrackNr,
    DiscNumber,
    Bpm,
    Length,
    Bitrate,
    SampleRate,
    Filesize,
    Format,
    Added,
    Score,
    Rating,
    FirstPlay,
    LastPlay,
    PlayCount,
    UniqueId,
    TrackGain,
    TrackGainPeak,
    AlbumGain,
    AlbumGainPeak,
    AlbumArtist,
    Label,
    Modified,
    Lyrics,
}

impl Field {
    pub const ALL: [Field; 31] = [
        Field::Url,
        Field::Title,
        Field::Artist,
        Field::Album,
        Field::Genre,
        Field::Composer,
        Field::Year,
        Field::Comment,
        Field::TrackNr,
        Field::DiscNumber,
        Field::Bpm,
        Field::Length,
        Field::Bitrate,
        Field::SampleRate,
        Field::Filesize,
        Field::Format,
        Field::Added,
        Field::Score,
        Field::Rating,
        Field::FirstPlay,
        Field::LastPlay,
        Field::PlayCount,
        Field::UniqueId,
        Field::TrackGain,
        Field::TrackGainPeak,
        Field::AlbumGain,
        Field::AlbumGainPeak,
        Field::AlbumArtist,
        Field::Label,
        Field::Modified,
        Field::Lyrics,
    ];

    /// Stable name, used in queries and serialized maps.
    pub fn name(self) -> &'static str {
        match self {
            Field::Url => "filename",
            Field::Title => "title",
            Field::Artist => "artist",
            Field::Album => "album",
            Field::Genre => "genre",
            Field::Composer => "composer",
            Field::Year => "year",
            Field::Comment => "comment",
            Field::TrackNr => "tracknr",
            Field::DiscNumber => "discnumber",
            Field::Bpm => "bpm",
            Field::Length => "length",
            Field::Bitrate => "bitrate",
            Field::SampleRate => "samplerate",
            Field::Filesize => "filesize",
            Field::Format => "format",
            Field::Added => "added",
            Field::Score => "score",
            Field::Rating => "rating",
            Field::FirstPlay => "firstplay",
            Field::LastPlay => "lastplay",
            Field::PlayCount => "playcount",
            Field::UniqueId => "uniqueid",
            Field::TrackGain => "trackgain",
            Field::TrackGainPeak => "trackgainpeak",
            Field::AlbumGain => "albumgain",
            Field::AlbumGainPeak => "albumgainpeak",
            Field::AlbumArtist => "albumartist",
            Field::Label => "label",
            Field::Modified => "modified",
            Field::Lyrics => "lyrics",
        }
    }

    /// Case-insensitive lookup by name. Legacy names (`codec`, `first`,
    /// `played`, `tracknumber`) are accepted too.
    pub fn from_name(name: &str) -> Option<Field> {
        let name = name.to_ascii_lowercase();
        let legacy = match name.as_str() {
            "codec" => Some(Field::Format),
            "first" => Some(Field::FirstPlay),
            "played" => Some(Field::LastPlay),
            "tracknumber" => Some(Field::TrackNr),
            _ => None,
        };
        legacy.or_else(|| Field::ALL.into_iter().find(|f| f.name() == name))
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Field::Url => "File Name",
            Field::Title => "Title",
            Field::Artist => "Artist",
            Field::Album => "Album",
            Field::Genre => "Genre",
            Field::Composer => "Composer",
            Field::Year => "Year",
            Field::Comment => "Comment",
            Field::TrackNr => "Track Number",
            Field::DiscNumber => "Disc Number",
            Field::Bpm => "Bpm",
            Field::Length => "Length",
            Field::Bitrate => "Bit Rate",
            Field::SampleRate => "Sample Rate",
            Field::Filesize => "File Size",
            Field::Format => "Format",
            Field::Added => "Added to Collection",
            Field::Score => "Score",
            Field::Rating => "Rating",
            Field::FirstPlay => "First Played",
            Field::LastPlay => "Last Played",
            Field::PlayCount => "Playcount",
            Field::UniqueId => "Unique Id",
            Field::TrackGain => "Track Gain",
            Field::TrackGainPeak => "Track Gain Peak",
            Field::AlbumGain => "Album Gain",
            Field::AlbumGainPeak => "Album Gain Peak",
            Field::AlbumArtist => "Album Artist",
            Field::Label => "Label",
            Field::Modified => "Last Modified",
            Field::Lyrics => "Lyrics",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::from_name(s).ok_or_else(|| format!("unknown field '{s}'"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; reals are truncated and numeric text is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Real(r) => Some(*r as i64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Real(r) => Some(*r),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

pub type FieldMap = BTreeMap<Field, FieldValue>;

/// Metadata hash of `track`; empty strings and zero numbers are left out.
pub fn field_map(track: &dyn Track) -> FieldMap {
    let mut map = FieldMap::new();

    let mut text = |field: Field, value: String| {
        if !value.is_empty() {
            map.insert(field, FieldValue::Text(value));
        }
    };
    if let Some(url) = track.playable_url() {
        text(Field::Url, url.to_string());
    }
    text(Field::Title, track.name());
    text(Field::Artist, track.artist().map(|a| a.name()).unwrap_or_default());
    text(Field::Album, track.album().map(|a| a.name()).unwrap_or_default());
    text(
        Field::AlbumArtist,
        track
            .album()
            .and_then(|a| a.album_artist())
            .map(|a| a.name())
            .unwrap_or_default(),
    );
    text(Field::Genre, track.genre().map(|g| g.name()).unwrap_or_default());
    text(Field::Composer, track.composer().map(|c| c.name()).unwrap_or_default());
    text(Field::Comment, track.comment());
    text(Field::Format, track.file_type());
    text(Field::UniqueId, track.uid_url());

    let mut number = |field: Field, value: i64| {
        if value != 0 {
            map.insert(field, FieldValue::Int(value));
        }
    };
    number(Field::Year, track.year().map(|y| i64::from(y.year())).unwrap_or(0));
    number(Field::TrackNr, track.track_number().into());
    number(Field::DiscNumber, track.disc_number().into());
    number(Field::Length, track.length());
    number(Field::Bitrate, track.bitrate().into());
    number(Field::SampleRate, track.sample_rate().into());
    number(Field::Filesize, track.filesize().try_into().unwrap_or(i64::MAX));
    number(Field::Rating, track.rating().into());
    number(Field::PlayCount, track.play_count().into());

    if track.bpm() > 0.0 {
        map.insert(Field::Bpm, FieldValue::Real(track.bpm()));
    }
    if track.score() > 0.0 {
        map.insert(Field::Score, FieldValue::Real(track.score()));
    }
    map
}
