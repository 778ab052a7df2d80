//! Playlist reading: M3U, PLS, RAM, XSPF, ASX and SMIL.

use std::{collections::BTreeMap, fmt::Display, path::Path};

use amkmeta::CachedFields;
use quick_xml::{
    Reader,
    escape::resolve_predefined_entity,
    events::{BytesRef, BytesStart, Event},
};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::source::{Source, file_url};

/// Playlist formats the loader expands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Pls,
    /// RealAudio metafile: one stream URL per line.
    Ram,
    Xspf,
    /// Windows Media metafile (`asx`, `wax`).
    Asx,
    Smil,
}

impl PlaylistFormat {
    /// Format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "m3u" | "m3u8" => Some(PlaylistFormat::M3u),
            "pls" => Some(PlaylistFormat::Pls),
            "ram" => Some(PlaylistFormat::Ram),
            "xspf" => Some(PlaylistFormat::Xspf),
            "asx" | "wax" => Some(PlaylistFormat::Asx),
            "smil" | "smi" => Some(PlaylistFormat::Smil),
            _ => None,
        }
    }
}

/// One playlist line: where the track is and what the playlist says about it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistEntry {
    pub location: Url,
    pub cache: CachedFields,
}

/// Parses playlist `content`. Relative locations are resolved against
/// `base_dir`.
pub fn parse_playlist(
    content: &str,
    format: PlaylistFormat,
    base_dir: &Path,
) -> Result<Vec<PlaylistEntry>> {
    match format {
        PlaylistFormat::M3u => parse_m3u(content, base_dir),
        PlaylistFormat::Pls => parse_pls(content, base_dir),
        PlaylistFormat::Ram => parse_ram(content),
        PlaylistFormat::Xspf => parse_xspf(content, base_dir),
        PlaylistFormat::Asx => parse_asx(content, base_dir),
        PlaylistFormat::Smil => parse_smil(content, base_dir),
    }
}

/// Reads and parses the playlist file at `path`.
pub async fn load_playlist(path: &Path) -> Result<Vec<PlaylistEntry>> {
    let format = PlaylistFormat::from_path(path)
        .ok_or_else(|| Error::Unsupported(path.display().to_string()))?;
    let content = tokio::fs::read_to_string(path).await?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let entries = parse_playlist(&content, format, base_dir).map_err(|err| match err {
        Error::Playlist { reason, .. } => Error::Playlist {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })?;
    debug!(playlist=%path.display(), entries=entries.len(), "playlist read");
    Ok(entries)
}

fn invalid(base_dir: &Path, reason: impl Display) -> Error {
    Error::Playlist {
        path: base_dir.display().to_string(),
        reason: reason.to_string(),
    }
}

fn resolve_location(location: &str, base_dir: &Path) -> Result<Url> {
    match Source::parse(location) {
        Source::Url(url) => Ok(url),
        Source::Path(path) if path.is_absolute() => file_url(&path),
        Source::Path(path) => file_url(&base_dir.join(path)),
    }
}

/// `"Artist - Title"` as written by most players; anything else is a title.
fn split_display_title(display: &str) -> (String, String) {
    match display.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), display.trim().to_string()),
    }
}

/// Seconds as written in playlists; zero or negative means unknown.
fn seconds_to_ms(seconds: &str) -> i64 {
    match seconds.trim().parse::<i64>() {
        Ok(s) if s > 0 => s * 1000,
        _ => 0,
    }
}

fn parse_m3u(content: &str, base_dir: &Path) -> Result<Vec<PlaylistEntry>> {
    let mut entries = Vec::new();
    let mut pending = CachedFields::default();

    for line in content.lines() {
        let line = line.trim();
        if let Some(info) = line.strip_prefix("#EXTINF:") {
            let (length, display) = info.split_once(',').unwrap_or((info, ""));
            let (artist, title) = split_display_title(display);
            pending = CachedFields {
                artist,
                title,
                length: seconds_to_ms(length),
                ..CachedFields::default()
            };
        } else if !line.is_empty() && !line.starts_with('#') {
            entries.push(PlaylistEntry {
                location: resolve_location(line, base_dir)?,
                cache: std::mem::take(&mut pending),
            });
        }
    }
    Ok(entries)
}

#[derive(Default)]
struct PlsEntry {
    file: Option<String>,
    title: String,
    length: i64,
}

/// `File12` gives `("file", 12)`.
fn pls_key(key: &str) -> Option<(String, u32)> {
    let key = key.trim().to_ascii_lowercase();
    let pos = key.find(|c: char| c.is_ascii_digit())?;
    let (field, index) = key.split_at(pos);
    Some((field.to_string(), index.parse().ok()?))
}

fn parse_pls(content: &str, base_dir: &Path) -> Result<Vec<PlaylistEntry>> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    // Tout ce qui précède [playlist] est ignoré ; sans section, on lit tout
    let body = match lines
        .iter()
        .position(|l| l.eq_ignore_ascii_case("[playlist]"))
    {
        Some(pos) => &lines[pos + 1..],
        None => {
            debug!(playlist=%base_dir.display(), "pls without [playlist] section");
            &lines[..]
        }
    };

    let mut counted = 0u32;
    let mut declared = None;
    for line in body {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("numberofentries") {
            declared = value.trim().parse::<u32>().ok();
        } else if key.eq_ignore_ascii_case("version") {
            if value.trim() != "2" {
                warn!(version = value.trim(), "unsupported pls version");
            }
        } else if matches!(pls_key(key), Some((field, _)) if field == "file") {
            counted += 1;
        }
    }
    // Un NumberOfEntries faux est remplacé par le nombre de FileN lus
    if declared.is_some_and(|declared| declared != counted) {
        warn!(?declared, counted, "invalid NumberOfEntries in pls playlist");
    }
    let bound = counted;

    // Les entrées sont indexées (File1, Title1...) et peuvent arriver dans le désordre
    let mut numbered: BTreeMap<u32, PlsEntry> = BTreeMap::new();
    for line in body {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some((field, index)) = pls_key(key) else {
            continue;
        };
        if index == 0 || index > bound {
            continue;
        }
        let value = value.trim();
        let entry = numbered.entry(index).or_default();
        match field.as_str() {
            "file" => entry.file = Some(value.to_string()),
            "title" => entry.title = value.to_string(),
            "length" => entry.length = seconds_to_ms(value),
            _ => {}
        }
    }

    let mut entries = Vec::with_capacity(numbered.len());
    for (_, entry) in numbered {
        let Some(file) = entry.file else {
            continue;
        };
        let (artist, title) = split_display_title(&entry.title);
        entries.push(PlaylistEntry {
            location: resolve_location(&file, base_dir)?,
            cache: CachedFields {
                artist,
                title,
                length: entry.length,
                ..CachedFields::default()
            },
        });
    }
    Ok(entries)
}

const RAM_SCHEMES: [&str; 4] = ["rtsp://", "pnm://", "http://", "https://"];

fn parse_ram(content: &str) -> Result<Vec<PlaylistEntry>> {
    let mut entries = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        if line == "--stop--" {
            break;
        }
        if !RAM_SCHEMES.iter().any(|scheme| line.starts_with(scheme)) {
            continue;
        }
        match Url::parse(line) {
            Ok(location) => entries.push(PlaylistEntry {
                location,
                cache: CachedFields::default(),
            }),
            Err(err) => debug!(line, error=%err, "skipping ram line"),
        }
    }
    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct XspfDocument {
    #[serde(rename = "trackList", default)]
    track_list: XspfTrackList,
}

#[derive(Debug, Default, Deserialize)]
struct XspfTrackList {
    #[serde(rename = "track", default)]
    tracks: Vec<XspfTrack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XspfTrack {
    #[serde(rename = "location")]
    locations: Vec<String>,
    title: String,
    creator: String,
    album: String,
    /// Milliseconds.
    duration: String,
    #[serde(rename = "trackNum")]
    track_num: String,
}

fn parse_xspf(content: &str, base_dir: &Path) -> Result<Vec<PlaylistEntry>> {
    let document: XspfDocument =
        quick_xml::de::from_str(content).map_err(|err| invalid(base_dir, err))?;

    let mut entries = Vec::with_capacity(document.track_list.tracks.len());
    for track in document.track_list.tracks {
        // Plusieurs <location> possibles : la première fait foi
        let Some(location) = track.locations.iter().map(|l| l.trim()).find(|l| !l.is_empty())
        else {
            continue;
        };
        entries.push(PlaylistEntry {
            location: resolve_location(location, base_dir)?,
            cache: CachedFields {
                artist: track.creator.trim().to_string(),
                album: track.album.trim().to_string(),
                title: track.title.trim().to_string(),
                length: track.duration.trim().parse::<i64>().unwrap_or(0).max(0),
                track_number: track.track_num.trim().parse().unwrap_or(0),
                ..CachedFields::default()
            },
        });
    }
    Ok(entries)
}

/// Lowercase element or attribute name.
fn tag_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

/// Attribute value, the name compared without regard to case.
fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(name.as_bytes()))
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.trim().to_string())
}

/// `&amp;`, `&#233;` and the like.
fn entity_text(reference: &BytesRef<'_>) -> Option<String> {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        return Some(ch.to_string());
    }
    let name = reference.decode().ok()?;
    resolve_predefined_entity(&name).map(str::to_string)
}

/// `hh:mm:ss(.fff)`, `mm:ss` or plain seconds; anything else is unknown.
fn clock_to_ms(value: &str) -> i64 {
    let mut seconds = 0.0;
    for part in value.trim().split(':') {
        let Ok(n) = part.trim().parse::<f64>() else {
            return 0;
        };
        seconds = seconds * 60.0 + n;
    }
    if seconds > 0.0 {
        (seconds * 1000.0).round() as i64
    } else {
        0
    }
}

#[derive(Default)]
struct AsxEntry {
    href: Option<String>,
    title: String,
    author: String,
    length: i64,
}

impl AsxEntry {
    fn into_playlist_entry(self, base_dir: &Path) -> Result<Option<PlaylistEntry>> {
        let Some(href) = self.href.filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(PlaylistEntry {
            location: resolve_location(&href, base_dir)?,
            cache: CachedFields {
                artist: self.author.trim().to_string(),
                title: self.title.trim().to_string(),
                length: self.length,
                ..CachedFields::default()
            },
        }))
    }
}

fn parse_asx(content: &str, base_dir: &Path) -> Result<Vec<PlaylistEntry>> {
    let mut reader = Reader::from_str(content);
    // Les balises ASX ignorent la casse : <Title>...</title> est valide
    reader.config_mut().check_end_names = false;

    let mut entries = Vec::new();
    let mut root_seen = false;
    let mut current: Option<AsxEntry> = None;
    let mut text_tag: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|err| invalid(base_dir, err))?;
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));
                let name = tag_name(element.name().as_ref());
                if !root_seen {
                    if name != "asx" {
                        return Err(invalid(base_dir, "not an ASX document"));
                    }
                    root_seen = true;
                    continue;
                }
                match name.as_str() {
                    "entry" if is_start => current = Some(AsxEntry::default()),
                    "ref" => {
                        if let Some(entry) = current.as_mut() {
                            if entry.href.is_none() {
                                entry.href = attribute(element, "href");
                            }
                        }
                    }
                    "duration" => {
                        if let (Some(entry), Some(value)) =
                            (current.as_mut(), attribute(element, "value"))
                        {
                            entry.length = clock_to_ms(&value);
                        }
                    }
                    "title" | "author" if is_start => text_tag = Some(name),
                    _ => {}
                }
            }
            Event::Text(ref text) => {
                if let (Some(tag), Some(entry)) = (text_tag.as_deref(), current.as_mut()) {
                    let text = text.decode().map_err(|err| invalid(base_dir, err))?;
                    match tag {
                        "title" => entry.title.push_str(&text),
                        "author" => entry.author.push_str(&text),
                        _ => {}
                    }
                }
            }
            Event::GeneralRef(ref reference) => {
                if let (Some(tag), Some(entry), Some(text)) =
                    (text_tag.as_deref(), current.as_mut(), entity_text(reference))
                {
                    match tag {
                        "title" => entry.title.push_str(&text),
                        "author" => entry.author.push_str(&text),
                        _ => {}
                    }
                }
            }
            Event::End(ref element) => {
                text_tag = None;
                if tag_name(element.name().as_ref()) == "entry" {
                    if let Some(entry) = current.take() {
                        entries.extend(entry.into_playlist_entry(base_dir)?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(invalid(base_dir, "not an ASX document"));
    }
    Ok(entries)
}

fn parse_smil(content: &str, base_dir: &Path) -> Result<Vec<PlaylistEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().check_end_names = false;

    let mut entries = Vec::new();
    let mut root_seen = false;
    loop {
        match reader.read_event().map_err(|err| invalid(base_dir, err))? {
            Event::Start(element) | Event::Empty(element) => {
                let name = tag_name(element.name().as_ref());
                if !root_seen {
                    if name != "smil" {
                        return Err(invalid(base_dir, "not a SMIL document"));
                    }
                    root_seen = true;
                } else if name == "audio" {
                    if let Some(src) = attribute(&element, "src") {
                        entries.push(PlaylistEntry {
                            location: resolve_location(&src, base_dir)?,
                            cache: CachedFields::default(),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(invalid(base_dir, "not a SMIL document"));
    }
    Ok(entries)
}
