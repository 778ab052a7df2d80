//! Directory listing and file classification.

use std::{
    cmp::Ordering,
    collections::HashSet,
    env,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
};

use icu_collator::{Collator, CollatorOptions, Strength};
use icu_locid::Locale;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_AUDIO_EXTENSIONS: [&str; 12] = [
    "aac", "aiff", "ape", "flac", "m4a", "mp3", "mpc", "oga", "ogg", "opus", "wav", "wma",
];

pub const DEFAULT_PLAYLIST_EXTENSIONS: [&str; 9] = [
    "asx", "m3u", "m3u8", "pls", "ram", "smi", "smil", "wax", "xspf",
];

/// Case-insensitive check of `path`'s extension against `extensions`
/// (lowercase, without the dot).
pub fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_ascii_lowercase()))
        .unwrap_or(false)
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DirEntryInfo {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self {
            path: path.into(),
            is_dir,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

thread_local! {
    static COLLATOR: Option<Collator> = system_collator();
}

/// Collator for `LC_ALL`, `LC_COLLATE` or `LANG`, in that order, with the
/// root collation when none of them names a usable locale.
fn system_collator() -> Option<Collator> {
    let locale = ["LC_ALL", "LC_COLLATE", "LANG"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| posix_locale(&value))
        .unwrap_or_default();

    match Collator::try_new(&(&locale).into(), collator_options()) {
        Ok(collator) => return Some(collator),
        Err(err) => warn!(%locale, error=?err, "no collation for locale, using root"),
    }
    match Collator::try_new(&Default::default(), collator_options()) {
        Ok(collator) => Some(collator),
        Err(err) => {
            warn!(error=?err, "root collation unavailable");
            None
        }
    }
}

/// Secondary strength: accents matter, case does not.
fn collator_options() -> CollatorOptions {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Secondary);
    options
}

/// `fr_FR.UTF-8@euro` becomes `fr-FR`; `C` and `POSIX` give nothing.
fn posix_locale(value: &str) -> Option<Locale> {
    let tag = value.split(['.', '@']).next()?;
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    tag.replace('_', "-").parse::<Locale>().ok()
}

/// Name comparison for display order, following the user's locale
/// ("Éclair" sorts with the E's), exact on ties.
pub fn locale_aware_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        })
        .then_with(|| a.cmp(b))
}

/// Order of a directory listing: within the same parent directory,
/// sub-directories come before files; otherwise names are compared with
/// [`locale_aware_cmp`].
pub fn directory_sensitive_cmp(a: &DirEntryInfo, b: &DirEntryInfo) -> Ordering {
    if a.path.parent() == b.path.parent() && a.is_dir != b.is_dir {
        return if a.is_dir {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    locale_aware_cmp(&a.path.to_string_lossy(), &b.path.to_string_lossy())
}

/// Audio files below `dir`, in listing order.
///
/// Entries are sorted with [`directory_sensitive_cmp`]; when `recursive`
/// is set, each sub-directory's files are spliced in at the directory's
/// position. Hidden entries are skipped, as are unreadable
/// sub-directories.
pub fn list_directory<'a>(
    dir: &'a Path,
    recursive: bool,
    extensions: &'a HashSet<String>,
) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
    Box::pin(async move {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|_| Error::SourceNotFound(dir.to_path_buf()))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            // metadata() follows symlinks
            match tokio::fs::metadata(&path).await {
                Ok(meta) => entries.push(DirEntryInfo::new(path, meta.is_dir())),
                Err(err) => debug!(path=%path.display(), error=%err, "skipping unreadable entry"),
            }
        }
        entries.sort_by(directory_sensitive_cmp);

        let mut files = Vec::new();
        for entry in entries {
            if entry.is_dir {
                if !recursive {
                    continue;
                }
                match list_directory(&entry.path, recursive, extensions).await {
                    Ok(nested) => files.extend(nested),
                    Err(err) => warn!(dir=%entry.path.display(), error=%err, "skipping directory"),
                }
            } else if has_extension(&entry.path, extensions) {
                files.push(entry.path);
            }
        }

        debug!(dir=%dir.display(), files=files.len(), "directory listed");
        Ok(files)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_sort_before_files_of_the_same_listing() {
        let dir = DirEntryInfo::new("/music/b", true);
        let file = DirEntryInfo::new("/music/a.ogg", false);
        assert_eq!(directory_sensitive_cmp(&dir, &file), Ordering::Less);
        assert_eq!(directory_sensitive_cmp(&file, &dir), Ordering::Greater);

        let mut entries = vec![file.clone(), dir.clone()];
        entries.sort_by(directory_sensitive_cmp);
        assert_eq!(entries, vec![dir, file]);
    }

    #[test]
    fn names_compare_case_insensitively() {
        let mut names = vec!["beta.ogg", "Alpha.ogg", "alpha.ogg", "Gamma.ogg"];
        names.sort_by(|a, b| locale_aware_cmp(a, b));
        assert_eq!(names, vec!["Alpha.ogg", "alpha.ogg", "beta.ogg", "Gamma.ogg"]);
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let mut names = vec!["Zebra", "Éclair", "apple", "Ecole", "alpha", "Alpha"];
        names.sort_by(|a, b| locale_aware_cmp(a, b));
        assert_eq!(names, vec!["Alpha", "alpha", "apple", "Éclair", "Ecole", "Zebra"]);

        assert_eq!(locale_aware_cmp("Éclair", "Zebra"), Ordering::Less);
        assert_eq!(locale_aware_cmp("über", "Zürich"), Ordering::Less);
        assert_eq!(locale_aware_cmp("éte", "ete"), Ordering::Greater);
    }

    #[test]
    fn posix_locale_names() {
        assert_eq!(posix_locale("fr_FR.UTF-8").map(|l| l.to_string()), Some("fr-FR".into()));
        assert_eq!(posix_locale("de_DE@euro").map(|l| l.to_string()), Some("de-DE".into()));
        assert!(posix_locale("C").is_none());
        assert!(posix_locale("POSIX").is_none());
    }

    #[test]
    fn extension_check_ignores_case() {
        let audio: HashSet<String> = DEFAULT_AUDIO_EXTENSIONS.iter().map(|s| s.to_string()).collect();
        assert!(has_extension(Path::new("/a/B.FLAC"), &audio));
        assert!(!has_extension(Path::new("/a/notes.txt"), &audio));
        assert!(!has_extension(Path::new("/a/README"), &audio));
    }
}
