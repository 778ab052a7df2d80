//! What the loader can be asked to load.

use std::{
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use url::Url;

use crate::error::{Error, Result};

/// A URL, a local file, a directory or a playlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Url(Url),
    Path(PathBuf),
}

impl Source {
    /// Reads a command-line style argument: anything with a URL scheme is
    /// a URL, everything else a path. Single-letter schemes are Windows
    /// drive letters.
    pub fn parse(input: &str) -> Self {
        match Url::parse(input) {
            Ok(url) if url.scheme().len() > 1 => Source::Url(url),
            _ => Source::Path(PathBuf::from(input)),
        }
    }

    /// Local path for paths and `file` URLs.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            Source::Path(path) => Some(path.clone()),
            Source::Url(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Source::Url(_) => None,
        }
    }

    pub fn to_url(&self) -> Result<Url> {
        match self {
            Source::Url(url) => Ok(url.clone()),
            Source::Path(path) => file_url(path),
        }
    }
}

/// `file` URL of `path`, made absolute against the working directory.
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute).map_err(|_| Error::InvalidUrl(absolute.display().to_string()))
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{url}"),
            Source::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for Source {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Source::parse(s))
    }
}

impl From<Url> for Source {
    fn from(value: Url) -> Self {
        Source::Url(value)
    }
}

impl From<PathBuf> for Source {
    fn from(value: PathBuf) -> Self {
        Source::Path(value)
    }
}

impl From<&Path> for Source {
    fn from(value: &Path) -> Self {
        Source::Path(value.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_urls_and_paths() {
        assert!(matches!(Source::parse("http://radio.example/live"), Source::Url(_)));
        assert!(matches!(Source::parse("file:///music/a.ogg"), Source::Url(_)));
        assert_eq!(
            Source::parse("music/a.ogg"),
            Source::Path(PathBuf::from("music/a.ogg"))
        );
        assert!(matches!(Source::parse("C:\\music\\a.ogg"), Source::Path(_)));
    }

    #[test]
    fn local_path_only_for_files() {
        let file = Source::parse("file:///music/a.ogg");
        assert_eq!(file.local_path(), Some(PathBuf::from("/music/a.ogg")));
        assert_eq!(Source::parse("https://example.org/a.ogg").local_path(), None);
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = Source::parse("some/dir/a.ogg").to_url().unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/some/dir/a.ogg"));
    }
}
