//! Turns sources into a flat, ordered list of (proxy) tracks.
//!
//! Every playable location becomes a [`ProxyTrack`] handed to the
//! [`ProxyResolver`]. When full metadata is required, the loader observes
//! the proxies it created and only emits its result once all of them are
//! resolved, or once the timeout expires after enumeration ended.

use std::{
    collections::HashSet,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use amkmeta::{
    Base, CachedFields, EntityId, Observer, ObserverExt, ProxyTrack, Subscriptions, Track,
    TrackList, TrackPtr, TrackProvider,
};
use parking_lot::Mutex;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::discovery::{
    DEFAULT_AUDIO_EXTENSIONS, DEFAULT_PLAYLIST_EXTENSIONS, has_extension, list_directory,
};
use crate::error::{Error, Result};
use crate::playlist::load_playlist;
use crate::resolver::ProxyResolver;
use crate::source::{Source, file_url};

/// Loader behaviour.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    /// Wait for every proxy to be resolved before finishing.
    pub full_metadata_required: bool,
    /// Upper bound of that wait, counted from the end of enumeration.
    pub timeout: Duration,
    /// Descend into sub-directories.
    pub recursive: bool,
    /// Lowercase, without the dot.
    pub audio_extensions: HashSet<String>,
    pub playlist_extensions: HashSet<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            full_metadata_required: false,
            timeout: Duration::from_millis(2000),
            recursive: true,
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            playlist_extensions: DEFAULT_PLAYLIST_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl LoaderOptions {
    pub fn full_metadata_required(mut self, required: bool) -> Self {
        self.full_metadata_required = required;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.audio_extensions = lowercase_set(extensions);
        self
    }

    pub fn playlist_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.playlist_extensions = lowercase_set(extensions);
        self
    }
}

fn lowercase_set<I, S>(extensions: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

/// Loads tracks out of URLs, files, directories and playlists.
///
/// ```no_run
/// use std::sync::Arc;
/// use amkloader::{LoaderOptions, Source, TrackLoader};
/// use amkmeta::{Base, MemoryCollection};
///
/// # #[tokio::main]
/// # async fn main() {
/// let loader = TrackLoader::new(LoaderOptions::default().full_metadata_required(true))
///     .with_provider(Arc::new(MemoryCollection::new("Local")));
///
/// let tracks = loader.load(vec![Source::parse("/home/me/Music")]).await;
/// for track in tracks {
///     println!("{}", track.pretty_name());
/// }
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct TrackLoader {
    options: LoaderOptions,
    resolver: ProxyResolver,
}

impl TrackLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            resolver: ProxyResolver::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn TrackProvider>) -> Self {
        self.resolver.add(provider);
        self
    }

    pub fn with_providers<I>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TrackProvider>>,
    {
        for provider in providers {
            self.resolver.add(provider);
        }
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ProxyResolver {
        &self.resolver
    }

    /// Starts loading `sources` in the background and returns the channel
    /// the track list will be sent on, exactly once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, sources: Vec<Source>) -> oneshot::Receiver<TrackList> {
        let (sender, receiver) = oneshot::channel();
        let state = LoaderState::new(self.options.clone(), self.resolver.clone(), sender);

        tokio::spawn(async move {
            for source in sources {
                if let Err(err) = state.enumerate(&source).await {
                    warn!(%source, error=%err, "skipping source");
                }
            }
            state.may_finish();
        });

        receiver
    }

    /// Loads `sources` and waits for the resulting track list.
    pub async fn load(&self, sources: Vec<Source>) -> TrackList {
        match self.start(sources).await {
            Ok(tracks) => tracks,
            Err(_) => {
                warn!("track loader stopped without a result");
                TrackList::new()
            }
        }
    }
}

#[derive(Default)]
struct Progress {
    tracks: TrackList,
    unresolved: HashSet<EntityId>,
    enumerated: bool,
}

struct LoaderState {
    subscriptions: Subscriptions,
    options: LoaderOptions,
    resolver: ProxyResolver,
    progress: Mutex<Progress>,
    finished: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<TrackList>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl LoaderState {
    fn new(
        options: LoaderOptions,
        resolver: ProxyResolver,
        sender: oneshot::Sender<TrackList>,
    ) -> Arc<Self> {
        Arc::new(Self {
            subscriptions: Subscriptions::new(),
            options,
            resolver,
            progress: Mutex::new(Progress::default()),
            finished: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            timer: Mutex::new(None),
        })
    }

    async fn enumerate(self: &Arc<Self>, source: &Source) -> Result<()> {
        let Some(path) = source.local_path() else {
            // Les URL distantes (flux, playlists distantes) sont des pistes
            self.add_track(source.to_url()?, CachedFields::default());
            return Ok(());
        };

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| Error::SourceNotFound(path.clone()))?;

        if metadata.is_dir() {
            let files =
                list_directory(&path, self.options.recursive, &self.options.audio_extensions)
                    .await?;
            debug!(dir=%path.display(), files=files.len(), "directory enumerated");
            for file in files {
                self.add_track(file_url(&file)?, CachedFields::default());
            }
        } else if has_extension(&path, &self.options.playlist_extensions) {
            self.add_playlist(&path).await?;
        } else if has_extension(&path, &self.options.audio_extensions) {
            self.add_track(file_url(&path)?, CachedFields::default());
        } else {
            return Err(Error::Unsupported(path.display().to_string()));
        }
        Ok(())
    }

    async fn add_playlist(self: &Arc<Self>, path: &Path) -> Result<()> {
        let entries = load_playlist(path).await?;
        debug!(playlist=%path.display(), entries=entries.len(), "playlist expanded");
        for entry in entries {
            self.add_track(entry.location, entry.cache);
        }
        Ok(())
    }

    fn add_track(self: &Arc<Self>, url: Url, cache: CachedFields) {
        let proxy = ProxyTrack::with_cache(url, cache);

        {
            let mut progress = self.progress.lock();
            progress.tracks.push(proxy.clone() as TrackPtr);
            if self.options.full_metadata_required {
                progress.unresolved.insert(proxy.entity_id());
            }
        }
        // Abonnement avant la résolution, pour ne rater aucune notification
        if self.options.full_metadata_required {
            self.subscribe_to(&proxy);
        }
        self.resolver.resolve(proxy);
    }

    /// Called once every source has been enumerated.
    fn may_finish(self: &Arc<Self>) {
        let pending = {
            let mut progress = self.progress.lock();
            progress.enumerated = true;
            progress.unresolved.len()
        };

        if pending == 0 {
            self.finish();
            return;
        }

        debug!(pending, timeout_ms = self.options.timeout.as_millis() as u64, "waiting for resolution");
        let state = Arc::clone(self);
        let timeout = self.options.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            state.timed_out();
        });

        // finish() may have run before the handle was stored
        let mut slot = self.timer.lock();
        if self.finished.load(Ordering::Acquire) {
            timer.abort();
        } else {
            *slot = Some(timer);
        }
    }

    fn timed_out(&self) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        let pending = self.progress.lock().unresolved.len();
        warn!(unresolved = pending, "timed out waiting for track resolution");
        self.finish();
    }

    /// Emits the result. Only the first caller gets through.
    fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        self.subscriptions.unsubscribe_all();

        let (tracks, unresolved) = {
            let mut progress = self.progress.lock();
            (
                std::mem::take(&mut progress.tracks),
                progress.unresolved.len(),
            )
        };
        info!(tracks = tracks.len(), unresolved, "tracks loaded");

        if let Some(sender) = self.sender.lock().take() {
            if sender.send(tracks).is_err() {
                debug!("track list receiver dropped");
            }
        }
    }
}

impl Observer for LoaderState {
    fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    fn track_changed(&self, track: &TrackPtr) {
        if !track.is_resolved() || self.finished.load(Ordering::Acquire) {
            return;
        }

        let done = {
            let mut progress = self.progress.lock();
            if !progress.unresolved.remove(&track.entity_id()) {
                return;
            }
            progress.enumerated && progress.unresolved.is_empty()
        };
        track.observable().unsubscribe(self);

        if done {
            self.finish();
        }
    }
}
