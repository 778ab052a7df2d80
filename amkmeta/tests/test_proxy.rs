use std::any::Any;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use amkmeta::{
    AlbumPtr, ArtistPtr, Base, BoundedPlaybackCapability, CachedFields, CapabilityDelegate,
    CapabilityExt, ComposerPtr, EntityKind, GenrePtr, MemoryArtist, MemoryCollection, MemoryTrack,
    Observable, Observer, ObserverExt, ProxyTrack, StreamTrack, Subscriptions, Track, TrackPtr,
    YearPtr,
};
use parking_lot::Mutex;
use url::Url;

#[derive(Default)]
struct Recorder {
    subscriptions: Subscriptions,
    calls: AtomicUsize,
    last: Mutex<Option<TrackPtr>>,
}

impl Observer for Recorder {
    fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    fn track_changed(&self, track: &TrackPtr) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(track.clone());
    }
}

impl Recorder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Minimal hand-written track, the way a collection plug-in would provide one
struct StubTrack {
    title: String,
    artist: ArtistPtr,
    observable: Observable,
}

impl StubTrack {
    fn new(title: &str, artist: &str) -> Arc<Self> {
        Arc::new(Self {
            title: title.to_string(),
            artist: MemoryArtist::new(artist),
            observable: Observable::new(),
        })
    }
}

impl Base for StubTrack {
    fn kind(&self) -> EntityKind {
        EntityKind::Track
    }

    fn name(&self) -> String {
        self.title.clone()
    }

    fn observable(&self) -> &Observable {
        &self.observable
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Track for StubTrack {
    fn playable_url(&self) -> Option<Url> {
        None
    }

    fn pretty_url(&self) -> String {
        "stub".to_string()
    }

    fn uid_url(&self) -> String {
        format!("stub://{}", self.title)
    }

    fn artist(&self) -> Option<ArtistPtr> {
        Some(self.artist.clone())
    }

    fn album(&self) -> Option<AlbumPtr> {
        None
    }

    fn genre(&self) -> Option<GenrePtr> {
        None
    }

    fn composer(&self) -> Option<ComposerPtr> {
        None
    }

    fn year(&self) -> Option<YearPtr> {
        None
    }

    fn length(&self) -> i64 {
        1_000
    }

    fn track_number(&self) -> i32 {
        0
    }

    fn disc_number(&self) -> i32 {
        0
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn cached() -> CachedFields {
    CachedFields {
        artist: "Cached Artist".into(),
        album: "Cached Album".into(),
        title: "Cached Title".into(),
        genre: "Jazz".into(),
        year: 1959,
        length: 325_000,
        track_number: 4,
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_resolution() {
    let proxy = ProxyTrack::with_cache(
        url("file:///song.ogg"),
        CachedFields {
            title: "song.ogg".into(),
            ..Default::default()
        },
    );
    let observer = Arc::new(Recorder::default());
    observer.subscribe_to(&proxy);

    proxy.update_track(Some(StubTrack::new("Real Song", "Real Artist")));

    assert_eq!(observer.calls(), 1);
    let notified = observer.last.lock().clone().unwrap();
    assert_eq!(notified.pretty_name(), "Real Song");
    assert_eq!(proxy.artist().unwrap().name(), "Real Artist");
}

#[test]
fn test_accessors_before_resolution() {
    let proxy = ProxyTrack::with_cache(url("file:///jazz/blue.flac"), cached());

    assert!(!proxy.is_resolved());
    assert_eq!(proxy.name(), "Cached Title");
    assert_eq!(proxy.length(), 325_000);
    assert_eq!(proxy.track_number(), 4);
    assert_eq!(proxy.disc_number(), 0);
    assert_eq!(proxy.bpm(), 0.0);
    assert_eq!(proxy.playable_url(), Some(url("file:///jazz/blue.flac")));
    assert_eq!(proxy.uid_url(), "file:///jazz/blue.flac");

    assert_eq!(proxy.artist().unwrap().name(), "Cached Artist");
    assert_eq!(proxy.album().unwrap().name(), "Cached Album");
    assert_eq!(proxy.genre().unwrap().name(), "Jazz");
    assert_eq!(proxy.composer().unwrap().name(), "");
    assert_eq!(proxy.year().unwrap().year(), 1959);
    assert!(!proxy.album().unwrap().is_compilation());
    assert!(proxy.album().unwrap().album_artist().is_none());
}

#[test]
fn test_pretty_name_falls_back_to_file_name() {
    let proxy = ProxyTrack::new(url("file:///music/Some%20File.mp3"));
    assert_eq!(proxy.name(), "");
    assert_eq!(proxy.pretty_name(), "Some File.mp3");
}

#[test]
fn test_null_resolution_is_a_no_op() {
    let proxy = ProxyTrack::with_cache(url("file:///a.ogg"), cached());
    let observer = Arc::new(Recorder::default());
    observer.subscribe_to(&proxy);

    proxy.update_track(None);

    assert!(!proxy.is_resolved());
    assert_eq!(observer.calls(), 0);
    assert_eq!(proxy.cached_fields(), Some(cached()));
}

#[test]
fn test_resolution_swaps_to_real_track() {
    let proxy = ProxyTrack::with_cache(url("file:///a.ogg"), cached());
    let real = MemoryTrack::builder(url("file:///a.ogg"))
        .title("Real Title")
        .artist("Real Artist")
        .album("Real Album")
        .length(200_000)
        .build();

    proxy.update_track(Some(real.clone()));

    assert!(proxy.is_resolved());
    assert!(proxy.url().is_none());
    assert!(proxy.cached_fields().is_none());
    assert_eq!(proxy.name(), "Real Title");
    assert_eq!(proxy.length(), 200_000);
    assert_eq!(proxy.artist().unwrap().name(), "Real Artist");
    assert!(*proxy.artist().unwrap() == *real.artist().unwrap());
    assert!(proxy.year().is_none());
    assert!(proxy.equals(real.as_ref()));
    assert!(real.observable().subscriber_count() == 1);
}

#[test]
fn test_second_resolution_is_ignored() {
    let proxy = ProxyTrack::new(url("file:///a.ogg"));
    let observer = Arc::new(Recorder::default());
    observer.subscribe_to(&proxy);

    let first = MemoryTrack::builder(url("file:///a.ogg")).title("first").build();
    let second = MemoryTrack::builder(url("file:///a.ogg")).title("second").build();
    proxy.update_track(Some(first.clone()));
    proxy.update_track(Some(second.clone()));

    assert_eq!(observer.calls(), 1);
    assert_eq!(proxy.name(), "first");
    assert_eq!(second.observable().subscriber_count(), 0);
}

#[test]
fn test_real_track_changes_are_relayed() {
    let proxy = ProxyTrack::new(url("file:///a.ogg"));
    let observer = Arc::new(Recorder::default());
    observer.subscribe_to(&proxy);
    let real = MemoryTrack::builder(url("file:///a.ogg")).title("before").build();
    proxy.update_track(Some(real.clone()));
    assert_eq!(observer.calls(), 1);

    real.set_title("after");

    assert_eq!(observer.calls(), 2);
    // Le relais transmet le proxy, pas la piste réelle
    let notified = observer.last.lock().clone().unwrap();
    assert!(notified.equals(proxy.as_ref()));
    assert_eq!(notified.name(), "after");
}

#[test]
fn test_dropping_proxy_releases_real_track_subscription() {
    let real = MemoryTrack::builder(url("file:///a.ogg")).build();
    {
        let proxy = ProxyTrack::new(url("file:///a.ogg"));
        proxy.update_track(Some(real.clone()));
        assert_eq!(real.observable().subscriber_count(), 1);
    }
    assert_eq!(real.observable().subscriber_count(), 0);
    real.set_title("nobody listens");
}

#[test]
fn test_stream_receives_cached_fields() {
    let proxy = ProxyTrack::with_cache(url("http://radio.example/live"), cached());
    let stream = StreamTrack::new(url("http://radio.example/live"));

    proxy.update_track(Some(stream.clone()));

    let info = stream.initial_info();
    assert_eq!(info.title, "Cached Title");
    assert_eq!(info.artist, "Cached Artist");
    assert_eq!(info.album, "Cached Album");
    assert_eq!(info.length, 325_000);
    assert_eq!(info.track_number, 4);
    assert_eq!(proxy.name(), "Cached Title");
}

#[test]
fn test_sub_entity_outliving_proxy_is_empty() {
    let proxy = ProxyTrack::with_cache(url("file:///a.ogg"), cached());
    let artist = proxy.artist().unwrap();
    let album = proxy.album().unwrap();
    assert_eq!(artist.name(), "Cached Artist");

    drop(proxy);

    assert_eq!(artist.name(), "");
    assert_eq!(album.name(), "");
    assert!(artist.tracks().is_empty());
    assert!(!album.has_album_artist());
}

#[test]
fn test_sub_entity_equality() {
    let collection = MemoryCollection::new("test");
    let one = collection.insert(MemoryTrack::builder(url("file:///1.ogg")).artist("Shared"));
    let two = collection.insert(MemoryTrack::builder(url("file:///2.ogg")).artist("Shared"));

    let p1 = ProxyTrack::with_cache(url("file:///1.ogg"), cached());
    let p2 = ProxyTrack::with_cache(url("file:///2.ogg"), cached());
    let a1 = p1.artist().unwrap();
    let a2 = p2.artist().unwrap();

    // Non résolus : identité seulement, même avec le même nom en cache
    assert!(*a1 == *a1);
    assert!(*a1 != *a2);

    p1.update_track(Some(one));
    assert!(*a1 != *a2);

    p2.update_track(Some(two.clone()));
    assert!(*a1 == *a2);
    assert!(*a1 == *two.artist().unwrap());
}

#[test]
fn test_capabilities_forward_to_real_track() {
    let proxy = ProxyTrack::new(url("file:///a.ogg"));
    assert!(!proxy.has::<BoundedPlaybackCapability>());
    assert!(proxy.create::<BoundedPlaybackCapability>().is_none());

    let real = MemoryTrack::builder(url("file:///a.ogg"))
        .capabilities(
            CapabilityDelegate::new().with(|| BoundedPlaybackCapability::new(0, 60_000)),
        )
        .build();
    proxy.update_track(Some(real));

    assert!(proxy.has::<BoundedPlaybackCapability>());
    let bounded = proxy.create::<BoundedPlaybackCapability>().unwrap();
    assert_eq!(bounded.end_ms, 60_000);
}

#[test]
fn test_concurrent_readers_during_resolution() {
    let proxy = ProxyTrack::with_cache(url("file:///a.ogg"), cached());
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let proxy = proxy.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let name = proxy.name();
                    assert!(name == "Cached Title" || name == "Real Title");
                }
            })
        })
        .collect();

    let real = MemoryTrack::builder(url("file:///a.ogg")).title("Real Title").build();
    proxy.update_track(Some(real));

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(proxy.name(), "Real Title");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_resolutions_notify_once() {
    let proxy = ProxyTrack::new(url("file:///race.ogg"));
    let recorder = Arc::new(Recorder::default());
    recorder.subscribe_to(&proxy);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let proxy = proxy.clone();
            tokio::spawn(async move {
                let real = MemoryTrack::builder(url("file:///race.ogg"))
                    .title(format!("Candidate {i}"))
                    .build();
                proxy.update_track(Some(real));
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(proxy.is_resolved());
    assert!(proxy.name().starts_with("Candidate "));
    assert_eq!(recorder.calls(), 1);
}
