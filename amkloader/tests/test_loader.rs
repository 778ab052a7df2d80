use std::{
    collections::HashSet,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use amkloader::{
    DEFAULT_AUDIO_EXTENSIONS, DirEntryInfo, LoaderOptions, Source, TrackLoader,
    directory_sensitive_cmp, file_url, list_directory,
};
use amkmeta::{
    Base, MemoryCollection, MemoryTrack, ProxyTrack, Track, TrackPtr, TrackProvider,
};
use async_trait::async_trait;
use tempfile::TempDir;
use url::Url;

/// b/track.ogg, a.ogg, notes.txt, .hidden.ogg
fn music_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("b")).unwrap();
    std::fs::write(dir.path().join("b").join("track.ogg"), b"").unwrap();
    std::fs::write(dir.path().join("a.ogg"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
    std::fs::write(dir.path().join(".hidden.ogg"), b"").unwrap();
    dir
}

fn audio_extensions() -> HashSet<String> {
    DEFAULT_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn url_of(path: &Path) -> Url {
    file_url(path).unwrap()
}

fn uid_urls(tracks: &[TrackPtr]) -> Vec<String> {
    tracks.iter().map(|t| t.uid_url()).collect()
}

/// Fournisseur qui répond après un délai
struct SlowProvider {
    collection: MemoryCollection,
    delay: Duration,
}

#[async_trait]
impl TrackProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    fn possibly_contains_track(&self, url: &Url) -> bool {
        self.collection.possibly_contains_track(url)
    }

    async fn track_for_url(&self, url: &Url) -> Option<TrackPtr> {
        tokio::time::sleep(self.delay).await;
        self.collection.track_for_url(url).await
    }
}

#[test]
fn test_directory_sorts_before_sibling_file() {
    let dir = music_dir();
    let mut entries = vec![
        DirEntryInfo::new(dir.path().join("a.ogg"), false),
        DirEntryInfo::new(dir.path().join("b"), true),
    ];
    entries.sort_by(directory_sensitive_cmp);
    assert_eq!(entries[0].file_name(), "b");
    assert_eq!(entries[1].file_name(), "a.ogg");
}

#[tokio::test]
async fn test_recursive_listing_order() {
    let dir = music_dir();
    let files = list_directory(dir.path(), true, &audio_extensions())
        .await
        .unwrap();
    assert_eq!(
        files,
        vec![dir.path().join("b").join("track.ogg"), dir.path().join("a.ogg")]
    );

    let files = list_directory(dir.path(), false, &audio_extensions())
        .await
        .unwrap();
    assert_eq!(files, vec![dir.path().join("a.ogg")]);
}

#[tokio::test]
async fn test_load_without_providers() {
    let dir = music_dir();
    let loader = TrackLoader::new(LoaderOptions::default());

    let tracks = loader.load(vec![Source::from(dir.path())]).await;

    assert_eq!(
        uid_urls(&tracks),
        vec![
            url_of(&dir.path().join("b").join("track.ogg")).to_string(),
            url_of(&dir.path().join("a.ogg")).to_string(),
        ]
    );
    assert!(tracks.iter().all(|t| !t.is_resolved()));
    assert_eq!(tracks[1].pretty_name(), "a.ogg");
}

#[tokio::test]
async fn test_full_metadata_waits_for_resolution() {
    let dir = music_dir();
    let collection = MemoryCollection::new("Local");
    collection.insert(
        MemoryTrack::builder(url_of(&dir.path().join("a.ogg")))
            .title("Real Song")
            .artist("Real Artist"),
    );
    collection.insert(
        MemoryTrack::builder(url_of(&dir.path().join("b").join("track.ogg"))).title("Other"),
    );

    let loader = TrackLoader::new(
        LoaderOptions::default()
            .full_metadata_required(true)
            .timeout(Duration::from_secs(10)),
    )
    .with_provider(Arc::new(collection));

    let tracks = loader.load(vec![Source::from(dir.path())]).await;

    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.is_resolved()));
    assert_eq!(tracks[0].name(), "Other");
    assert_eq!(tracks[1].pretty_name(), "Real Song");
    assert_eq!(tracks[1].artist().unwrap().name(), "Real Artist");
}

#[tokio::test]
async fn test_slow_provider_finishes_before_timeout() {
    let dir = music_dir();
    let collection = MemoryCollection::new("Remote");
    collection.insert(MemoryTrack::builder(url_of(&dir.path().join("a.ogg"))).title("Late"));

    let loader = TrackLoader::new(
        LoaderOptions::default()
            .full_metadata_required(true)
            .timeout(Duration::from_secs(10)),
    )
    .with_provider(Arc::new(SlowProvider {
        collection,
        delay: Duration::from_millis(50),
    }));

    let started = Instant::now();
    let tracks = loader
        .load(vec![Source::from(dir.path().join("a.ogg"))])
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(tracks.len(), 1);
    assert!(tracks[0].is_resolved());
    assert_eq!(tracks[0].name(), "Late");
}

#[tokio::test]
async fn test_timeout_finishes_with_unresolved_proxies() {
    let dir = music_dir();
    let loader = TrackLoader::new(
        LoaderOptions::default()
            .full_metadata_required(true)
            .timeout(Duration::from_millis(100)),
    );

    let started = Instant::now();
    let tracks = loader.load(vec![Source::from(dir.path())]).await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| !t.is_resolved()));
}

#[tokio::test]
async fn test_playlists_expand_with_seeded_metadata() {
    let dir = music_dir();
    std::fs::write(
        dir.path().join("list.m3u"),
        "#EXTM3U\n#EXTINF:180,Band - Song\na.ogg\nhttp://radio.example/live\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("list.pls"),
        "[playlist]\nFile1=b/track.ogg\nTitle1=Track\nLength1=42\nNumberOfEntries=1\n",
    )
    .unwrap();

    let loader = TrackLoader::new(LoaderOptions::default());
    let tracks = loader
        .load(vec![
            Source::from(dir.path().join("list.m3u")),
            Source::from(dir.path().join("list.pls")),
        ])
        .await;

    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].uid_url(), url_of(&dir.path().join("a.ogg")).to_string());
    assert_eq!(tracks[0].name(), "Song");
    assert_eq!(tracks[0].artist().unwrap().name(), "Band");
    assert_eq!(tracks[0].length(), 180_000);

    assert_eq!(tracks[1].uid_url(), "http://radio.example/live");
    assert_eq!(tracks[1].pretty_name(), "live");

    assert_eq!(tracks[2].name(), "Track");
    assert_eq!(tracks[2].length(), 42_000);
}

#[tokio::test]
async fn test_xspf_playlist_expands() {
    let dir = music_dir();
    std::fs::write(
        dir.path().join("mix.xspf"),
        r#"<playlist version="1" xmlns="http://xspf.org/ns/0/">
  <trackList>
    <track><location>b/track.ogg</location><title>Deep</title><duration>61000</duration></track>
    <track><location>a.ogg</location><creator>Someone</creator></track>
  </trackList>
</playlist>"#,
    )
    .unwrap();

    let loader = TrackLoader::new(LoaderOptions::default());
    let tracks = loader
        .load(vec![Source::from(dir.path().join("mix.xspf"))])
        .await;

    assert_eq!(
        uid_urls(&tracks),
        vec![
            url_of(&dir.path().join("b").join("track.ogg")).to_string(),
            url_of(&dir.path().join("a.ogg")).to_string(),
        ]
    );
    assert_eq!(tracks[0].name(), "Deep");
    assert_eq!(tracks[0].length(), 61_000);
    assert_eq!(tracks[1].artist().unwrap().name(), "Someone");
}

#[tokio::test]
async fn test_remote_urls_become_proxies() {
    let loader = TrackLoader::new(LoaderOptions::default());
    let tracks = loader
        .load(vec![Source::parse("http://radio.example/stream.pls")])
        .await;

    assert_eq!(uid_urls(&tracks), vec!["http://radio.example/stream.pls"]);
    assert!(!tracks[0].is_resolved());
}

#[tokio::test]
async fn test_bad_sources_are_skipped() {
    let dir = music_dir();
    let loader = TrackLoader::new(LoaderOptions::default());

    let tracks = loader
        .load(vec![
            Source::from(dir.path().join("missing.ogg")),
            Source::from(dir.path().join("notes.txt")),
            Source::from(dir.path().join("a.ogg")),
        ])
        .await;

    assert_eq!(
        uid_urls(&tracks),
        vec![url_of(&dir.path().join("a.ogg")).to_string()]
    );
}

#[tokio::test]
async fn test_loader_releases_its_subscriptions() {
    let dir = music_dir();
    let loader = TrackLoader::new(
        LoaderOptions::default()
            .full_metadata_required(true)
            .timeout(Duration::from_millis(50)),
    )
    .with_provider(Arc::new(MemoryCollection::new("Empty")));

    let tracks = loader.start(vec![Source::from(dir.path())]).await.unwrap();
    assert_eq!(tracks.len(), 2);

    for track in &tracks {
        assert_eq!(track.observable().subscriber_count(), 0);
    }

    // Une résolution tardive ne touche plus le chargeur
    let proxy = tracks[1].as_any().downcast_ref::<ProxyTrack>().unwrap();
    let real = MemoryTrack::builder(url_of(&dir.path().join("a.ogg")))
        .title("Too late")
        .build();
    proxy.update_track(Some(real));
    assert_eq!(tracks[1].name(), "Too late");
}
