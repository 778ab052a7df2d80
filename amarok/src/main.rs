use amkconfig::get_config;
use amkloader::{LoaderConfigExt, Source, TrackLoader};
use amkmeta::{Base, Track};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let config = get_config();
    if !config.get_log_enable_console().unwrap_or(true) {
        return;
    }

    // RUST_LOG prend le pas sur le niveau configuré
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config
            .get_log_min_level()
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level.to_lowercase())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn format_length(ms: i64) -> String {
    if ms <= 0 {
        return "--:--".to_string();
    }
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let sources: Vec<Source> = std::env::args().skip(1).map(|arg| Source::parse(&arg)).collect();
    if sources.is_empty() {
        eprintln!("usage: amarok <url|file|directory|playlist>...");
        std::process::exit(2);
    }

    let config = get_config();
    let options = config.loader_options()?;
    info!(
        config_dir = config.directory(),
        sources = sources.len(),
        full_metadata = options.full_metadata_required,
        "🎵 Loading tracks..."
    );

    let loader = TrackLoader::new(options);
    let tracks = loader.load(sources).await;
    if tracks.is_empty() {
        warn!("No playable track found");
    }

    for (index, track) in tracks.iter().enumerate() {
        let artist = track
            .artist()
            .map(|a| a.pretty_name())
            .unwrap_or_default();
        println!(
            "{:>3}. {} - {} [{}]{}",
            index + 1,
            artist,
            track.pretty_name(),
            format_length(track.length()),
            if track.is_resolved() { "" } else { " *" }
        );
    }

    info!("✅ {} track(s) loaded", tracks.len());
    Ok(())
}
