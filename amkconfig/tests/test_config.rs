use amkconfig::Config;
use serde_yaml::Value;
use tempfile::TempDir;

fn load(dir: &TempDir) -> Config {
    Config::load_config(dir.path().to_str().unwrap()).unwrap()
}

#[test]
fn test_defaults_from_embedded_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = load(&dir);

    assert_eq!(config.get_loader_timeout_ms().unwrap(), 2000);
    assert!(!config.get_loader_full_metadata_required().unwrap());
    assert!(config.get_loader_recursive().unwrap());
    assert_eq!(config.get_log_min_level().unwrap(), "INFO");

    let audio = config.get_audio_extensions().unwrap();
    assert!(audio.contains(&"ogg".to_string()));
    assert!(audio.contains(&"flac".to_string()));
    assert_eq!(
        config.get_playlist_extensions().unwrap(),
        vec!["asx", "m3u", "m3u8", "pls", "ram", "smi", "smil", "wax", "xspf"]
    );

    // Le fichier fusionné est écrit dans le répertoire
    assert!(dir.path().join("config.yaml").exists());
}

#[test]
fn test_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "Loader:\n  Timeout_MS: 500\n  audio_extensions: [OGG, mp3]\n",
    )
    .unwrap();

    let config = load(&dir);

    assert_eq!(config.get_loader_timeout_ms().unwrap(), 500);
    assert_eq!(config.get_audio_extensions().unwrap(), vec!["ogg", "mp3"]);
    // Les clés absentes du fichier gardent leur valeur par défaut
    assert!(config.get_loader_recursive().unwrap());
}

#[test]
fn test_setters_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    {
        let config = load(&dir);
        config.set_loader_full_metadata_required(true).unwrap();
        config.set_loader_timeout_ms(750).unwrap();
        config.set_log_min_level("DEBUG".to_string()).unwrap();
    }

    let config = load(&dir);
    assert!(config.get_loader_full_metadata_required().unwrap());
    assert_eq!(config.get_loader_timeout_ms().unwrap(), 750);
    assert_eq!(config.get_log_min_level().unwrap(), "DEBUG");
}

#[test]
fn test_invalid_values_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "loader:\n  timeout_ms: soon\n  recursive: maybe\n",
    )
    .unwrap();

    let config = load(&dir);
    assert_eq!(config.get_loader_timeout_ms().unwrap(), 2000);
    assert!(config.get_loader_recursive().unwrap());
}

#[test]
fn test_env_override() {
    // Clé dédiée pour ne pas perturber les autres tests du processus
    unsafe {
        std::env::set_var("AMAROK_CONFIG__TESTING__MARKER", "7");
    }
    let dir = tempfile::tempdir().unwrap();
    let config = load(&dir);

    assert_eq!(
        config.get_value(&["testing", "marker"]).unwrap(),
        Value::from(7)
    );
    assert!(config.get_value(&["testing", "missing"]).is_err());
}
