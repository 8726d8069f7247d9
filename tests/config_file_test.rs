//! Loading client configuration from TOML files.

use std::io::Write;
use strictly_client::{ClientConfig, GameMode, ServerAddress};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_from_file_reads_all_fields() {
    let file = write_config(
        r#"
username = "alice"
device_id = "device-42"
server = "games.example.com:7351"
server_key = "secret"
use_ssl = true
game_mode = "timed"
leaderboard_interval_secs = 5
leaderboard_size = 3
log_file = "client.log"
"#,
    );

    let config = ClientConfig::from_file(file.path()).expect("valid config");
    assert_eq!(config.username(), "alice");
    assert_eq!(config.device_id(), "device-42");
    assert_eq!(config.server().host(), "games.example.com");
    assert_eq!(config.server().port(), 7351);
    assert_eq!(config.server_key(), "secret");
    assert!(*config.use_ssl());
    assert_eq!(*config.game_mode(), GameMode::Timed);
    assert_eq!(*config.leaderboard_interval_secs(), 5);
    assert_eq!(*config.leaderboard_size(), 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_keys_take_defaults() {
    let file = write_config("username = \"bob\"\n");

    let config = ClientConfig::from_file(file.path()).expect("partial config");
    assert_eq!(config.username(), "bob");
    assert_eq!(*config.server(), ServerAddress::default());
    assert_eq!(config.server_key(), "defaultkey");
    assert_eq!(*config.game_mode(), GameMode::Classic);
    // Device id still missing.
    assert!(config.validate().is_err());
}

#[test]
fn test_bad_files_are_reported() {
    let garbage = write_config("username = [");
    assert!(ClientConfig::from_file(garbage.path()).is_err());

    let bad_server = write_config("server = \"host:notaport\"\n");
    assert!(ClientConfig::from_file(bad_server.path()).is_err());

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    assert!(ClientConfig::from_file(dir.path().join("missing.toml")).is_err());
}
