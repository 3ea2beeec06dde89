//! Settings survive engine restarts when backed by a JSON file

use assert_matches::assert_matches;
use ping_monitor::{
    EngineBuilder,
    config::{AppSettings, DisplayStrategy, NotificationConfig, NotificationKind},
    probe::ProbeResult,
    storage::{
        SettingsStore, StorageError,
        file::JsonFileBackend,
        sample_log::{CSV_HEADER, log_path},
    },
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::helpers::*;

async fn open_store(dir: &TempDir) -> SettingsStore {
    let backend = JsonFileBackend::new(dir.path().join("settings.json"));
    SettingsStore::open(Box::new(backend)).await.unwrap()
}

fn spawn_on(store: SettingsStore) -> ping_monitor::EngineHandle {
    EngineBuilder::new(store)
        .prober(ScriptedProber::always(ProbeResult::success(10.0)))
        .notifier(RecordingNotifier::new())
        .spawn()
}

#[tokio::test]
async fn test_first_launch_seeds_defaults() {
    let dir = TempDir::new().unwrap();

    let store = open_store(&dir).await;

    let seeded = AppSettings::seeded();
    assert_eq!(store.settings().hosts.len(), 1);
    assert_eq!(store.settings().hosts[0].name, seeded.hosts[0].name);
    assert_eq!(store.settings().hosts[0].address, seeded.hosts[0].address);
    let preset_names = |s: &AppSettings| s.presets.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    assert_eq!(preset_names(store.settings()), preset_names(&seeded));
    assert!(dir.path().join("settings.json").exists());

    // a second launch reads what the first one wrote
    let reopened = open_store(&dir).await;
    assert_eq!(reopened.settings(), store.settings());
}

#[tokio::test]
async fn test_host_edits_survive_restart() {
    let dir = TempDir::new().unwrap();
    let engine = spawn_on(open_store(&dir).await);

    let seeded = engine.get_hosts().await.unwrap();
    let added = create_test_host_with_rules("Cloudflare", "1.1.1.1");
    engine.add_host(added.clone()).await.unwrap();
    engine.remove_host(seeded[0].id).await.unwrap();
    engine.shutdown().await.unwrap();

    let engine = spawn_on(open_store(&dir).await);
    assert_eq!(engine.get_hosts().await.unwrap(), vec![added]);
}

#[tokio::test]
async fn test_applied_settings_survive_restart() {
    let dir = TempDir::new().unwrap();
    let engine = spawn_on(open_store(&dir).await);

    let mut settings = engine.get_settings().await.unwrap();
    settings.ping_interval = 30;
    settings.auto_start = true;
    settings.display_strategy = DisplayStrategy::Worst;
    settings.notification = NotificationConfig {
        kind: NotificationKind::Webhook,
        endpoint: Some("https://hooks.example.com/ping".to_string()),
        user_id: None,
    };
    engine.apply_settings(settings.clone()).await.unwrap();
    engine.shutdown().await.unwrap();

    let store = open_store(&dir).await;
    assert_eq!(store.settings(), &settings);
}

#[tokio::test]
async fn test_auto_start_after_restart() {
    let dir = TempDir::new().unwrap();
    let engine = spawn_on(open_store(&dir).await);

    let mut settings = engine.get_settings().await.unwrap();
    settings.auto_start = true;
    engine.apply_settings(settings.clone()).await.unwrap();
    engine.shutdown().await.unwrap();

    let engine = spawn_on(open_store(&dir).await);
    let expected: Vec<_> = settings.hosts.iter().map(|h| h.id).collect();
    assert_eq!(engine.active_hosts().await.unwrap(), expected);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    let result = SettingsStore::open(Box::new(JsonFileBackend::new(&path))).await;

    assert_matches!(result.err(), Some(StorageError::Serialization(_)));
    // the broken file is left for the user to inspect
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_invalid_document_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "ping_interval": 0 }"#).unwrap();

    let result = SettingsStore::open(Box::new(JsonFileBackend::new(&path))).await;

    assert_matches!(result.err(), Some(StorageError::InvalidDocument(_)));
}

#[tokio::test]
async fn test_missing_fields_take_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "ping_interval": 10 }"#).unwrap();

    let store = SettingsStore::open(Box::new(JsonFileBackend::new(&path))).await.unwrap();

    assert_eq!(
        store.settings(),
        &AppSettings {
            ping_interval: 10,
            ..AppSettings::default()
        }
    );
}

#[tokio::test]
async fn test_running_host_appends_sample_log() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let host = store.settings().hosts[0].clone();
    let log_dir = dir.path().join("logs");

    let engine = EngineBuilder::new(store)
        .prober(ScriptedProber::always(ProbeResult::success(10.0)))
        .notifier(RecordingNotifier::new())
        .sample_log_dir(&log_dir)
        .spawn();
    let mut rx = engine.subscribe();

    engine.start_monitoring(host.id).await.unwrap();
    next_event(&mut rx, 5).await;
    engine.shutdown().await.unwrap();

    let path = log_path(&log_dir, host.id);
    let mut lines = Vec::new();
    for _ in 0..100 {
        let content = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        lines = content.lines().map(str::to_string).collect();
        if lines.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(lines[0], CSV_HEADER);
    assert!(lines[1].ends_with(",10,false,true"), "unexpected row {}", lines[1]);
}
