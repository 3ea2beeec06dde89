//! Registry and settings commands through the engine handle

use assert_matches::assert_matches;
use ping_monitor::{
    EngineError,
    config::{AppSettings, ConfigError, HostConfig, PeakPolicy},
    probe::ProbeResult,
    storage::StorageError,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::helpers::*;

fn test_engine(hosts: Vec<HostConfig>) -> TestEngine {
    spawn_test_engine(
        create_test_settings(hosts),
        ScriptedProber::always(ProbeResult::success(10.0)),
    )
}

#[tokio::test]
async fn test_add_host_is_persisted() {
    let t = test_engine(vec![]);
    let host = create_test_host("Cloudflare", "1.1.1.1");

    t.engine.add_host(host.clone()).await.unwrap();

    assert_eq!(t.engine.get_hosts().await.unwrap(), vec![host.clone()]);
    assert_eq!(t.backend.stored().await.unwrap().hosts, vec![host]);
    assert_eq!(t.backend.save_count(), 1);
}

#[tokio::test]
async fn test_add_duplicate_host_is_rejected() {
    let host = create_test_host("Cloudflare", "1.1.1.1");
    let t = test_engine(vec![host.clone()]);

    assert_matches!(
        t.engine.add_host(host).await,
        Err(EngineError::Config(ConfigError::DuplicateHost(_)))
    );
    assert_eq!(t.backend.save_count(), 0);
}

#[tokio::test]
async fn test_add_invalid_host_is_rejected() {
    let t = test_engine(vec![]);

    assert_matches!(
        t.engine.add_host(create_test_host("Flag", "-oProxyCommand")).await,
        Err(EngineError::Config(ConfigError::InvalidAddress(_)))
    );
    assert_matches!(
        t.engine.add_host(create_test_host("", "1.1.1.1")).await,
        Err(EngineError::Config(ConfigError::MissingField("name")))
    );
    assert_matches!(
        t.engine
            .add_host(create_test_host("Bad", "1.1.1.1").with_command("{address} -c 1"))
            .await,
        Err(EngineError::Config(ConfigError::InvalidCommand(_)))
    );

    assert!(t.engine.get_hosts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_host_keeps_position() {
    let first = create_test_host("First", "1.1.1.1");
    let second = create_test_host("Second", "8.8.8.8");
    let third = create_test_host("Third", "9.9.9.9");
    let t = test_engine(vec![first.clone(), second.clone(), third.clone()]);

    let renamed = HostConfig {
        name: "Quad8".to_string(),
        ..second.clone()
    };
    t.engine.update_host(renamed.clone()).await.unwrap();

    let hosts = t.engine.get_hosts().await.unwrap();
    assert_eq!(hosts, vec![first, renamed, third]);
}

#[tokio::test]
async fn test_update_unknown_host_errors() {
    let t = test_engine(vec![]);

    assert_matches!(
        t.engine.update_host(create_test_host("Ghost", "1.1.1.1")).await,
        Err(EngineError::Config(ConfigError::UnknownHost(_)))
    );
}

#[tokio::test]
async fn test_remove_host() {
    let keep = create_test_host("Keep", "1.1.1.1");
    let drop = create_test_host("Drop", "8.8.8.8");
    let t = test_engine(vec![keep.clone(), drop.clone()]);

    t.engine.remove_host(drop.id).await.unwrap();

    assert_eq!(t.engine.get_hosts().await.unwrap(), vec![keep.clone()]);
    assert_eq!(t.backend.stored().await.unwrap().hosts, vec![keep]);

    assert_matches!(
        t.engine.remove_host(drop.id).await,
        Err(EngineError::Config(ConfigError::UnknownHost(id))) if id == drop.id
    );
}

#[tokio::test]
async fn test_failed_write_leaves_settings_untouched() {
    let host = create_test_host("Cloudflare", "1.1.1.1");
    let t = test_engine(vec![host.clone()]);
    t.backend.set_fail_writes(true);

    assert_matches!(
        t.engine.add_host(create_test_host("Google", "8.8.8.8")).await,
        Err(EngineError::Storage(StorageError::Unavailable(_)))
    );
    assert_matches!(
        t.engine.remove_host(host.id).await,
        Err(EngineError::Storage(_))
    );

    assert_eq!(t.engine.get_hosts().await.unwrap(), vec![host]);

    t.backend.set_fail_writes(false);
    t.engine
        .add_host(create_test_host("Google", "8.8.8.8"))
        .await
        .unwrap();
    assert_eq!(t.engine.get_hosts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_apply_settings_replaces_document() {
    let t = test_engine(vec![create_test_host("Cloudflare", "1.1.1.1")]);

    let mut settings = t.engine.get_settings().await.unwrap();
    settings.ping_interval = 10;
    settings.alert_latency_ms = 250.0;
    settings.peak_policy = PeakPolicy::AbsoluteCeiling { ceiling_ms: 300.0 };
    settings.hosts.push(create_test_host("Google", "8.8.8.8"));

    t.engine.apply_settings(settings.clone()).await.unwrap();

    assert_eq!(t.engine.get_settings().await.unwrap(), settings);
    assert_eq!(t.backend.stored().await.unwrap(), settings);
}

#[tokio::test]
async fn test_apply_invalid_settings_is_rejected() {
    let t = test_engine(vec![]);
    let before = t.engine.get_settings().await.unwrap();

    let zero_interval = AppSettings {
        ping_interval: 0,
        ..before.clone()
    };
    assert_matches!(
        t.engine.apply_settings(zero_interval).await,
        Err(EngineError::Config(ConfigError::InvalidInterval))
    );

    let host = create_test_host("Twice", "1.1.1.1");
    let duplicated = AppSettings {
        hosts: vec![host.clone(), host],
        ..before.clone()
    };
    assert_matches!(
        t.engine.apply_settings(duplicated).await,
        Err(EngineError::Config(ConfigError::DuplicateHost(_)))
    );

    assert_eq!(t.engine.get_settings().await.unwrap(), before);
    assert_eq!(t.backend.save_count(), 0);
}

#[tokio::test]
async fn test_unknown_host_queries() {
    let t = test_engine(vec![]);
    let id = Uuid::new_v4();

    assert_matches!(
        t.engine.history(id).await,
        Err(EngineError::Config(ConfigError::UnknownHost(_)))
    );
    assert_matches!(
        t.engine.start_monitoring(id).await,
        Err(EngineError::Config(ConfigError::UnknownHost(_)))
    );
}
