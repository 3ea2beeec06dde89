//! Concurrent access to the engine and its sessions

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use ping_monitor::{config::HostConfig, probe::ProbeResult};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use uuid::Uuid;

use crate::helpers::*;

#[tokio::test]
async fn test_concurrent_adds_are_serialised() {
    let t = spawn_test_engine(
        create_test_settings(vec![]),
        ScriptedProber::always(ProbeResult::success(10.0)),
    );

    let hosts: Vec<HostConfig> = (0..20)
        .map(|i| create_test_host(&format!("host-{i}"), &format!("10.0.0.{i}")))
        .collect();

    let results = join_all(hosts.iter().cloned().map(|host| {
        let engine = t.engine.clone();
        tokio::spawn(async move { engine.add_host(host).await })
    }))
    .await;

    for result in results {
        result.unwrap().unwrap();
    }

    let stored: HashSet<Uuid> = t
        .backend
        .stored()
        .await
        .unwrap()
        .hosts
        .iter()
        .map(|h| h.id)
        .collect();
    let expected: HashSet<Uuid> = hosts.iter().map(|h| h.id).collect();

    assert_eq!(stored, expected);
    assert_eq!(t.backend.save_count(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_many_hosts_publish_independently() {
    let hosts: Vec<HostConfig> = (0..10)
        .map(|i| create_test_host(&format!("host-{i}"), &format!("10.0.0.{i}")))
        .collect();
    let t = spawn_test_engine(
        create_test_settings(hosts.clone()),
        ScriptedProber::always(ProbeResult::success(10.0)),
    );
    let mut rx = t.engine.subscribe();

    t.engine.start_all().await.unwrap();

    let mut seen = HashSet::new();
    for _ in 0..hosts.len() {
        seen.insert(next_event(&mut rx, 1).await.snapshot.host_id);
    }

    assert_eq!(seen.len(), hosts.len());
    assert_eq!(
        t.engine.active_hosts().await.unwrap(),
        hosts.iter().map(|h| h.id).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_every_subscriber_sees_every_snapshot() {
    let host = create_test_host("Cloudflare", "1.1.1.1");
    let t = spawn_test_engine(
        create_test_settings(vec![host.clone()]),
        ScriptedProber::always(ProbeResult::success(10.0)),
    );
    let mut first = t.engine.subscribe();
    let mut second = t.engine.subscribe();

    t.engine.start_monitoring(host.id).await.unwrap();

    for expected in 1..=3u64 {
        assert_eq!(next_event(&mut first, 10).await.snapshot.total_pings, expected);
        assert_eq!(next_event(&mut second, 10).await.snapshot.total_pings, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_served_during_slow_probe() {
    let host = create_test_host("Slow", "1.1.1.1");
    let prober = ScriptedProber::slow(ProbeResult::success(10.0), Duration::from_secs(60));
    let t = spawn_test_engine(create_test_settings(vec![host.clone()]), prober.clone());

    t.engine.start_monitoring(host.id).await.unwrap();
    // let the first probe begin
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(prober.calls().len(), 1);

    let started = Instant::now();
    assert!(t.engine.history(host.id).await.unwrap().is_empty());
    t.engine.stop_monitoring(host.id).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(t.engine.snapshot(host.id).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_slow_host_does_not_delay_others() {
    let slow = create_test_host("Slow", "10.0.0.1");
    let fast = create_test_host("Fast", "10.0.0.2");
    let prober = AddressProber::new(vec![
        ("10.0.0.1", ProbeResult::success(900.0), Duration::from_secs(60)),
        ("10.0.0.2", ProbeResult::success(10.0), Duration::ZERO),
    ]);

    let t = spawn_test_engine(create_test_settings(vec![slow.clone(), fast.clone()]), prober);
    let mut rx = t.engine.subscribe();

    t.engine.start_all().await.unwrap();

    for expected in 1..=4u64 {
        let event = next_event(&mut rx, 10).await;
        assert_eq!(event.snapshot.host_id, fast.id);
        assert_eq!(event.snapshot.total_pings, expected);
    }

    assert_eq!(t.engine.snapshot(slow.id).await.unwrap(), None);
}
