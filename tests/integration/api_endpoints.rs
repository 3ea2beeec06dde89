//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Host and settings endpoints drive the engine
//! - Engine errors map to the right status codes
//! - Authentication middleware functions properly

use std::net::SocketAddr;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use ping_monitor::{
    api::{ApiConfig, ApiState, router, spawn_api_server},
    config::HostConfig,
    probe::ProbeResult,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::helpers::*;

const TOKEN: &str = "test-token";

fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    }
}

async fn spawn_test_api(hosts: Vec<HostConfig>) -> (SocketAddr, TestEngine) {
    let t = spawn_test_engine(
        create_test_settings(hosts),
        ScriptedProber::always(ProbeResult::success(15.0)),
    );

    let addr = spawn_api_server(test_config(), ApiState::new(t.engine.clone()))
        .await
        .unwrap();

    (addr, t)
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_health_without_token() {
    let (addr, _t) = spawn_test_api(vec![]).await;

    let response = client()
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_auth_is_required() {
    let (addr, _t) = spawn_test_api(vec![]).await;
    let url = format!("http://{addr}/api/v1/hosts");

    let missing = client().get(&url).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);

    let wrong = client().get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), reqwest::StatusCode::FORBIDDEN);

    let ok = client().get(&url).bearer_auth(TOKEN).send().await.unwrap();
    assert_eq!(ok.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_host_crud() {
    let (addr, t) = spawn_test_api(vec![]).await;
    let base = format!("http://{addr}/api/v1");

    let created = client()
        .post(format!("{base}/hosts"))
        .bearer_auth(TOKEN)
        .json(&json!({
            "name": "Cloudflare",
            "address": "1.1.1.1",
            "display_rules": [
                { "condition": "less", "threshold": 50.0, "label": "P2P" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);

    let host: HostConfig = created.json().await.unwrap();
    assert_eq!(host.name, "Cloudflare");
    assert_eq!(host.display_rules.len(), 1);
    assert!(host.display_rules[0].enabled);
    assert_eq!(t.engine.get_hosts().await.unwrap(), vec![host.clone()]);

    let list: Value = client()
        .get(format!("{base}/hosts"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
    assert_eq!(list["hosts"][0]["name"], "Cloudflare");
    assert_eq!(list["hosts"][0]["monitoring"], false);

    let updated = client()
        .put(format!("{base}/hosts/{}", host.id))
        .bearer_auth(TOKEN)
        .json(&json!({ "name": "One", "address": "1.0.0.1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), reqwest::StatusCode::OK);
    assert_eq!(t.engine.get_hosts().await.unwrap()[0].name, "One");

    let deleted = client()
        .delete(format!("{base}/hosts/{}", host.id))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(t.engine.get_hosts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_monitoring_endpoints() {
    let host = create_test_host("Cloudflare", "1.1.1.1");
    let (addr, t) = spawn_test_api(vec![host.clone()]).await;
    let base = format!("http://{addr}/api/v1");
    let mut rx = t.engine.subscribe();

    let started: Value = client()
        .post(format!("{base}/hosts/{}/start", host.id))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["active_hosts"], json!([host.id]));

    next_event(&mut rx, 5).await;

    let snapshot: Value = client()
        .get(format!("{base}/hosts/{}/snapshot", host.id))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["snapshot"]["current"], 15.0);
    assert_eq!(snapshot["snapshot"]["status"], "good");

    let history: Value = client()
        .get(format!("{base}/hosts/{}/history", host.id))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!history["samples"].as_array().unwrap().is_empty());

    let summary: Value = client()
        .get(format!("{base}/summary"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["title"], "15ms");

    let stopped: Value = client()
        .post(format!("{base}/monitoring/stop"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stopped["active_hosts"], json!([]));
    assert!(t.engine.active_hosts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_endpoints() {
    let (addr, t) = spawn_test_api(vec![]).await;
    let url = format!("http://{addr}/api/v1/settings");

    let mut settings: Value = client()
        .get(&url)
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["ping_interval"], 5);

    settings["ping_interval"] = json!(15);
    settings["display_strategy"] = json!("fastest");

    let response = client()
        .put(&url)
        .bearer_auth(TOKEN)
        .json(&settings)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(t.engine.get_settings().await.unwrap().ping_interval, 15);

    settings["ping_interval"] = json!(0);
    let rejected = client()
        .put(&url)
        .bearer_auth(TOKEN)
        .json(&settings)
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(t.engine.get_settings().await.unwrap().ping_interval, 15);
}

// The remaining tests drive the router directly, without a socket

fn test_router(t: &TestEngine) -> axum::Router {
    router(&test_config(), ApiState::new(t.engine.clone()))
}

fn authorized(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

async fn error_of(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let t = spawn_test_engine(
        create_test_settings(vec![]),
        ScriptedProber::always(ProbeResult::success(15.0)),
    );
    let id = Uuid::new_v4();

    for (method, path) in [
        ("GET", format!("/api/v1/hosts/{id}/snapshot")),
        ("GET", format!("/api/v1/hosts/{id}/history")),
        ("POST", format!("/api/v1/hosts/{id}/start")),
        ("DELETE", format!("/api/v1/hosts/{id}")),
    ] {
        let response = test_router(&t)
            .oneshot(authorized(method, &path, Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {path}");
        assert!(error_of(response).await.contains(&id.to_string()));
    }
}

#[tokio::test]
async fn test_invalid_host_is_bad_request() {
    let t = spawn_test_engine(
        create_test_settings(vec![]),
        ScriptedProber::always(ProbeResult::success(15.0)),
    );
    let body = json!({ "name": "Flag", "address": "--help" }).to_string();

    let response = test_router(&t)
        .oneshot(authorized("POST", "/api/v1/hosts", Body::from(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_of(response).await.contains("--help"));
    assert!(t.engine.get_hosts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let t = spawn_test_engine(
        create_test_settings(vec![]),
        ScriptedProber::always(ProbeResult::success(15.0)),
    );
    t.backend.set_fail_writes(true);
    let body = json!({ "name": "Cloudflare", "address": "1.1.1.1" }).to_string();

    let response = test_router(&t)
        .oneshot(authorized("POST", "/api/v1/hosts", Body::from(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_stopped_engine_is_unavailable() {
    let t = spawn_test_engine(
        create_test_settings(vec![]),
        ScriptedProber::always(ProbeResult::success(15.0)),
    );
    let app = test_router(&t);
    t.engine.shutdown().await.unwrap();

    let response = app
        .clone()
        .oneshot(authorized("GET", "/api/v1/hosts", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = to_bytes(health.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "degraded");
}
