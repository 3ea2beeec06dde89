//! Host registry and per-host monitoring endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;
use uuid::Uuid;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{
        HistoryResponse, HostEntry, HostRequest, HostsResponse, MonitoringResponse,
        SnapshotResponse,
    },
};
use crate::config::HostConfig;

/// GET /api/v1/hosts
pub async fn list_hosts(State(state): State<ApiState>) -> ApiResult<Json<HostsResponse>> {
    let hosts = state.engine.get_hosts().await?;
    let active = state.engine.active_hosts().await?;

    let hosts: Vec<HostEntry> = hosts
        .into_iter()
        .map(|host| HostEntry {
            monitoring: active.contains(&host.id),
            host,
        })
        .collect();

    Ok(Json(HostsResponse {
        total: hosts.len(),
        hosts,
    }))
}

/// POST /api/v1/hosts
///
/// The host gets a fresh id.
pub async fn create_host(
    State(state): State<ApiState>,
    Json(request): Json<HostRequest>,
) -> ApiResult<(StatusCode, Json<HostConfig>)> {
    let host = request.into_host(Uuid::new_v4());
    debug!("API: adding host {}", host.name);

    state.engine.add_host(host.clone()).await?;
    Ok((StatusCode::CREATED, Json(host)))
}

/// PUT /api/v1/hosts/:id
pub async fn update_host(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<HostRequest>,
) -> ApiResult<Json<HostConfig>> {
    let host = request.into_host(id);

    state.engine.update_host(host.clone()).await?;
    Ok(Json(host))
}

/// DELETE /api/v1/hosts/:id
pub async fn delete_host(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.remove_host(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/hosts/:id/start
pub async fn start_host(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MonitoringResponse>> {
    state.engine.start_monitoring(id).await?;

    Ok(Json(MonitoringResponse {
        active_hosts: state.engine.active_hosts().await?,
    }))
}

/// POST /api/v1/hosts/:id/stop
pub async fn stop_host(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MonitoringResponse>> {
    state.engine.stop_monitoring(id).await?;

    Ok(Json(MonitoringResponse {
        active_hosts: state.engine.active_hosts().await?,
    }))
}

/// GET /api/v1/hosts/:id/snapshot
pub async fn get_snapshot(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SnapshotResponse>> {
    let snapshot = state.engine.snapshot(id).await?;

    Ok(Json(SnapshotResponse {
        host_id: id,
        snapshot,
    }))
}

/// GET /api/v1/hosts/:id/history
pub async fn get_history(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HistoryResponse>> {
    let samples = state.engine.history(id).await?;

    Ok(Json(HistoryResponse {
        host_id: id,
        samples,
    }))
}
