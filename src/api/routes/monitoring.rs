//! Engine-wide monitoring endpoints

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::MonitoringResponse};
use crate::summary::AggregateView;

/// POST /api/v1/monitoring/start
pub async fn start_all(State(state): State<ApiState>) -> ApiResult<Json<MonitoringResponse>> {
    state.engine.start_all().await?;

    Ok(Json(MonitoringResponse {
        active_hosts: state.engine.active_hosts().await?,
    }))
}

/// POST /api/v1/monitoring/stop
pub async fn stop_all(State(state): State<ApiState>) -> ApiResult<Json<MonitoringResponse>> {
    state.engine.stop_all().await?;

    Ok(Json(MonitoringResponse {
        active_hosts: Vec::new(),
    }))
}

/// GET /api/v1/summary
pub async fn get_summary(State(state): State<ApiState>) -> ApiResult<Json<AggregateView>> {
    Ok(Json(state.engine.summary().await?))
}
