//! Settings endpoints

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState};
use crate::config::AppSettings;

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<AppSettings>> {
    Ok(Json(state.engine.get_settings().await?))
}

/// PUT /api/v1/settings
///
/// Replaces the whole document. Running sessions pick up the change without
/// restarting.
pub async fn put_settings(
    State(state): State<ApiState>,
    Json(settings): Json<AppSettings>,
) -> ApiResult<Json<AppSettings>> {
    state.engine.apply_settings(settings).await?;

    Ok(Json(state.engine.get_settings().await?))
}
