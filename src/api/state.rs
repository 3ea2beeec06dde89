//! API shared state

use chrono::{DateTime, Utc};

use crate::actors::EngineHandle;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Handle to the monitoring engine
    pub engine: EngineHandle,

    /// When the API server was started
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }
}
