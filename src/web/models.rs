//! Data models for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static configuration echoed alongside every status response.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEcho {
    pub max_temp_c: f64,
    pub max_rate_c_per_min: f64,
    pub cycle_time_s: f64,
    pub simulate: bool,
}

/// The latest control snapshot plus the configuration echo.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub setpoint_c: f64,
    pub temp_c: f64,
    pub duty: f64,
    pub healthy: bool,
    pub abort: Option<String>,
    pub last_update: DateTime<Utc>,
    pub config: ConfigEcho,
}

/// Request to replace the current setpoint.
#[derive(Debug, Deserialize)]
pub struct SetpointRequest {
    pub setpoint_c: f64,
}

#[derive(Debug, Serialize)]
pub struct SetpointResponse {
    pub ok: bool,
    pub setpoint_c: f64,
}
