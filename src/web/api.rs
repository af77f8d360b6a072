//! Axum routes and handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tokio::sync::RwLock;

use crate::kiln::ControlState;
use crate::web::models::{ConfigEcho, SetpointRequest, SetpointResponse, StatusResponse};

/// Shared handles the handlers work against. The snapshot is read-only
/// here; the setpoint is the one value this surface may write.
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<RwLock<ControlState>>,
    pub setpoint: Arc<RwLock<f64>>,
    pub config: ConfigEcho,
}

/// Build the router with all API endpoints.
pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/setpoint", post(set_setpoint))
        .with_state(app)
}

/// The most recently completed control tick, plus the config echo.
async fn get_status(State(app): State<AppState>) -> Json<StatusResponse> {
    let snapshot = app.state.read().await.clone();
    Json(StatusResponse {
        setpoint_c: snapshot.setpoint_c,
        temp_c: snapshot.temp_c,
        duty: snapshot.duty,
        healthy: snapshot.healthy,
        abort: snapshot.abort_reason,
        last_update: snapshot.last_update,
        config: app.config.clone(),
    })
}

/// Replace the target temperature.
///
/// No range validation here: an unreachable setpoint is caught by the
/// safety interlock against measured temperature, not rejected up front.
async fn set_setpoint(
    State(app): State<AppState>,
    Json(request): Json<SetpointRequest>,
) -> Json<SetpointResponse> {
    *app.setpoint.write().await = request.setpoint_c;
    tracing::info!("Setpoint changed to {:.1}C", request.setpoint_c);
    Json(SetpointResponse {
        ok: true,
        setpoint_c: request.setpoint_c,
    })
}
