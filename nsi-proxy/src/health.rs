//! `GET /health`
//!
//! Liveness of the proxy itself. The backend is never contacted; the reply
//! only says whether a backend base is configured, since without one every
//! proxied call fails with 500.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub backend_configured: bool,
}

impl HealthResponse {
    fn for_state(state: &AppState) -> Self {
        Self {
            status: "ok",
            module: "nsi-proxy",
            version: env!("CARGO_PKG_VERSION"),
            backend_configured: state.backend_base.is_some(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::for_state(&state))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
