//! nsi-proxy library - edge reverse proxy for the NSI console
//!
//! Serves the console's `/api` and `/auth` paths from the same origin as the
//! front-end by forwarding them to the NSI backend, so session cookies
//! issued by the backend stay first-party.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::warn;

use nsi_common::config::normalize_base_url;

pub mod cookies;
pub mod error;
pub mod health;
pub mod proxy;

pub use error::{ProxyError, ProxyResult};

/// Upstream request timeout
pub const UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Normalised backend origin; `None` answers every proxied call with 500
    pub backend_base: Option<Arc<str>>,
    /// Upstream HTTP client (no cookie store, redirects passed through)
    pub client: reqwest::Client,
}

impl AppState {
    /// Create application state.
    ///
    /// A blank backend base counts as unset; a malformed one is an error.
    pub fn new(backend_base: Option<String>) -> ProxyResult<Self> {
        let backend_base = match backend_base.filter(|b| !b.trim().is_empty()) {
            Some(base) => Some(Arc::from(normalize_base_url(&base)?)),
            None => {
                warn!("BACKEND_BASE is not set; proxied requests will fail with 500");
                None
            }
        };
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            backend_base,
            client,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::any;

    let proxied = Router::new()
        .route("/api", any(proxy::forward))
        .route("/api/*path", any(proxy::forward))
        .route("/auth/*path", any(proxy::forward))
        .layer(DefaultBodyLimit::max(proxy::MAX_BODY_BYTES));

    Router::new()
        .merge(proxied)
        .merge(health::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
