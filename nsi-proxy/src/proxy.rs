//! Request forwarding to the NSI backend
//!
//! `/api/<rest>` goes to `<BACKEND_BASE>/<rest>`, `/auth/<rest>` to
//! `<BACKEND_BASE>/auth/<rest>`. Method, query and body pass through; the
//! upstream status and body come back unchanged.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use url::Url;

use nsi_common::config::join_url;

use crate::cookies::{cookie_host, rewrite_set_cookie};
use crate::error::{ProxyError, ProxyResult};
use crate::AppState;

/// Largest request body forwarded upstream
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Connection-scoped headers never forwarded in either direction
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header belongs to one connection only.
///
/// Names listed in the message's own `Connection` header count too.
fn is_hop_by_hop(name: &HeaderName, headers: &HeaderMap) -> bool {
    let name = name.as_str();
    if HOP_BY_HOP.contains(&name) {
        return true;
    }
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case(name))
}

/// Backend-relative path for an incoming request path.
///
/// ```
/// use nsi_proxy::proxy::upstream_path;
///
/// assert_eq!(upstream_path("/api/object-defects/5"), "object-defects/5");
/// assert_eq!(upstream_path("/auth/login"), "auth/login");
/// assert_eq!(upstream_path("/api"), "");
/// ```
pub fn upstream_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api") {
        if rest.is_empty() || rest.starts_with('/') {
            return rest.trim_start_matches('/').to_string();
        }
    }
    if let Some(rest) = path.strip_prefix("/auth") {
        if rest.is_empty() || rest.starts_with('/') {
            return format!("auth/{}", rest.trim_start_matches('/'));
        }
    }
    path.trim_start_matches('/').to_string()
}

/// Full upstream URL, query string included
pub fn upstream_url(backend_base: &str, path: &str, query: Option<&str>) -> String {
    let target = join_url(backend_base, &upstream_path(path));
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}?{}", target, query),
        None => target,
    }
}

/// Headers sent upstream: hop-by-hop and `Host` dropped, origin and referer
/// set to the backend origin
fn upstream_headers(incoming: &HeaderMap, backend_origin: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        if name == header::HOST || name == header::CONTENT_LENGTH || is_hop_by_hop(name, incoming) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if let Some(origin) = backend_origin {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("{}/", origin)) {
            headers.insert(header::REFERER, value);
        }
    }
    headers
}

/// Headers returned to the client: hop-by-hop dropped, cookies rewritten for
/// the serving host, credentialed CORS for the serving origin
fn downstream_headers(upstream: &HeaderMap, incoming: &HeaderMap) -> HeaderMap {
    let host = cookie_host(incoming);
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if name == header::CONTENT_LENGTH || is_hop_by_hop(name, upstream) {
            continue;
        }
        if name == header::SET_COOKIE {
            let rewritten = value
                .to_str()
                .ok()
                .map(|cookie| rewrite_set_cookie(cookie, &host))
                .and_then(|cookie| HeaderValue::from_str(&cookie).ok());
            match rewritten {
                Some(cookie) => headers.append(header::SET_COOKIE, cookie),
                None => headers.append(header::SET_COOKIE, value.clone()),
            };
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(origin) = serving_origin(incoming) {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
    headers
}

/// `scheme://host[:port]` the browser used to reach the proxy
fn serving_origin(incoming: &HeaderMap) -> Option<String> {
    let host = incoming
        .get("x-forwarded-host")
        .or_else(|| incoming.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let scheme = incoming
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    Some(format!("{}://{}", scheme, host))
}

/// Forward one request to the backend.
///
/// Handles every method under `/api` and `/auth`.
pub async fn forward(State(state): State<AppState>, request: Request) -> ProxyResult<Response> {
    let backend_base = state.backend_base.as_deref().ok_or(ProxyError::Unconfigured)?;

    let (parts, body) = request.into_parts();
    let target = upstream_url(backend_base, parts.uri.path(), parts.uri.query());
    let backend_origin = Url::parse(backend_base)
        .ok()
        .map(|url| url.origin().ascii_serialization());

    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        None
    } else {
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| ProxyError::BadRequest(format!("unreadable request body: {}", e)))?;
        Some(bytes)
    };

    debug!(method = %parts.method, upstream = %target, "Forwarding request");
    let mut upstream = state
        .client
        .request(parts.method.clone(), &target)
        .headers(upstream_headers(&parts.headers, backend_origin.as_deref()));
    if let Some(bytes) = body {
        upstream = upstream.body(bytes);
    }

    let response = upstream.send().await.map_err(|e| {
        warn!(upstream = %target, error = %e, "Upstream request failed");
        ProxyError::BadGateway(e.to_string())
    })?;

    let status = response.status();
    let headers = downstream_headers(response.headers(), &parts.headers);
    let bytes = response.bytes().await.map_err(|e| {
        warn!(upstream = %target, error = %e, "Upstream body unreadable");
        ProxyError::BadGateway(e.to_string())
    })?;
    debug!(status = %status, bytes = bytes.len(), "Upstream responded");

    Ok((status, headers, Body::from(bytes)).into_response())
}
