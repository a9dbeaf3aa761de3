//! Set-Cookie rewriting
//!
//! Cookies issued by the backend carry the backend's domain and often a
//! `SameSite=Lax` or `Strict` policy. Before they reach the browser any
//! `Domain` is replaced with the serving host and `Lax`/`Strict` are removed.
//! `Path=/`, `SameSite=None` and `Secure` are appended when missing.

use axum::http::{header, HeaderMap};

fn attribute_name(attribute: &str) -> String {
    attribute
        .split('=')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn attribute_value(attribute: &str) -> String {
    attribute
        .split_once('=')
        .map(|(_, value)| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Rewrite one `Set-Cookie` value for the serving host.
///
/// ```
/// use nsi_proxy::cookies::rewrite_set_cookie;
///
/// assert_eq!(
///     rewrite_set_cookie("token=abc; Domain=backend.example; SameSite=Lax", "frontend.example"),
///     "token=abc; Domain=frontend.example; Path=/; SameSite=None; Secure"
/// );
/// ```
pub fn rewrite_set_cookie(set_cookie: &str, host: &str) -> String {
    let mut parts = set_cookie.split(';').map(str::trim).filter(|p| !p.is_empty());
    let mut rewritten: Vec<String> = parts.next().map(str::to_string).into_iter().collect();

    for attribute in parts {
        match attribute_name(attribute).as_str() {
            "domain" => continue,
            "samesite" if matches!(attribute_value(attribute).as_str(), "lax" | "strict") => continue,
            _ => rewritten.push(attribute.to_string()),
        }
    }

    if !host.is_empty() {
        rewritten.push(format!("Domain={}", host));
    }
    if !rewritten.iter().skip(1).any(|a| attribute_name(a) == "path") {
        rewritten.push("Path=/".to_string());
    }
    if !rewritten.iter().skip(1).any(|a| attribute_name(a) == "samesite") {
        rewritten.push("SameSite=None".to_string());
    }
    if !rewritten.iter().skip(1).any(|a| attribute_name(a) == "secure") {
        rewritten.push("Secure".to_string());
    }
    rewritten.join("; ")
}

/// Host the browser sees, without port.
///
/// `X-Forwarded-Host` wins over `Host` when the proxy sits behind another one.
pub fn cookie_host(headers: &HeaderMap) -> String {
    let raw = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or_default()
        .trim();
    strip_port(raw).to_string()
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_rewrite_replaces_domain_and_samesite() {
        let rewritten = rewrite_set_cookie(
            "token=abc; Domain=backend.example; SameSite=Lax",
            "frontend.example",
        );
        assert!(rewritten.contains("Domain=frontend.example"));
        assert!(!rewritten.contains("SameSite=Lax"));
        assert!(rewritten.contains("SameSite=None; Secure"));
        assert!(!rewritten.contains("backend.example"));
    }

    #[test]
    fn test_rewrite_keeps_other_attributes() {
        assert_eq!(
            rewrite_set_cookie("sid=1; Path=/; HttpOnly; samesite=STRICT; Max-Age=60", "nsi.example"),
            "sid=1; Path=/; HttpOnly; Max-Age=60; Domain=nsi.example; SameSite=None; Secure"
        );
    }

    #[test]
    fn test_rewrite_adds_domain_when_absent() {
        assert_eq!(
            rewrite_set_cookie("sid=1; Secure; SameSite=None", "nsi.example"),
            "sid=1; Secure; SameSite=None; Domain=nsi.example; Path=/"
        );
    }

    #[test]
    fn test_rewrite_keeps_backend_path() {
        assert_eq!(
            rewrite_set_cookie("sid=1; path=/backend/auth; Secure; SameSite=None", "nsi.example"),
            "sid=1; path=/backend/auth; Secure; SameSite=None; Domain=nsi.example"
        );
    }

    #[test]
    fn test_rewrite_without_host() {
        assert_eq!(
            rewrite_set_cookie("sid=1; Domain=b.example", ""),
            "sid=1; Path=/; SameSite=None; Secure"
        );
    }

    #[test]
    fn test_cookie_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("frontend.example:8080"));
        assert_eq!(cookie_host(&headers), "frontend.example");

        headers.insert("x-forwarded-host", HeaderValue::from_static("nsi.example, inner.local"));
        assert_eq!(cookie_host(&headers), "nsi.example");

        assert_eq!(strip_port("[::1]:5730"), "::1");
        assert_eq!(cookie_host(&HeaderMap::new()), "");
    }
}
