//! HTTP implementation of the backend seam

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::client::{decode_envelope, rpc_request, Backend};
use crate::config::ClientConfig;
use crate::value::normalize_string;
use crate::{Error, Result};

const USER_AGENT: &str = concat!("nsi-common/", env!("CARGO_PKG_VERSION"));

/// NSI backend reached over HTTP.
///
/// Keeps a cookie store, so a session established by the login form is sent
/// with every later call made through the same instance.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Create a client for the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn call_rpc(&self, url: String, method: &str, params: Vec<Value>) -> Result<Value> {
        debug!(method = %method, url = %url, "RPC call");
        let request = self
            .http_client
            .post(&url)
            .json(&rpc_request(method, &params));
        let body = send_json(request).await?;
        decode_envelope(method, body)
    }

    async fn rest(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.config.endpoint(path);
        debug!(method = %method, url = %url, "REST call");
        let mut request = self.http_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        send_json(request).await
    }
}

/// Send a request and parse the body.
///
/// Non-success statuses become [`Error::Http`]; bodies that are not JSON are
/// returned as a JSON string so callers can recognise HTML fallbacks.
async fn send_json(request: RequestBuilder) -> Result<Value> {
    let response = request.header(header::ACCEPT, "application/json").send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            message: error_message(&text, status.canonical_reason()),
        });
    }

    Ok(parse_body(&text))
}

/// JSON body, a JSON string for non-JSON text, or null for an empty body
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Human-readable message from an error response body
pub fn error_message(text: &str, reason: Option<&str>) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        let message = ["message", "error", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(normalize_string));
        if let Some(message) = message {
            return message;
        }
    }
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    reason.unwrap_or("request failed").to_string()
}

#[async_trait]
impl Backend for HttpBackend {
    async fn rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.call_rpc(self.config.rpc_url(), method, params).await
    }

    async fn meta_rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.call_rpc(self.config.meta_rpc_url(), method, params).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.config.endpoint(path);
        debug!(url = %url, "REST GET");
        let request = self.http_client.get(&url).query(query);
        send_json(request).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.rest(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.rest(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.rest(Method::DELETE, path, None).await
    }

    async fn post_login_form(&self, fields: &[(&str, &str)]) -> Result<String> {
        let url = self.config.login_url()?;
        debug!(url = %url, "Login form");
        let response = self.http_client.post(&url).form(fields).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Auth(error_message(&text, status.canonical_reason())));
        }
        Ok(text)
    }
}
