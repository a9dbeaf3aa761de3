//! Login flow, current user and permission targets

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::client::Backend;
use crate::{Error, Result};

/// Form-login credentials
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LoginOutcome {
    /// Plain-text `ok`; the session lives in the cookie store
    Accepted,
    /// JSON envelope carrying the user and issued tokens
    Session { user: Value, tokens: Value },
}

/// Submit the login form.
///
/// The body `ok` and a JSON object with both `user` and `tokens` are
/// successes; any other body is an [`Error::Auth`] carrying that body.
pub async fn login(backend: &dyn Backend, credentials: &Credentials) -> Result<LoginOutcome> {
    debug!(username = %credentials.username, "Submitting login form");
    let text = backend
        .post_login_form(&[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ])
        .await?;
    let outcome = interpret_login_response(&text)?;
    info!(username = %credentials.username, "Login accepted");
    Ok(outcome)
}

/// Classify a login response body
pub fn interpret_login_response(text: &str) -> Result<LoginOutcome> {
    let trimmed = text.trim();
    if trimmed == "ok" {
        return Ok(LoginOutcome::Accepted);
    }
    if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(trimmed) {
        if let (Some(user), Some(tokens)) = (map.remove("user"), map.remove("tokens")) {
            if !user.is_null() && !tokens.is_null() {
                return Ok(LoginOutcome::Session { user, tokens });
            }
        }
    }
    if trimmed.is_empty() {
        Err(Error::Auth("unknown login error".to_string()))
    } else {
        Err(Error::Auth(trimmed.to_string()))
    }
}

/// User record of the active session
pub async fn current_user(backend: &dyn Backend) -> Result<Value> {
    let response = backend.rpc("data/getCurUserInfo", Vec::new()).await?;
    Ok(match response {
        Value::Object(mut map) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    })
}

/// Permission targets granted to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    /// Parse a comma-separated target list; blanks are skipped
    pub fn parse_targets(target: Option<&str>) -> Self {
        Self(
            target
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Permissions from a user record's `target` field
    pub fn of_user(user: &Value) -> Self {
        Self::parse_targets(user.get("target").and_then(Value::as_str))
    }

    pub fn can(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn can_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.can(p))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
