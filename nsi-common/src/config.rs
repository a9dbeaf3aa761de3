//! Client configuration loading and resolution
//!
//! Each setting is resolved in priority order:
//! 1. Explicit override (command-line argument)
//! 2. Environment variable
//! 3. TOML config file (`[client]` section)
//! 4. Compiled default

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// Default API base: the edge proxy running locally
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5730/api";
/// Default RPC path relative to the API base (empty = the base itself)
pub const DEFAULT_RPC_PATH: &str = "";
/// Default meta RPC path relative to the API base
pub const DEFAULT_META_RPC_PATH: &str = "meta";
/// Default login path, relative to the origin of the API base
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_BASE: &str = "NSI_API_BASE";
pub const ENV_RPC_PATH: &str = "NSI_RPC_PATH";
pub const ENV_META_RPC_PATH: &str = "NSI_META_RPC_PATH";
pub const ENV_LOGIN_PATH: &str = "NSI_AUTH_LOGIN_PATH";

/// TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientSection,
}

/// `[client]` section of the TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSection {
    pub api_base: Option<String>,
    pub rpc_path: Option<String>,
    pub meta_rpc_path: Option<String>,
    pub login_path: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }
}

/// Values given explicitly by the caller (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_base: Option<String>,
    pub rpc_path: Option<String>,
    pub meta_rpc_path: Option<String>,
    pub login_path: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Explicit config file; when absent the platform locations are probed
    pub config_file: Option<PathBuf>,
}

/// Resolved backend client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Absolute API base URL without trailing slash
    pub base_url: String,
    pub rpc_path: String,
    pub meta_rpc_path: String,
    pub login_path: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            meta_rpc_path: DEFAULT_META_RPC_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Resolve configuration from overrides, environment, TOML file and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let file = match &overrides.config_file {
            Some(path) => TomlConfig::load(path)?,
            None => match find_config_file() {
                Some(path) => {
                    debug!("Loading client config from {}", path.display());
                    match TomlConfig::load(&path) {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring unreadable config file: {}", e);
                            TomlConfig::default()
                        }
                    }
                }
                None => TomlConfig::default(),
            },
        };
        let section = file.client;

        let api_base = pick(overrides.api_base, ENV_API_BASE, section.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let rpc_path = pick(overrides.rpc_path, ENV_RPC_PATH, section.rpc_path)
            .unwrap_or_else(|| DEFAULT_RPC_PATH.to_string());
        let meta_rpc_path = pick(overrides.meta_rpc_path, ENV_META_RPC_PATH, section.meta_rpc_path)
            .unwrap_or_else(|| DEFAULT_META_RPC_PATH.to_string());
        let login_path = pick(overrides.login_path, ENV_LOGIN_PATH, section.login_path)
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        let timeout_secs = overrides
            .timeout_secs
            .or(section.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url: normalize_base_url(&api_base)?,
            rpc_path: rpc_path.trim().to_string(),
            meta_rpc_path: meta_rpc_path.trim().to_string(),
            login_path: login_path.trim().to_string(),
            timeout_secs,
        })
    }

    /// Full URL for a path relative to the API base
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// URL the RPC envelope is posted to
    pub fn rpc_url(&self) -> String {
        self.endpoint(&self.rpc_path)
    }

    /// URL the meta RPC envelope is posted to
    pub fn meta_rpc_url(&self) -> String {
        self.endpoint(&self.meta_rpc_path)
    }

    /// Login URL: absolute paths verbatim, relative ones on the API origin
    pub fn login_url(&self) -> Result<String> {
        resolve_login_url(&self.base_url, &self.login_path)
    }
}

/// Override, then environment variable, then file value; blanks are skipped
fn pick(explicit: Option<String>, env_name: &str, file_value: Option<String>) -> Option<String> {
    let non_blank = |value: String| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    };
    explicit
        .and_then(non_blank)
        .or_else(|| std::env::var(env_name).ok().and_then(non_blank))
        .or_else(|| file_value.and_then(non_blank))
}

/// Platform config file: user config dir first, then `/etc/nsi/config.toml`
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("nsi").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    let system_config = PathBuf::from("/etc/nsi/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }
    None
}

/// Validate an API base URL and strip trailing slashes.
///
/// ```
/// use nsi_common::config::normalize_base_url;
///
/// assert_eq!(normalize_base_url(" https://nsi.example/api// ").unwrap(), "https://nsi.example/api");
/// assert!(normalize_base_url("/api").is_err());
/// ```
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("API base URL is empty".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("API base URL {:?} is not absolute: {}", raw, e)))?;
    if parsed.cannot_be_a_base() {
        return Err(Error::Config(format!("API base URL {:?} cannot be a base", raw)));
    }
    Ok(trimmed.to_string())
}

/// Join a base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// Resolve the login URL against the origin of the API base
pub fn resolve_login_url(base_url: &str, login_path: &str) -> Result<String> {
    let path = login_path.trim();
    if let Ok(absolute) = Url::parse(path) {
        if !absolute.cannot_be_a_base() {
            return Ok(absolute.to_string());
        }
    }
    let base = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("Invalid API base URL {:?}: {}", base_url, e)))?;
    let relative = if path.is_empty() {
        DEFAULT_LOGIN_PATH.to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    base.join(&relative)
        .map(|url| url.to_string())
        .map_err(|e| Error::Config(format!("Invalid login path {:?}: {}", login_path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api", ""), "http://h/api");
        assert_eq!(join_url("http://h/api/", "/rpc"), "http://h/api/rpc");
        assert_eq!(join_url("http://h/api", "object-defects/5"), "http://h/api/object-defects/5");
    }

    #[test]
    fn test_login_url_relative_uses_origin() {
        assert_eq!(
            resolve_login_url("https://nsi.example/api", "/auth/login").unwrap(),
            "https://nsi.example/auth/login"
        );
        assert_eq!(
            resolve_login_url("https://nsi.example/api", "auth/login").unwrap(),
            "https://nsi.example/auth/login"
        );
        assert_eq!(
            resolve_login_url("https://nsi.example/api", "").unwrap(),
            "https://nsi.example/auth/login"
        );
    }

    #[test]
    fn test_login_url_absolute_kept() {
        assert_eq!(
            resolve_login_url("https://nsi.example/api", "https://sso.example/login").unwrap(),
            "https://sso.example/login"
        );
    }

    #[test]
    fn test_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.rpc_url(), "http://127.0.0.1:5730/api");
        assert_eq!(config.meta_rpc_url(), "http://127.0.0.1:5730/api/meta");
        assert_eq!(config.login_url().unwrap(), "http://127.0.0.1:5730/auth/login");
    }
}
