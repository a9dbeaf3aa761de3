//! nsi-cli library - operator console for the NSI backend
//!
//! Every command runs against a [`Backend`] and yields a JSON value; the
//! binary prints it. Credentials, when given, open a session first.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use nsi_common::auth::{current_user, login, Credentials, Permissions};
use nsi_common::config::{ClientConfig, ConfigOverrides};
use nsi_common::entities::component::ComponentRepository;
use nsi_common::entities::dashboard::{fetch_dashboard, DEFAULT_ACTIVITY_LIMIT};
use nsi_common::entities::defect::fetch_defects_snapshot;
use nsi_common::entities::object_type::fetch_object_types_snapshot;
use nsi_common::entities::parameter::fetch_parameters_snapshot;
use nsi_common::entities::source::fetch_sources_snapshot;
use nsi_common::search::search;
use nsi_common::store::MemoryComponentStore;
use nsi_common::Backend;

/// Command-line interface
#[derive(Parser, Debug)]
#[command(name = "nsi-cli")]
#[command(about = "Operator console for the NSI reference-data backend")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Backend connection and session options
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// API base URL (overrides NSI_API_BASE and the config file)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Explicit TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Login name; with a password, a session is opened before the command
    #[arg(long, global = true, env = "NSI_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "NSI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Resolve the client configuration
    pub fn client_config(&self) -> nsi_common::Result<ClientConfig> {
        ClientConfig::resolve(ConfigOverrides {
            api_base: self.api_base.clone(),
            timeout_secs: self.timeout,
            config_file: self.config.clone(),
            ..Default::default()
        })
    }

    /// Credentials when both name and password are present
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.trim().is_empty() => Some(Credentials {
                username: username.trim().to_string(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit the login form and print the outcome
    Login,
    /// Print the session user and its permissions
    Whoami,
    /// Print one section snapshot
    Snapshot {
        #[arg(value_enum)]
        kind: SnapshotKind,
    },
    /// Print the dashboard blocks
    Dashboard {
        /// Number of activity entries
        #[arg(long, default_value_t = DEFAULT_ACTIVITY_LIMIT)]
        activity_limit: u32,
    },
    /// Search every section
    Search { query: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Parameters,
    Defects,
    Components,
    ObjectTypes,
    Sources,
}

/// Run one command, opening a session first when credentials are given
pub async fn execute(
    backend: Arc<dyn Backend>,
    credentials: Option<&Credentials>,
    command: &Command,
) -> Result<Value> {
    if *command == Command::Login {
        let Some(credentials) = credentials else {
            bail!("login needs --username and --password (or NSI_USERNAME / NSI_PASSWORD)");
        };
        let outcome = login(backend.as_ref(), credentials).await?;
        return Ok(serde_json::to_value(outcome)?);
    }

    if let Some(credentials) = credentials {
        login(backend.as_ref(), credentials)
            .await
            .context("opening session")?;
    }

    let output = match command {
        Command::Login => Value::Null,
        Command::Whoami => {
            let user = current_user(backend.as_ref()).await?;
            let permissions = Permissions::of_user(&user);
            json!({ "user": user, "permissions": permissions })
        }
        Command::Snapshot { kind } => snapshot(backend, *kind).await?,
        Command::Dashboard { activity_limit } => {
            serde_json::to_value(fetch_dashboard(backend.as_ref(), *activity_limit).await?)?
        }
        Command::Search { query } => {
            let results = search(backend.as_ref(), query).await;
            info!(count = results.len(), "Search finished");
            serde_json::to_value(results)?
        }
    };
    Ok(output)
}

async fn snapshot(backend: Arc<dyn Backend>, kind: SnapshotKind) -> Result<Value> {
    let value = match kind {
        SnapshotKind::Parameters => {
            serde_json::to_value(fetch_parameters_snapshot(backend.as_ref()).await?)?
        }
        SnapshotKind::Defects => serde_json::to_value(fetch_defects_snapshot(backend.as_ref()).await?)?,
        SnapshotKind::Components => {
            let repository = ComponentRepository::new(backend, MemoryComponentStore::empty());
            serde_json::to_value(repository.snapshot().await)?
        }
        SnapshotKind::ObjectTypes => {
            serde_json::to_value(fetch_object_types_snapshot(backend.as_ref()).await?)?
        }
        SnapshotKind::Sources => serde_json::to_value(fetch_sources_snapshot(backend.as_ref()).await?)?,
    };
    Ok(value)
}
