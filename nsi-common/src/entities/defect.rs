//! Object defects (REST)
//!
//! The backend may serve a combined `/object-defects/snapshot`; parts it
//! lacks are fetched from the individual list endpoints.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::Backend;
use crate::collate::sort_by_name_ru;
use crate::directory::{build_lookup, resolve_name, DirectoryLookup, DirectoryOption};
use crate::entities::{map_records, rest_records};
use crate::fields::AliasTable;
use crate::records::find_records;
use crate::value::{normalize_code, normalize_multiline};
use crate::{Error, Result};

pub const OBJECT_DEFECTS_PATH: &str = "/object-defects";
pub const OBJECT_DEFECTS_SNAPSHOT_PATH: &str = "/object-defects/snapshot";
pub const DEFECT_CATEGORIES_PATH: &str = "/object-defect-categories";
pub const DEFECT_STATUSES_PATH: &str = "/object-defect-statuses";
pub const DEFECT_SEVERITIES_PATH: &str = "/object-defect-severities";

pub static DEFECT_ALIASES: AliasTable = AliasTable {
    entity: "defect",
    fields: &[
        ("id", &["id", "ID"]),
        ("name", &["name", "defectName", "title"]),
        ("code", &["code"]),
        ("categoryId", &["categoryId", "category_id"]),
        ("categoryName", &["categoryName", "category_name"]),
        ("statusId", &["statusId", "status_id"]),
        ("statusName", &["statusName", "status_name"]),
        ("severityId", &["severityId", "severity_id"]),
        ("severityName", &["severityName", "severity_name"]),
        ("description", &["description"]),
        ("createdAt", &["createdAt", "created_at"]),
        ("updatedAt", &["updatedAt", "updated_at"]),
    ],
};

pub static DEFECT_DIRECTORY_ALIASES: AliasTable = AliasTable {
    entity: "defect-directory",
    fields: &[
        ("id", &["id", "ID", "code"]),
        ("name", &["name"]),
        ("code", &["code"]),
        ("description", &["description"]),
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedDefect {
    pub id: String,
    pub code: String,
    pub name: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub status_id: Option<String>,
    pub status_name: Option<String>,
    pub severity_id: Option<String>,
    pub severity_name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DefectDirectories {
    pub categories: DirectoryLookup,
    pub statuses: DirectoryLookup,
    pub severities: DirectoryLookup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectsSnapshot {
    pub items: Vec<LoadedDefect>,
    pub categories: Vec<DirectoryOption>,
    pub statuses: Vec<DirectoryOption>,
    pub severities: Vec<DirectoryOption>,
}

/// Body of a create request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectInput {
    pub code: String,
    pub name: String,
    pub category_id: Option<String>,
    pub status_id: Option<String>,
    pub severity_id: Option<String>,
    pub description: Option<String>,
}

/// Body of an update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Map a directory record; entries without any id are dropped
pub fn map_defect_directory(raw: &Value) -> Option<DirectoryOption> {
    let record = DEFECT_DIRECTORY_ALIASES.record(raw);
    let id = record.string("id")?;
    let name = record.string("name").unwrap_or_else(|| id.clone());
    Some(DirectoryOption {
        code: record.string("code"),
        description: record.string("description"),
        ..DirectoryOption::new(id, name)
    })
}

fn directory_options(records: &[Value]) -> Vec<DirectoryOption> {
    let mut options: Vec<DirectoryOption> = records.iter().filter_map(map_defect_directory).collect();
    sort_by_name_ru(&mut options, |option| option.name.as_str());
    options
}

/// Map one raw defect; `None` without id or name
pub fn map_defect(raw: &Value, directories: &DefectDirectories) -> Option<LoadedDefect> {
    let record = DEFECT_ALIASES.record(raw);
    let id = record.string("id")?;
    let name = record.string("name")?;
    let code = record
        .value("code")
        .and_then(normalize_code)
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| id.clone());

    let category_id = record.string("categoryId");
    let status_id = record.string("statusId");
    let severity_id = record.string("severityId");

    Some(LoadedDefect {
        category_name: resolve_name(
            &directories.categories,
            category_id.as_deref(),
            record.string("categoryName"),
        ),
        status_name: resolve_name(
            &directories.statuses,
            status_id.as_deref(),
            record.string("statusName"),
        ),
        severity_name: resolve_name(
            &directories.severities,
            severity_id.as_deref(),
            record.string("severityName"),
        ),
        description: record.value("description").and_then(normalize_multiline),
        created_at: record.string("createdAt"),
        updated_at: record.string("updatedAt"),
        category_id,
        status_id,
        severity_id,
        id,
        code,
        name,
    })
}

/// Part of a combined snapshot, or the dedicated endpoint when missing
async fn snapshot_part(
    backend: &dyn Backend,
    snapshot: Option<&Value>,
    key: &str,
    path: &str,
) -> Result<Vec<Value>> {
    if let Some(records) = snapshot.and_then(|s| s.get(key)).and_then(find_records) {
        return Ok(records.to_vec());
    }
    debug!(part = key, path = path, "Fetching defect snapshot part separately");
    rest_records(backend, path).await
}

/// Fetch defects with categories, statuses and severities
pub async fn fetch_defects_snapshot(backend: &dyn Backend) -> Result<DefectsSnapshot> {
    let snapshot = match backend.get(OBJECT_DEFECTS_SNAPSHOT_PATH, &[]).await {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Combined defect snapshot unavailable");
            None
        }
    };
    let snapshot = snapshot.as_ref();

    let (defects, categories, statuses, severities) = tokio::try_join!(
        snapshot_part(backend, snapshot, "defects", OBJECT_DEFECTS_PATH),
        snapshot_part(backend, snapshot, "categories", DEFECT_CATEGORIES_PATH),
        snapshot_part(backend, snapshot, "statuses", DEFECT_STATUSES_PATH),
        snapshot_part(backend, snapshot, "severities", DEFECT_SEVERITIES_PATH),
    )?;

    let categories = directory_options(&categories);
    let statuses = directory_options(&statuses);
    let severities = directory_options(&severities);
    let directories = DefectDirectories {
        categories: build_lookup(&categories),
        statuses: build_lookup(&statuses),
        severities: build_lookup(&severities),
    };

    let mut items = map_records("defect", &defects, |_, raw| map_defect(raw, &directories));
    sort_by_name_ru(&mut items, |item| item.name.as_str());

    Ok(DefectsSnapshot {
        items,
        categories,
        statuses,
        severities,
    })
}

fn mapped_reply(response: &Value, action: &str) -> Result<LoadedDefect> {
    map_defect(response, &DefectDirectories::default())
        .ok_or_else(|| Error::Decode(format!("{} defect reply has no id or name", action)))
}

pub async fn create_defect(backend: &dyn Backend, input: &DefectInput) -> Result<LoadedDefect> {
    let body = serde_json::to_value(input)?;
    let response = backend.post(OBJECT_DEFECTS_PATH, &body).await?;
    let created = mapped_reply(&response, "created")?;
    info!(id = %created.id, "Defect created");
    Ok(created)
}

pub async fn update_defect(backend: &dyn Backend, id: &str, patch: &DefectPatch) -> Result<LoadedDefect> {
    let body = serde_json::to_value(patch)?;
    let path = format!("{}/{}", OBJECT_DEFECTS_PATH, id);
    let response = backend.put(&path, &body).await?;
    mapped_reply(&response, "updated")
}

pub async fn delete_defect(backend: &dyn Backend, id: &str) -> Result<()> {
    let path = format!("{}/{}", OBJECT_DEFECTS_PATH, id);
    backend.delete(&path).await?;
    info!(id = %id, "Defect deleted");
    Ok(())
}
