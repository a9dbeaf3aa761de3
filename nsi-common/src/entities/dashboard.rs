//! NSI dashboard (REST)
//!
//! Coverage and relation counts come back as objects with an optional
//! `partial` flag; diagnostics and activity as either a bare array or
//! `{items, partial}`.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::client::Backend;
use crate::entities::NsiSection;
use crate::value::normalize_string;
use crate::{Error, Result};

pub const COVERAGE_PATH: &str = "/nsi/dashboard/coverage";
pub const DIAGNOSTICS_PATH: &str = "/nsi/dashboard/diagnostics";
pub const ACTIVITY_PATH: &str = "/nsi/dashboard/activity";
pub const RELATIONS_COUNTS_PATH: &str = "/nsi/dashboard/relations-counts";

/// Default number of activity entries
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 7;

/// Ids arrive as strings or numbers
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_string(&value).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourcesCoverage {
    pub total: u64,
    pub with_issuer_date_exec: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypesCoverage {
    pub total: u64,
    pub with_shape: u64,
    pub with_components: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComponentsCoverage {
    pub total: u64,
    pub with_params: u64,
    pub with_defects: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParamsCoverage {
    pub total: u64,
    pub with_units_and_bounds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefectsCoverage {
    pub total: u64,
    pub with_category_and_component: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorksCoverage {
    pub total: u64,
    pub with_type_period_source: u64,
}

/// How completely each section is filled in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coverage {
    pub sources: SourcesCoverage,
    pub types: TypesCoverage,
    pub components: ComponentsCoverage,
    pub params: ParamsCoverage,
    pub defects: DefectsCoverage,
    pub works: WorksCoverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticItem {
    #[serde(deserialize_with = "lenient_string")]
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub count: u64,
    pub severity: DiagnosticSeverity,
    #[serde(default)]
    pub link_query: BTreeMap<String, String>,
    pub target: NsiSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub actor: String,
    pub ts: String,
    pub target: NsiSection,
    #[serde(deserialize_with = "lenient_string")]
    pub target_id: String,
}

/// Item counts per section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsCounts {
    pub sources: u64,
    pub types: u64,
    pub components: u64,
    pub params: u64,
    pub defects: u64,
    pub works: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

/// List response with an optional partial flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

/// Everything the dashboard page shows
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub coverage: Coverage,
    pub diagnostics: ListResponse<DiagnosticItem>,
    pub activity: ListResponse<ActivityItem>,
    pub relations: RelationsCounts,
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(format!("{}: {}", path, e)))
}

/// Normalise a bare array or `{items, partial}` into a [`ListResponse`]
pub fn normalize_list<T: DeserializeOwned>(path: &str, value: Value) -> Result<ListResponse<T>> {
    match value {
        Value::Array(items) => Ok(ListResponse {
            items: decode(path, Value::Array(items))?,
            partial: None,
        }),
        Value::Object(mut map) => {
            let items = match map.remove("items") {
                Some(Value::Null) | None => Vec::new(),
                Some(items) => decode(path, items)?,
            };
            Ok(ListResponse {
                items,
                partial: map.get("partial").and_then(Value::as_bool),
            })
        }
        other => Err(Error::Decode(format!("{}: unexpected list payload {}", path, other))),
    }
}

pub async fn fetch_coverage(backend: &dyn Backend) -> Result<Coverage> {
    decode(COVERAGE_PATH, backend.get(COVERAGE_PATH, &[]).await?)
}

pub async fn fetch_diagnostics(backend: &dyn Backend) -> Result<ListResponse<DiagnosticItem>> {
    normalize_list(DIAGNOSTICS_PATH, backend.get(DIAGNOSTICS_PATH, &[]).await?)
}

pub async fn fetch_activity(backend: &dyn Backend, limit: u32) -> Result<ListResponse<ActivityItem>> {
    let response = backend
        .get(ACTIVITY_PATH, &[("limit", limit.to_string())])
        .await?;
    normalize_list(ACTIVITY_PATH, response)
}

pub async fn fetch_relations_counts(backend: &dyn Backend) -> Result<RelationsCounts> {
    decode(RELATIONS_COUNTS_PATH, backend.get(RELATIONS_COUNTS_PATH, &[]).await?)
}

/// All four dashboard blocks, fetched concurrently
pub async fn fetch_dashboard(backend: &dyn Backend, activity_limit: u32) -> Result<Dashboard> {
    let (coverage, diagnostics, activity, relations) = tokio::try_join!(
        fetch_coverage(backend),
        fetch_diagnostics(backend),
        fetch_activity(backend, activity_limit),
        fetch_relations_counts(backend),
    )?;
    Ok(Dashboard {
        coverage,
        diagnostics,
        activity,
        relations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use serde_json::json;

    fn backend() -> FakeBackend {
        FakeBackend::new()
            .with(
                "GET /nsi/dashboard/coverage",
                json!({"sources": {"total": 4, "withIssuerDateExec": 3}, "params": {"total": 10}, "partial": true}),
            )
            .with(
                "GET /nsi/dashboard/diagnostics",
                json!([{"code": 17, "title": "Параметры без единиц", "count": 3, "severity": "warning",
                        "linkQuery": {"filter": "noUnit"}, "target": "params"}]),
            )
            .with(
                "GET /nsi/dashboard/activity",
                json!({"items": [{"id": 1, "title": "Изменён дефект", "actor": "ivanov",
                                  "ts": "2024-05-01T10:00:00Z", "target": "defects", "targetId": 201}],
                       "partial": false}),
            )
            .with("GET /nsi/dashboard/relations-counts", json!({"sources": 4, "works": 1}))
    }

    #[tokio::test]
    async fn test_fetch_dashboard() {
        let backend = backend();
        let dashboard = fetch_dashboard(&backend, DEFAULT_ACTIVITY_LIMIT).await.unwrap();

        assert_eq!(dashboard.coverage.sources.with_issuer_date_exec, 3);
        assert_eq!(dashboard.coverage.params.total, 10);
        assert_eq!(dashboard.coverage.types, TypesCoverage::default());
        assert_eq!(dashboard.coverage.partial, Some(true));

        assert_eq!(dashboard.diagnostics.items[0].code, "17");
        assert_eq!(dashboard.diagnostics.items[0].target, NsiSection::Params);
        assert_eq!(dashboard.diagnostics.partial, None);

        assert_eq!(dashboard.activity.items[0].target_id, "201");
        assert_eq!(dashboard.activity.partial, Some(false));

        assert_eq!(dashboard.relations.sources, 4);
        assert_eq!(dashboard.relations.partial, None);

        assert_eq!(
            backend.calls_to("GET /nsi/dashboard/activity"),
            vec![json!({"limit": "7"})]
        );
    }

    #[test]
    fn test_normalize_list_shapes() {
        let list: ListResponse<ActivityItem> = normalize_list("x", json!({"partial": true})).unwrap();
        assert!(list.items.is_empty());
        assert_eq!(list.partial, Some(true));

        assert!(normalize_list::<ActivityItem>("x", json!("<html>")).is_err());
        assert!(normalize_list::<DiagnosticItem>("x", json!([{"title": "no code"}])).is_err());
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let backend = backend().failing("GET /nsi/dashboard/coverage", "boom");
        assert!(fetch_dashboard(&backend, 3).await.is_err());
    }
}
