//! Aggregated NSI search
//!
//! The dedicated `/nsi/search` endpoint is tried first. When it fails or
//! answers with something that is not a record list (an HTML page from a
//! static host, an unknown object), the query runs locally over every
//! searchable section in parallel. A failing section contributes nothing;
//! it never aborts the others.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Backend;
use crate::entities::component::list_components;
use crate::entities::defect::fetch_defects_snapshot;
use crate::entities::object_type::fetch_object_types_snapshot;
use crate::entities::parameter::fetch_parameters_snapshot;
use crate::entities::source::load_source_collections;
use crate::entities::NsiSection;
use crate::fields::AliasTable;
use crate::records::find_records;
use crate::value::normalize_text;
use crate::Result;

pub const SEARCH_PATH: &str = "/nsi/search";

/// Results kept per section before merging
pub const PER_SECTION_LIMIT: usize = 20;
/// Results kept overall
pub const TOTAL_LIMIT: usize = 50;

/// Sections searched locally, in result order
pub const FALLBACK_ORDER: [NsiSection; 5] = [
    NsiSection::Sources,
    NsiSection::Types,
    NsiSection::Components,
    NsiSection::Params,
    NsiSection::Defects,
];

static SEARCH_RESULT_ALIASES: AliasTable = AliasTable {
    entity: "search-result",
    fields: &[
        ("id", &["id", "ID"]),
        ("title", &["title", "name"]),
        ("extra", &["extra", "subtitle", "description"]),
        ("type", &["type", "target", "section"]),
    ],
};

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(rename = "type")]
    pub section: NsiSection,
}

impl SearchResult {
    pub fn new(section: NsiSection, id: impl Into<String>, title: impl Into<String>, extra: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            extra,
            section,
        }
    }
}

/// Whether any of the fields contains the already-normalised needle
fn matches(needle: &str, fields: &[Option<&str>]) -> bool {
    fields
        .iter()
        .flatten()
        .any(|field| normalize_text(field).contains(needle))
}

/// Map a record of the dedicated endpoint; unmappable records are dropped
fn map_search_record(raw: &Value) -> Option<SearchResult> {
    let record = SEARCH_RESULT_ALIASES.record(raw);
    let section = record.string("type")?.parse::<NsiSection>().ok()?;
    Some(SearchResult {
        id: record.string("id")?,
        title: record.string("title")?,
        extra: record.string("extra"),
        section,
    })
}

/// Query the dedicated endpoint; `None` when it is unusable
async fn search_remote(backend: &dyn Backend, query: &str) -> Option<Vec<SearchResult>> {
    let response = match backend.get(SEARCH_PATH, &[("q", query.to_string())]).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Search endpoint failed, searching locally");
            return None;
        }
    };
    match find_records(&response) {
        Some(records) => Some(records.iter().filter_map(map_search_record).collect()),
        None => {
            debug!("Search endpoint returned an unrecognised shape, searching locally");
            None
        }
    }
}

async fn search_sources(backend: &dyn Backend, needle: &str) -> Result<Vec<SearchResult>> {
    let items = load_source_collections(backend).await?;
    Ok(items
        .into_iter()
        .filter(|s| matches(needle, &[Some(s.name.as_str()), Some(s.document_number.as_str()), s.author.as_deref()]))
        .map(|s| {
            let extra = Some(s.document_number).filter(|n| !n.is_empty());
            SearchResult::new(NsiSection::Sources, s.id.to_string(), s.name, extra)
        })
        .collect())
}

async fn search_types(backend: &dyn Backend, needle: &str) -> Result<Vec<SearchResult>> {
    let snapshot = fetch_object_types_snapshot(backend).await?;
    Ok(snapshot
        .items
        .into_iter()
        .filter(|t| {
            let geometry = t.geometry.map(|g| g.label());
            let mut fields = vec![Some(t.name.as_str()), geometry];
            fields.extend(t.component_names.iter().map(|n| Some(n.as_str())));
            matches(needle, &fields)
        })
        .map(|t| {
            let extra = t.geometry.map(|g| g.label().to_string());
            SearchResult::new(NsiSection::Types, t.id, t.name, extra)
        })
        .collect())
}

async fn search_components(backend: &dyn Backend, needle: &str) -> Result<Vec<SearchResult>> {
    let items = list_components(backend).await?;
    Ok(items
        .into_iter()
        .filter(|c| matches(needle, &[Some(c.name.as_str())]))
        .map(|c| SearchResult::new(NsiSection::Components, c.id, c.name, None))
        .collect())
}

async fn search_params(backend: &dyn Backend, needle: &str) -> Result<Vec<SearchResult>> {
    let snapshot = fetch_parameters_snapshot(backend).await?;
    Ok(snapshot
        .items
        .into_iter()
        .filter(|p| {
            matches(
                needle,
                &[
                    Some(p.name.as_str()),
                    p.code.as_deref(),
                    p.unit_name.as_deref(),
                    p.source_name.as_deref(),
                ],
            )
        })
        .map(|p| {
            let extra = p.unit_name.or(p.code);
            SearchResult::new(NsiSection::Params, p.id, p.name, extra)
        })
        .collect())
}

async fn search_defects(backend: &dyn Backend, needle: &str) -> Result<Vec<SearchResult>> {
    let snapshot = fetch_defects_snapshot(backend).await?;
    Ok(snapshot
        .items
        .into_iter()
        .filter(|d| matches(needle, &[Some(d.name.as_str()), Some(d.code.as_str()), d.category_name.as_deref()]))
        .map(|d| {
            let extra = d.category_name.or(Some(d.code));
            SearchResult::new(NsiSection::Defects, d.id, d.name, extra)
        })
        .collect())
}

/// Cap each section, concatenate in the given order, cap the total
pub fn aggregate(partials: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = partials
        .into_iter()
        .flat_map(|partial| partial.into_iter().take(PER_SECTION_LIMIT))
        .collect();
    merged.truncate(TOTAL_LIMIT);
    merged
}

/// Search every section locally; failed sections yield no results
pub async fn search_local(backend: &dyn Backend, query: &str) -> Vec<SearchResult> {
    let needle = normalize_text(query);
    if needle.is_empty() {
        return Vec::new();
    }
    let needle = needle.as_str();

    let tasks: Vec<BoxFuture<'_, Result<Vec<SearchResult>>>> = FALLBACK_ORDER
        .iter()
        .map(|section| match section {
            NsiSection::Sources => search_sources(backend, needle).boxed(),
            NsiSection::Types => search_types(backend, needle).boxed(),
            NsiSection::Components => search_components(backend, needle).boxed(),
            NsiSection::Params => search_params(backend, needle).boxed(),
            _ => search_defects(backend, needle).boxed(),
        })
        .collect();

    let partials = join_all(tasks)
        .await
        .into_iter()
        .zip(FALLBACK_ORDER)
        .map(|(outcome, section)| match outcome {
            Ok(results) => results,
            Err(e) => {
                warn!(section = %section, error = %e, "Search section failed");
                Vec::new()
            }
        })
        .collect();

    aggregate(partials)
}

/// Search NSI: the dedicated endpoint when usable, local aggregation otherwise.
///
/// An empty query yields no results and makes no calls.
pub async fn search(backend: &dyn Backend, query: &str) -> Vec<SearchResult> {
    let query = query.trim();
    if normalize_text(query).is_empty() {
        return Vec::new();
    }
    match search_remote(backend, query).await {
        Some(results) => results,
        None => search_local(backend, query).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use serde_json::json;

    fn synthetic(section: NsiSection, count: usize) -> Vec<SearchResult> {
        (0..count)
            .map(|i| SearchResult::new(section, i.to_string(), format!("match {}", i), None))
            .collect()
    }

    #[test]
    fn test_aggregate_caps() {
        let partials = FALLBACK_ORDER.iter().map(|s| synthetic(*s, 30)).collect();
        let merged = aggregate(partials);
        assert_eq!(merged.len(), 50);
        assert!(merged[..20].iter().all(|r| r.section == NsiSection::Sources));
        assert!(merged[20..40].iter().all(|r| r.section == NsiSection::Types));
        assert!(merged[40..].iter().all(|r| r.section == NsiSection::Components));
    }

    #[test]
    fn test_aggregate_small() {
        let merged = aggregate(vec![Vec::new(), synthetic(NsiSection::Params, 3)]);
        assert_eq!(merged.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_calls() {
        let backend = FakeBackend::new();
        assert!(search(&backend, "   ").await.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dedicated_endpoint_used() {
        let backend = FakeBackend::new().with(
            "GET /nsi/search",
            json!([
                {"id": 1, "title": "Рельс", "type": "components"},
                {"id": 2, "title": "Работа", "type": "works", "extra": "план"},
                {"id": 3, "title": "Неизвестно", "type": "jobs"},
            ]),
        );
        let results = search(&backend, "ре").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].extra.as_deref(), Some("план"));
        assert_eq!(backend.calls_to("GET /nsi/search"), vec![json!({"q": "ре"})]);
        assert!(backend.calls_to("data/loadComponents").is_empty());
    }

    #[tokio::test]
    async fn test_html_reply_falls_back_and_settles_all() {
        let backend = FakeBackend::new()
            .with("GET /nsi/search", json!("<!doctype html><html></html>"))
            .with(
                "data/loadSourceCollections",
                json!([{"id": 1, "name": "ГОСТ Рельсы", "DocumentNumber": "Р-1"}]),
            )
            .failing("data/loadObjectTypes", "unsupported")
            .with(
                "data/loadComponents",
                json!([{"id": 5, "name": "Рельс"}, {"id": 6, "name": "Шпала"}]),
            )
            .failing("data/loadParameters", "down")
            .with("GET /object-defects", json!([{"id": 9, "name": "Излом", "code": "rls-1", "categoryName": "Рельсы"}]))
            .with("GET /object-defect-categories", json!([]))
            .with("GET /object-defect-statuses", json!([]))
            .with("GET /object-defect-severities", json!([]));

        let results = search(&backend, "  РЕЛЬС ").await;
        let summary: Vec<(NsiSection, &str)> =
            results.iter().map(|r| (r.section, r.id.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (NsiSection::Sources, "1"),
                (NsiSection::Components, "5"),
                (NsiSection::Defects, "9"),
            ]
        );
        assert_eq!(results[0].extra.as_deref(), Some("Р-1"));
        assert_eq!(results[2].extra.as_deref(), Some("Рельсы"));
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back() {
        let backend = FakeBackend::new()
            .failing("GET /nsi/search", "502")
            .with("data/loadComponents", json!([{"id": 5, "name": "Ёмкость"}]));
        let results = search(&backend, "емкость").await;
        assert_eq!(results, vec![SearchResult::new(NsiSection::Components, "5", "Ёмкость", None)]);
    }

    #[test]
    fn test_matches_normalises_fields() {
        assert!(matches("cafe", &[None, Some("Кафе / Café")]));
        assert!(!matches("x", &[None]));
    }
}
