//! Object parameters (RPC)
//!
//! Parameters carry a unit of measure and a source collection, both
//! resolved through directories fetched alongside the parameter list. The
//! component association comes from the optional relation enrichment in
//! [`crate::relations`].

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::Backend;
use crate::collate::sort_by_name_ru;
use crate::directory::{
    build_lookup, resolve_name, sort_options, to_directory_options, DirectoryLookup,
    DirectoryOption,
};
use crate::entities::{map_records, optional_records, rpc_records};
use crate::fields::AliasTable;
use crate::records::first_record;
use crate::relations::{ParameterLinks, RelationPayload};
use crate::value::normalize_integer;
use crate::{Error, Result};

/// Relation type linking parameters to components
pub const PARAMS_COMPONENT_REL_TYPE: &str = "RT_ParamsComponent";

pub static PARAMETER_ALIASES: AliasTable = AliasTable {
    entity: "parameter",
    fields: &[
        ("id", &["id", "parameterId", "parameter_id"]),
        ("name", &["name", "parameterName", "parameter_name", "title"]),
        ("code", &["code", "parameterCode", "mnemo", "mnemonic"]),
        ("valueType", &["valueType", "value_type", "type", "dataType", "data_type"]),
        ("unitId", &["unitId", "unit_id", "measureId", "measure_id", "unit", "measure"]),
        ("unitName", &["unitName", "unit_name", "measureName", "measure_name"]),
        (
            "sourceId",
            &["sourceId", "source_id", "collectionId", "collection_id", "collection", "source"],
        ),
        (
            "sourceName",
            &["sourceName", "source_name", "collectionName", "collection_name"],
        ),
        ("minValue", &["minValue", "min_value", "min"]),
        ("maxValue", &["maxValue", "max_value", "max"]),
        ("isRequired", &["isRequired", "required", "is_required", "mandatory"]),
        ("note", &["note", "comment", "description", "remark"]),
    ],
};

const UNIT_ID_KEYS: &[&str] = &["id", "measureId", "measure_id", "unitId", "unit_id"];
const UNIT_NAME_KEYS: &[&str] = &["name", "shortName", "short_name", "fullName", "full_name", "caption", "title"];
const SOURCE_ID_KEYS: &[&str] = &["id", "collectionId", "collection_id", "sourceId", "source_id"];
const SOURCE_NAME_KEYS: &[&str] = &["name", "caption", "title", "description"];

/// Parameter with resolved unit, source and component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedParameter {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub value_type: String,
    pub unit_id: Option<String>,
    pub unit_name: Option<String>,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub is_required: bool,
    pub note: Option<String>,
    pub component_id: Option<String>,
    pub component_name: Option<String>,
    pub relation_id: Option<String>,
    pub limit_min: Option<f64>,
    pub limit_max: Option<f64>,
    pub limit_comment: Option<String>,
}

/// Directories a parameter is resolved against
#[derive(Debug, Clone, Default)]
pub struct ParameterDirectories {
    pub units: DirectoryLookup,
    pub sources: DirectoryLookup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersSnapshot {
    pub items: Vec<LoadedParameter>,
    pub units: Vec<DirectoryOption>,
    pub sources: Vec<DirectoryOption>,
    pub unit_directory: DirectoryLookup,
    pub source_directory: DirectoryLookup,
}

/// Map one raw parameter; `None` without id or name
pub fn map_parameter(
    raw: &Value,
    directories: &ParameterDirectories,
    links: &ParameterLinks,
) -> Option<LoadedParameter> {
    let record = PARAMETER_ALIASES.record(raw);
    let id = record.string("id")?;
    let name = record.string("name")?;

    let unit_id = record.string("unitId");
    let source_id = record.string("sourceId");
    let unit_name = resolve_name(&directories.units, unit_id.as_deref(), record.string("unitName"));
    let source_name = resolve_name(
        &directories.sources,
        source_id.as_deref(),
        record.string("sourceName"),
    );

    let link = links.link_for(&id, &name, unit_name.as_deref());

    Some(LoadedParameter {
        code: record.string("code"),
        value_type: record.string("valueType").unwrap_or_else(|| "string".to_string()),
        unit_id,
        unit_name,
        source_id,
        source_name,
        min_value: record.number("minValue"),
        max_value: record.number("maxValue"),
        is_required: record.flag("isRequired"),
        note: record.string("note"),
        component_id: link.component_id,
        component_name: link.component_name,
        relation_id: link.relation_id,
        limit_min: link.limit_min,
        limit_max: link.limit_max,
        limit_comment: link.limit_comment,
        id,
        name,
    })
}

/// Relation type id from a `data/getIdRelTyp` reply (bare number or record)
fn relation_type_id(response: &Value) -> Option<i64> {
    normalize_integer(response).or_else(|| {
        let record = first_record(response).unwrap_or(response);
        record.get("id").and_then(normalize_integer)
    })
}

/// Fetch the parameter↔component relation data.
///
/// The relation type id must be known before the relation, component and
/// limit lists can be requested; those three then run concurrently. Any
/// failure yields empty parts.
pub async fn load_relation_payload(backend: &dyn Backend) -> RelationPayload {
    let rel_typ = match backend
        .rpc("data/getIdRelTyp", vec![json!(PARAMS_COMPONENT_REL_TYPE)])
        .await
    {
        Ok(response) => match relation_type_id(&response) {
            Some(id) => id,
            None => {
                warn!("data/getIdRelTyp returned no id, skipping component relations");
                return RelationPayload::default();
            }
        },
        Err(e) => {
            warn!(error = %e, "Relation type lookup failed, skipping component relations");
            return RelationPayload::default();
        }
    };

    let (relations, components, limits) = tokio::join!(
        optional_records(
            "data/loadParamsComponent",
            rpc_records(backend, "data/loadParamsComponent", vec![json!(rel_typ)]),
        ),
        optional_records(
            "data/loadComponents",
            rpc_records(backend, "data/loadComponents", vec![json!(0)]),
        ),
        optional_records(
            "data/loadParamsComponentLimits",
            rpc_records(backend, "data/loadParamsComponentLimits", vec![json!(rel_typ)]),
        ),
    );

    RelationPayload {
        relations,
        components,
        limits,
    }
}

/// Fetch parameters with units, sources and component relations.
///
/// Units, sources and parameters are required; the relation enrichment is
/// optional and never fails the snapshot.
pub async fn fetch_parameters_snapshot(backend: &dyn Backend) -> Result<ParametersSnapshot> {
    let enrichment = async { Ok::<_, Error>(load_relation_payload(backend).await) };
    let (measures, collections, parameters, relation_payload) = tokio::try_join!(
        rpc_records(backend, "data/loadMeasure", Vec::new()),
        rpc_records(backend, "data/loadCollections", Vec::new()),
        rpc_records(backend, "data/loadParameters", Vec::new()),
        enrichment,
    )?;

    let units = to_directory_options(&measures, "unit", UNIT_ID_KEYS, UNIT_NAME_KEYS);
    let sources = to_directory_options(&collections, "source", SOURCE_ID_KEYS, SOURCE_NAME_KEYS);
    let directories = ParameterDirectories {
        units: build_lookup(&units),
        sources: build_lookup(&sources),
    };

    let links = ParameterLinks::stitch(&parameters, &relation_payload);
    debug!(linked = links.linked_count(), "Parameter relations stitched");

    let mut items = map_records("parameter", &parameters, |_, raw| {
        map_parameter(raw, &directories, &links)
    });
    sort_by_name_ru(&mut items, |item| item.name.as_str());

    Ok(ParametersSnapshot {
        items,
        units: sort_options(units),
        sources: sort_options(sources),
        unit_directory: directories.units,
        source_directory: directories.sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn base_backend() -> FakeBackend {
        FakeBackend::new()
            .with(
                "data/loadMeasure",
                json!([{"id": 1, "shortName": "мм"}, {"measure_id": 2, "name": "°C"}, {"caption": "без id"}]),
            )
            .with("data/loadCollections", json!({"records": [{"id": 7, "name": "ГОСТ 1"}]}))
            .with(
                "data/loadParameters",
                json!({"result": {"records": [
                    {"id": 11, "cls": 1041, "name": "Износ", "unitId": 1, "sourceId": 7, "min_value": "0,5", "max": 12, "required": "yes"},
                    {"id": 12, "cls": 1041, "name": "Температура", "measure": 2, "type": "number"},
                    {"id": 13, "name": "Давление", "unitId": 99, "unitName": "МПа"},
                    {"id": 14},
                    {"name": "без id"},
                ]}}),
            )
    }

    #[tokio::test]
    async fn test_snapshot_without_enrichment() {
        let backend = base_backend().failing("data/getIdRelTyp", "unsupported");
        let snapshot = fetch_parameters_snapshot(&backend).await.unwrap();

        let names: Vec<&str> = snapshot.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Давление", "Износ", "Температура"]);

        let wear = &snapshot.items[1];
        assert_eq!(wear.unit_name.as_deref(), Some("мм"));
        assert_eq!(wear.source_name.as_deref(), Some("ГОСТ 1"));
        assert_eq!(wear.min_value, Some(0.5));
        assert_eq!(wear.max_value, Some(12.0));
        assert!(wear.is_required);
        assert_eq!(wear.value_type, "string");
        assert_eq!(wear.component_name, None);

        let temperature = &snapshot.items[2];
        assert_eq!(temperature.unit_id.as_deref(), Some("2"));
        assert_eq!(temperature.unit_name.as_deref(), Some("°C"));
        assert_eq!(temperature.value_type, "number");

        // directory miss falls back to the inline name
        assert_eq!(snapshot.items[0].unit_name.as_deref(), Some("МПа"));

        assert_eq!(snapshot.units.len(), 3);
        assert!(snapshot.unit_directory.contains("unit-2"));
        assert!(backend.calls_to("data/loadParamsComponent").is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_with_relations() {
        let backend = base_backend()
            .with("data/getIdRelTyp", json!({"result": [{"id": 555}]}))
            .with(
                "data/loadParamsComponent",
                json!([
                    {"idro": 1, "idrom1": 11, "clsrom1": 1041, "idrom2": 3, "clsrom2": 1027},
                    {"name": "Температура, °C<=>Котёл"},
                ]),
            )
            .with("data/loadComponents", json!([{"id": 3, "cls": 1027, "name": "Рельс"}]))
            .failing("data/loadParamsComponentLimits", "no limits");

        let snapshot = fetch_parameters_snapshot(&backend).await.unwrap();
        let wear = snapshot.items.iter().find(|p| p.id == "11").unwrap();
        assert_eq!(wear.component_name.as_deref(), Some("Рельс"));
        assert_eq!(wear.relation_id.as_deref(), Some("1"));
        assert_eq!(wear.limit_min, None);

        let temperature = snapshot.items.iter().find(|p| p.id == "12").unwrap();
        assert_eq!(temperature.component_name.as_deref(), Some("Котёл"));

        assert_eq!(backend.calls_to("data/loadParamsComponent"), vec![json!([555])]);
        assert_eq!(backend.calls_to("data/getIdRelTyp"), vec![json!(["RT_ParamsComponent"])]);
    }

    #[tokio::test]
    async fn test_primary_failure_fails_snapshot() {
        let backend = base_backend().failing("data/loadParameters", "down");
        let err = fetch_parameters_snapshot(&backend).await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }

    #[test]
    fn test_mapper_drop_rule() {
        let directories = ParameterDirectories::default();
        let links = ParameterLinks::default();
        assert!(map_parameter(&json!({}), &directories, &links).is_none());
        assert!(map_parameter(&json!({"id": "5"}), &directories, &links).is_none());
        assert!(map_parameter(&json!({"id": "5", "name": "X"}), &directories, &links).is_some());
    }

    #[test]
    fn test_float_unit_id_joins_integer_directory() {
        let units = to_directory_options(&[json!({"id": 1, "name": "мм"})], "unit", &["id"], &["name"]);
        let directories = ParameterDirectories {
            units: build_lookup(&units),
            ..Default::default()
        };
        let parameter = map_parameter(
            &json!({"id": 5.0, "name": "X", "unitId": 1.0}),
            &directories,
            &ParameterLinks::default(),
        )
        .unwrap();
        assert_eq!(parameter.id, "5");
        assert_eq!(parameter.unit_id.as_deref(), Some("1"));
        assert_eq!(parameter.unit_name.as_deref(), Some("мм"));
    }

    #[test]
    fn test_relation_type_id_shapes() {
        assert_eq!(relation_type_id(&json!(42)), Some(42));
        assert_eq!(relation_type_id(&json!("42")), Some(42));
        assert_eq!(relation_type_id(&json!({"id": 43})), Some(43));
        assert_eq!(relation_type_id(&json!({"records": [{"id": 44}]})), Some(44));
        assert_eq!(relation_type_id(&json!([])), None);
    }
}
