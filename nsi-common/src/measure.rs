//! Unit-of-measure creation through the meta API
//!
//! A new measure is inserted, then marked as an allowed value of the
//! reference property that feeds the parameter unit picker.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::Backend;
use crate::records::{extract_records, first_record};
use crate::value::{normalize_integer, parse_flag, trimmed_string};
use crate::{Error, Result};

/// Reference property listing the selectable measures
pub const MEASURE_REF_PROP_ID: i64 = 1105;

/// Created measure as offered to the parameter form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasureOption {
    pub id: i64,
    pub pv: i64,
    pub name: String,
}

/// Insert a measure and return the created record
pub async fn insert_measure(backend: &dyn Backend, name: &str) -> Result<Value> {
    let payload = json!({
        "rec": {
            "id": 0,
            "cod": "",
            "accessLevel": 1,
            "kFromBase": 1,
            "name": name,
            "fullName": name,
            "cmt": null,
            "parent": null,
        }
    });
    let response = backend.meta_rpc("measure/insert", vec![payload]).await?;
    first_record(&response)
        .filter(|record| record.is_object())
        .cloned()
        .ok_or_else(|| Error::Decode("measure/insert returned no created record".to_string()))
}

/// Current values of the measure reference property
pub async fn load_measure_prop_values(backend: &dyn Backend) -> Result<Vec<Value>> {
    let response = backend
        .meta_rpc("prop/loadPropValForUpd", vec![json!(MEASURE_REF_PROP_ID)])
        .await?;
    Ok(extract_records(&response).to_vec())
}

/// Replace the selected values of the measure reference property
pub async fn save_measure_prop_selected(backend: &dyn Backend, selected: Vec<Value>) -> Result<()> {
    backend
        .meta_rpc(
            "prop/savePropRefVal",
            vec![json!(MEASURE_REF_PROP_ID), Value::Array(selected)],
        )
        .await?;
    Ok(())
}

/// Whether a property value is currently selected; accepts the usual flag
/// spellings plus the form checkbox value `on`
pub fn is_checked(record: &Value) -> bool {
    match record.get("checked") {
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("on") => true,
        Some(value) => parse_flag(value).unwrap_or(false),
        None => false,
    }
}

fn with_checked(record: &Value) -> Value {
    let mut record = record.clone();
    if let Value::Object(map) = &mut record {
        map.insert("checked".to_string(), Value::Bool(true));
    }
    record
}

/// Create a measure and add it to the selected values of the reference
/// property, keeping every previously selected value.
pub async fn create_measure_and_select(backend: &dyn Backend, name: &str) -> Result<MeasureOption> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("measure name is empty".to_string()));
    }

    let created = insert_measure(backend, name).await?;
    let created_id = created
        .get("id")
        .and_then(normalize_integer)
        .ok_or_else(|| Error::Decode("created measure has no id".to_string()))?;
    let created_name = created
        .get("name")
        .map(trimmed_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| name.to_string());

    let all = load_measure_prop_values(backend).await?;
    let mut selected: Vec<Value> = all.iter().filter(|r| is_checked(r)).cloned().collect();
    let listed = all
        .iter()
        .find(|r| r.get("id").and_then(normalize_integer) == Some(created_id));
    match listed {
        Some(entry) => selected.push(with_checked(entry)),
        None => {
            debug!(id = created_id, "Created measure missing from property values, appending");
            selected.push(json!({
                "id": created_id,
                "cod": created.get("cod").cloned().unwrap_or(json!("")),
                "name": created_name,
                "fullName": created.get("fullName").cloned().unwrap_or(json!(created_name)),
                "checked": true,
                "leaf": true,
                "level": 0,
                "children": null,
            }));
        }
    }

    save_measure_prop_selected(backend, selected).await?;
    info!(id = created_id, name = %created_name, "Measure created and selected");

    Ok(MeasureOption {
        id: created_id,
        pv: created_id,
        name: created_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn saved_selection(backend: &FakeBackend) -> Vec<Value> {
        let calls = backend.calls_to("prop/savePropRefVal");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], json!(1105));
        calls[0][1].as_array().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_keeps_checked_and_appends_created_from_list() {
        let backend = FakeBackend::new()
            .with(
                "measure/insert",
                json!({"records": [{"id": 55, "cod": "", "name": "мм", "fullName": "мм"}]}),
            )
            .with(
                "prop/loadPropValForUpd",
                json!({"records": [
                    {"id": 1, "name": "м", "checked": true},
                    {"id": 2, "name": "см", "checked": false},
                    {"id": 3, "name": "км", "checked": "on"},
                    {"id": 55, "name": "мм", "checked": false, "level": 1},
                ]}),
            )
            .with("prop/savePropRefVal", json!(null));

        let option = create_measure_and_select(&backend, " мм ").await.unwrap();
        assert_eq!(option, MeasureOption { id: 55, pv: 55, name: "мм".to_string() });

        let selected = saved_selection(&backend);
        let ids: Vec<i64> = selected.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 3, 55]);
        assert_eq!(selected[2]["checked"], json!(true));
        assert_eq!(selected[2]["level"], json!(1));

        let insert = backend.calls_to("measure/insert");
        assert_eq!(insert[0][0]["rec"]["name"], "мм");
        assert_eq!(insert[0][0]["rec"]["kFromBase"], 1);
    }

    #[tokio::test]
    async fn test_appends_synthesised_entry_when_list_lacks_created() {
        let backend = FakeBackend::new()
            .with("measure/insert", json!({"records": [{"id": "9", "name": "бар"}]}))
            .with("prop/loadPropValForUpd", json!({"records": [{"id": 1, "checked": 1}]}))
            .with("prop/savePropRefVal", json!(null));

        let option = create_measure_and_select(&backend, "бар").await.unwrap();
        assert_eq!(option.id, 9);

        let selected = saved_selection(&backend);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1]["id"], json!(9));
        assert_eq!(selected[1]["leaf"], json!(true));
        assert_eq!(selected[1]["fullName"], json!("бар"));
    }

    #[tokio::test]
    async fn test_insert_without_record_fails() {
        let backend = FakeBackend::new().with("measure/insert", json!({"records": []}));
        let err = create_measure_and_select(&backend, "мм").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(backend.calls_to("prop/loadPropValForUpd").is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let backend = FakeBackend::new();
        assert!(matches!(
            create_measure_and_select(&backend, "  ").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_is_checked() {
        assert!(is_checked(&json!({"checked": "ON"})));
        assert!(is_checked(&json!({"checked": "yes"})));
        assert!(!is_checked(&json!({"checked": "off"})));
        assert!(!is_checked(&json!({})));
    }
}
