//! Entity mappers and snapshot composers
//!
//! One module per NSI entity. Each declares its field-alias table, maps raw
//! records to a typed entity (dropping records without id or name) and
//! composes a snapshot from concurrent fetches.

pub mod component;
pub mod dashboard;
pub mod defect;
pub mod object_type;
pub mod parameter;
pub mod source;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::client::Backend;
use crate::records::extract_records;
use crate::{Error, Result};

/// Console section an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NsiSection {
    Sources,
    Types,
    Components,
    Params,
    Defects,
    Works,
}

impl NsiSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            NsiSection::Sources => "sources",
            NsiSection::Types => "types",
            NsiSection::Components => "components",
            NsiSection::Params => "params",
            NsiSection::Defects => "defects",
            NsiSection::Works => "works",
        }
    }
}

impl fmt::Display for NsiSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NsiSection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sources" => Ok(NsiSection::Sources),
            "types" => Ok(NsiSection::Types),
            "components" => Ok(NsiSection::Components),
            "params" => Ok(NsiSection::Params),
            "defects" => Ok(NsiSection::Defects),
            "works" => Ok(NsiSection::Works),
            other => Err(Error::InvalidInput(format!("unknown section: {}", other))),
        }
    }
}

/// Call an RPC method and extract its record list
pub(crate) async fn rpc_records(
    backend: &dyn Backend,
    method: &str,
    params: Vec<Value>,
) -> Result<Vec<Value>> {
    let response = backend.rpc(method, params).await?;
    Ok(extract_records(&response).to_vec())
}

/// GET a REST resource and extract its record list
pub(crate) async fn rest_records(backend: &dyn Backend, path: &str) -> Result<Vec<Value>> {
    let response = backend.get(path, &[]).await?;
    Ok(extract_records(&response).to_vec())
}

/// Await an enrichment call; a failure means "no enrichment data"
pub(crate) async fn optional_records<F>(label: &str, call: F) -> Vec<Value>
where
    F: Future<Output = Result<Vec<Value>>>,
{
    match call.await {
        Ok(records) => records,
        Err(e) => {
            warn!(call = label, error = %e, "Enrichment unavailable, continuing without it");
            Vec::new()
        }
    }
}

/// Apply a mapper to every record, dropping the ones it rejects
pub(crate) fn map_records<T>(
    entity: &str,
    records: &[Value],
    mut mapper: impl FnMut(usize, &Value) -> Option<T>,
) -> Vec<T> {
    let items: Vec<T> = records
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| mapper(index, raw))
        .collect();
    let dropped = records.len() - items.len();
    if dropped > 0 {
        debug!(entity = entity, dropped, "Dropped records without id or name");
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_round_trip_names() {
        assert_eq!("Params".parse::<NsiSection>().unwrap(), NsiSection::Params);
        assert_eq!(NsiSection::Types.to_string(), "types");
        assert_eq!(serde_json::to_value(NsiSection::Defects).unwrap(), json!("defects"));
        assert!("jobs".parse::<NsiSection>().is_err());
    }

    #[test]
    fn test_map_records_drops_rejected() {
        let records = vec![json!({"id": 1}), json!({}), json!({"id": 3})];
        let ids = map_records("test", &records, |_, raw| raw.get("id").cloned());
        assert_eq!(ids, vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_optional_records_swallows_failure() {
        let records = optional_records("x", async {
            Err::<Vec<Value>, _>(Error::Decode("nope".to_string()))
        })
        .await;
        assert!(records.is_empty());
    }
}
