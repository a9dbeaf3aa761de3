//! Source collections (normative documents) and departments (RPC)

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::client::Backend;
use crate::collate::sort_by_name_ru;
use crate::dates::format_period;
use crate::entities::{map_records, rpc_records};
use crate::fields::AliasTable;
use crate::records::first_record;
use crate::{Error, Result};

pub static SOURCE_ALIASES: AliasTable = AliasTable {
    entity: "source-collection",
    fields: &[
        ("id", &["id"]),
        ("cls", &["cls"]),
        ("name", &["name"]),
        ("documentNumber", &["DocumentNumber"]),
        ("approvalDate", &["DocumentApprovalDate"]),
        ("author", &["DocumentAuthor"]),
        ("startDate", &["DocumentStartDate"]),
        ("endDate", &["DocumentEndDate"]),
        ("idDocumentNumber", &["idDocumentNumber"]),
        ("idApprovalDate", &["idDocumentApprovalDate"]),
        ("idAuthor", &["idDocumentAuthor"]),
        ("idStartDate", &["idDocumentStartDate"]),
        ("idEndDate", &["idDocumentEndDate"]),
    ],
};

pub static DEPARTMENT_ALIASES: AliasTable = AliasTable {
    entity: "department",
    fields: &[("id", &["id"]), ("name", &["name"])],
};

/// Department (location) a source applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

/// Normative document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCollection {
    pub id: i64,
    pub cls: Option<i64>,
    pub name: String,
    pub document_number: String,
    pub approval_date: Option<String>,
    pub author: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub id_document_number: Option<i64>,
    pub id_approval_date: Option<i64>,
    pub id_author: Option<i64>,
    pub id_start_date: Option<i64>,
    pub id_end_date: Option<i64>,
    /// Validity period for display, `дд.мм.гггг — дд.мм.гггг`
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesSnapshot {
    pub items: Vec<SourceCollection>,
    pub departments: Vec<Department>,
}

/// Departments and attached files of one source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetails {
    pub department_ids: Vec<i64>,
    pub files: Vec<Value>,
}

/// Fields of a new source collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCollectionInsert {
    #[serde(rename = "accessLevel")]
    pub access_level: i64,
    pub name: String,
    #[serde(rename = "DocumentNumber")]
    pub document_number: String,
    #[serde(rename = "DocumentApprovalDate")]
    pub approval_date: String,
    #[serde(rename = "DocumentAuthor")]
    pub author: String,
    #[serde(rename = "DocumentStartDate")]
    pub start_date: Option<String>,
    #[serde(rename = "DocumentEndDate")]
    pub end_date: Option<String>,
}

/// Fields of an existing source collection, with attribute ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCollectionUpdate {
    #[serde(rename = "accessLevel")]
    pub access_level: i64,
    pub id: i64,
    pub cls: i64,
    pub name: String,
    #[serde(rename = "idDocumentNumber")]
    pub id_document_number: Option<i64>,
    #[serde(rename = "DocumentNumber")]
    pub document_number: String,
    #[serde(rename = "idDocumentApprovalDate")]
    pub id_approval_date: Option<i64>,
    #[serde(rename = "DocumentApprovalDate")]
    pub approval_date: String,
    #[serde(rename = "idDocumentAuthor")]
    pub id_author: Option<i64>,
    #[serde(rename = "DocumentAuthor")]
    pub author: String,
    #[serde(rename = "idDocumentStartDate")]
    pub id_start_date: Option<i64>,
    #[serde(rename = "DocumentStartDate")]
    pub start_date: Option<String>,
    #[serde(rename = "idDocumentEndDate")]
    pub id_end_date: Option<i64>,
    #[serde(rename = "DocumentEndDate")]
    pub end_date: Option<String>,
}

impl SourceCollectionUpdate {
    fn into_collection(self) -> SourceCollection {
        let period = format_period(self.start_date.as_deref(), self.end_date.as_deref());
        SourceCollection {
            id: self.id,
            cls: Some(self.cls),
            name: self.name,
            document_number: self.document_number,
            approval_date: Some(self.approval_date).filter(|s| !s.is_empty()),
            author: Some(self.author).filter(|s| !s.is_empty()),
            start_date: self.start_date,
            end_date: self.end_date,
            id_document_number: self.id_document_number,
            id_approval_date: self.id_approval_date,
            id_author: self.id_author,
            id_start_date: self.id_start_date,
            id_end_date: self.id_end_date,
            period,
        }
    }
}

/// Map a source collection; requires a numeric id and a name
pub fn map_source_collection(raw: &Value) -> Option<SourceCollection> {
    let record = SOURCE_ALIASES.record(raw);
    let id = record.integer("id")?;
    let name = record.string("name")?;
    let start_date = record.string("startDate");
    let end_date = record.string("endDate");
    Some(SourceCollection {
        id,
        cls: record.integer("cls"),
        name,
        document_number: record.string("documentNumber").unwrap_or_default(),
        approval_date: record.string("approvalDate"),
        author: record.string("author"),
        period: format_period(start_date.as_deref(), end_date.as_deref()),
        start_date,
        end_date,
        id_document_number: record.integer("idDocumentNumber"),
        id_approval_date: record.integer("idApprovalDate"),
        id_author: record.integer("idAuthor"),
        id_start_date: record.integer("idStartDate"),
        id_end_date: record.integer("idEndDate"),
    })
}

pub fn map_department(raw: &Value) -> Option<Department> {
    let record = DEPARTMENT_ALIASES.record(raw);
    Some(Department {
        id: record.integer("id")?,
        name: record.string("name")?,
    })
}

pub async fn load_departments(backend: &dyn Backend) -> Result<Vec<Department>> {
    let records = rpc_records(
        backend,
        "data/loadDepartments",
        vec![json!("Typ_Location"), json!("Prop_LocationMulti")],
    )
    .await?;
    let mut items = map_records("department", &records, |_, raw| map_department(raw));
    sort_by_name_ru(&mut items, |item| item.name.as_str());
    Ok(items)
}

pub async fn load_source_collections(backend: &dyn Backend) -> Result<Vec<SourceCollection>> {
    let records = rpc_records(backend, "data/loadSourceCollections", vec![json!(0)]).await?;
    let mut items = map_records("source-collection", &records, |_, raw| map_source_collection(raw));
    sort_by_name_ru(&mut items, |item| item.name.as_str());
    Ok(items)
}

/// Source collections with the department directory
pub async fn fetch_sources_snapshot(backend: &dyn Backend) -> Result<SourcesSnapshot> {
    let (items, departments) =
        tokio::try_join!(load_source_collections(backend), load_departments(backend))?;
    Ok(SourcesSnapshot { items, departments })
}

/// Comma-separated department ids; unparsable entries are skipped
pub fn parse_department_ids(value: Option<&Value>) -> Vec<i64> {
    match value {
        Some(Value::String(text)) => text
            .split(',')
            .filter_map(|item| item.trim().parse::<i64>().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Departments and files attached to a source
pub async fn load_departments_with_file(backend: &dyn Backend, source_id: i64) -> Result<SourceDetails> {
    let response = backend
        .rpc("data/loadDepartmentsWithFile", vec![json!(source_id)])
        .await?;
    let Value::Object(map) = &response else {
        return Ok(SourceDetails::default());
    };
    let files = match map.get("files").and_then(|files| files.get("records")) {
        Some(Value::Array(records)) => records.iter().filter(|r| r.is_object()).cloned().collect(),
        _ => Vec::new(),
    };
    Ok(SourceDetails {
        department_ids: parse_department_ids(map.get("departments")),
        files,
    })
}

/// Insert a source collection; the reply must carry the new id
pub async fn save_source_collection_ins(
    backend: &dyn Backend,
    payload: &SourceCollectionInsert,
) -> Result<SourceCollection> {
    let body = serde_json::to_value(payload)?;
    let response = backend
        .rpc("data/saveSourceCollections", vec![json!("ins"), body])
        .await?;
    let created = first_record(&response)
        .and_then(map_source_collection)
        .or_else(|| map_source_collection(&response))
        .ok_or_else(|| Error::Decode("saved document has no id".to_string()))?;
    info!(id = created.id, "Source collection created");
    Ok(created)
}

/// Update a source collection.
///
/// When the reply is not a readable record the submitted values are returned.
pub async fn save_source_collection_upd(
    backend: &dyn Backend,
    payload: &SourceCollectionUpdate,
) -> Result<SourceCollection> {
    let body = serde_json::to_value(payload)?;
    let response = backend
        .rpc("data/saveSourceCollections", vec![json!("upd"), body])
        .await?;
    Ok(map_source_collection(&response)
        .or_else(|| first_record(&response).and_then(map_source_collection))
        .unwrap_or_else(|| payload.clone().into_collection()))
}

/// Replace the departments a source applies to
pub async fn save_departments(backend: &dyn Backend, source_id: i64, ids: &[i64]) -> Result<()> {
    backend
        .rpc(
            "data/saveDepartment",
            vec![json!({
                "isObj": 1,
                "metamodel": "dtj",
                "model": "nsidata",
                "obj": source_id,
                "ids": ids,
            })],
        )
        .await?;
    Ok(())
}

pub async fn delete_source_collection(backend: &dyn Backend, id: i64) -> Result<()> {
    backend
        .rpc("data/deleteOwnerWithProperties", vec![json!(id), json!(1)])
        .await?;
    info!(id, "Source collection deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_snapshot() {
        let backend = FakeBackend::new()
            .with(
                "data/loadSourceCollections",
                json!({"records": [
                    {"id": 2, "name": "СП 119", "DocumentStartDate": "2020-01-01", "DocumentEndDate": "2025-12-31", "idDocumentNumber": 900},
                    {"id": 1, "name": "ГОСТ 1", "DocumentNumber": "1-2000", "DocumentAuthor": "Минтранс"},
                    {"id": "x", "name": "без числового id"},
                    {"id": 3},
                ]}),
            )
            .with(
                "data/loadDepartments",
                json!([{"id": 5, "name": "Южная"}, {"id": 4, "name": "Восточная"}, {"name": "?"}]),
            );

        let snapshot = fetch_sources_snapshot(&backend).await.unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.items[0].name, "ГОСТ 1");
        assert_eq!(snapshot.items[0].document_number, "1-2000");
        assert_eq!(snapshot.items[0].period, "—");
        assert_eq!(snapshot.items[1].document_number, "");
        assert_eq!(snapshot.items[1].period, "01.01.2020 — 31.12.2025");
        assert_eq!(snapshot.items[1].id_document_number, Some(900));

        let departments: Vec<i64> = snapshot.departments.iter().map(|d| d.id).collect();
        assert_eq!(departments, vec![4, 5]);
        assert_eq!(
            backend.calls_to("data/loadDepartments"),
            vec![json!(["Typ_Location", "Prop_LocationMulti"])]
        );
    }

    #[tokio::test]
    async fn test_departments_with_file() {
        let backend = FakeBackend::new().with(
            "data/loadDepartmentsWithFile",
            json!({"departments": "4, 5,x", "files": {"records": [{"id": 1, "fileName": "a.pdf"}, 3]}}),
        );
        let details = load_departments_with_file(&backend, 2).await.unwrap();
        assert_eq!(details.department_ids, vec![4, 5]);
        assert_eq!(details.files, vec![json!({"id": 1, "fileName": "a.pdf"})]);

        let backend = FakeBackend::new().with("data/loadDepartmentsWithFile", json!(null));
        assert_eq!(load_departments_with_file(&backend, 2).await.unwrap(), SourceDetails::default());
    }

    #[tokio::test]
    async fn test_save_ins() {
        let backend = FakeBackend::new().with(
            "data/saveSourceCollections",
            json!({"records": [{"id": 12, "name": "ГОСТ 2", "DocumentNumber": "2"}]}),
        );
        let payload = SourceCollectionInsert {
            access_level: 1,
            name: "ГОСТ 2".to_string(),
            document_number: "2".to_string(),
            ..SourceCollectionInsert::default()
        };
        let created = save_source_collection_ins(&backend, &payload).await.unwrap();
        assert_eq!(created.id, 12);

        let sent = backend.calls_to("data/saveSourceCollections");
        assert_eq!(sent[0][0], json!("ins"));
        assert_eq!(sent[0][1]["DocumentNumber"], json!("2"));
        assert_eq!(sent[0][1]["accessLevel"], json!(1));
        assert_eq!(sent[0][1]["DocumentStartDate"], json!(null));

        let backend = FakeBackend::new().with("data/saveSourceCollections", json!({"ok": true}));
        assert!(matches!(
            save_source_collection_ins(&backend, &payload).await,
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_save_upd_falls_back_to_payload() {
        let backend = FakeBackend::new().with("data/saveSourceCollections", json!(true));
        let payload = SourceCollectionUpdate {
            access_level: 1,
            id: 7,
            cls: 1200,
            name: "СП 2".to_string(),
            start_date: Some("2021-05-01".to_string()),
            ..SourceCollectionUpdate::default()
        };
        let saved = save_source_collection_upd(&backend, &payload).await.unwrap();
        assert_eq!(saved.id, 7);
        assert_eq!(saved.cls, Some(1200));
        assert_eq!(saved.period, "01.05.2021 —");
    }

    #[tokio::test]
    async fn test_departments_and_delete() {
        let backend = FakeBackend::new()
            .with("data/saveDepartment", json!(null))
            .with("data/deleteOwnerWithProperties", json!(null));
        save_departments(&backend, 3, &[4, 5]).await.unwrap();
        assert_eq!(
            backend.calls_to("data/saveDepartment"),
            vec![json!([{"isObj": 1, "metamodel": "dtj", "model": "nsidata", "obj": 3, "ids": [4, 5]}])]
        );
        delete_source_collection(&backend, 3).await.unwrap();
        assert_eq!(backend.calls_to("data/deleteOwnerWithProperties"), vec![json!([3, 1])]);
    }
}
