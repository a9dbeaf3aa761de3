//! Components (RPC + in-memory store)
//!
//! The backend only knows component names and classes; relations to object
//! types, parameters and defects are kept in a [`MemoryComponentStore`]
//! owned by the [`ComponentRepository`]. Backend writes are best-effort,
//! store writes always apply.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::Backend;
use crate::collate::sort_by_name_ru;
use crate::directory::{sort_options, DirectoryOption};
use crate::entities::{map_records, rpc_records};
use crate::fields::AliasTable;
use crate::records::first_record;
use crate::store::{MemoryComponentStore, RelationKind, StoredComponent, COMPONENT_CLS};
use crate::{Error, Result};

pub static COMPONENT_ALIASES: AliasTable = AliasTable {
    entity: "component",
    fields: &[
        ("id", &["id", "ID", "number"]),
        ("name", &["name", "NAME"]),
        ("cls", &["cls", "CLS"]),
    ],
};

/// Component as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub id: String,
    pub name: String,
}

/// Reply of `data/saveComponents "ins"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedComponent {
    pub id: i64,
    pub cls: i64,
    pub name: String,
}

/// Related directory entry of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRelation {
    pub id: String,
    pub name: String,
    pub relation_id: String,
    pub cls: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDetails {
    pub id: i64,
    pub cls: i64,
    pub access_level: i64,
}

/// Component with resolved relations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedComponent {
    pub id: String,
    pub cls: String,
    pub name: String,
    pub object_types: Vec<ComponentRelation>,
    pub parameters: Vec<ComponentRelation>,
    pub defects: Vec<ComponentRelation>,
    pub details: ComponentDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsSnapshot {
    pub items: Vec<LoadedComponent>,
    pub object_types: Vec<DirectoryOption>,
    pub parameters: Vec<DirectoryOption>,
    pub defects: Vec<DirectoryOption>,
}

/// Editable part of a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInput {
    pub name: String,
    #[serde(default)]
    pub object_type_ids: Vec<String>,
    #[serde(default)]
    pub parameter_ids: Vec<String>,
    #[serde(default)]
    pub defect_ids: Vec<String>,
    #[serde(default)]
    pub cls: Option<i64>,
    #[serde(default)]
    pub access_level: Option<i64>,
}

/// Map a listed component; `None` without id or name
pub fn map_component(raw: &Value) -> Option<Component> {
    let record = COMPONENT_ALIASES.record(raw);
    Some(Component {
        id: record.string("id")?,
        name: record.string("name")?,
    })
}

/// All backend components, sorted by name
pub async fn list_components(backend: &dyn Backend) -> Result<Vec<Component>> {
    let records = rpc_records(backend, "data/loadComponents", vec![json!(0)]).await?;
    let mut items = map_records("component", &records, |_, raw| map_component(raw));
    sort_by_name_ru(&mut items, |item| item.name.as_str());
    Ok(items)
}

fn created_from_reply(response: &Value, fallback_name: &str) -> Result<CreatedComponent> {
    let raw = first_record(response)
        .or_else(|| response.is_object().then_some(response))
        .ok_or_else(|| Error::Decode("no created component in reply".to_string()))?;
    let record = COMPONENT_ALIASES.record(raw);
    let id = record
        .integer("id")
        .ok_or_else(|| Error::Decode("created component has no id".to_string()))?;
    Ok(CreatedComponent {
        id,
        cls: record.integer("cls").unwrap_or(COMPONENT_CLS),
        name: record.string("name").unwrap_or_else(|| fallback_name.to_string()),
    })
}

/// Insert a component on the backend
pub async fn create_component_record(backend: &dyn Backend, name: &str) -> Result<CreatedComponent> {
    let response = backend
        .rpc(
            "data/saveComponents",
            vec![
                json!("ins"),
                json!({"accessLevel": 1, "cls": COMPONENT_CLS, "name": name}),
            ],
        )
        .await?;
    created_from_reply(&response, name)
}

/// Insert a component and return it in list form
pub async fn create_component(backend: &dyn Backend, name: &str) -> Result<Component> {
    let created = create_component_record(backend, name).await?;
    Ok(Component {
        id: created.id.to_string(),
        name: created.name,
    })
}

fn relations(store: &MemoryComponentStore, kind: RelationKind, ids: &[String]) -> Vec<ComponentRelation> {
    ids.iter()
        .filter_map(|id| store.directory_entry(kind, id))
        .map(|option| ComponentRelation {
            id: option.id.clone(),
            name: option.name.clone(),
            relation_id: format!("{}-{}", option.id, option.name),
            cls: option.cls.clone(),
        })
        .collect()
}

fn load_component(store: &MemoryComponentStore, component: &StoredComponent) -> LoadedComponent {
    LoadedComponent {
        id: component.id.to_string(),
        cls: component.cls.to_string(),
        name: component.name.clone(),
        object_types: relations(store, RelationKind::ObjectType, &component.object_type_ids),
        parameters: relations(store, RelationKind::Parameter, &component.parameter_ids),
        defects: relations(store, RelationKind::Defect, &component.defect_ids),
        details: ComponentDetails {
            id: component.id,
            cls: component.cls,
            access_level: 1,
        },
    }
}

/// Unique ids, first occurrence kept
fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

fn apply_input(component: &mut StoredComponent, input: &ComponentInput) {
    let name = input.name.trim();
    component.name = if name.is_empty() {
        format!("Компонент {}", component.id)
    } else {
        name.to_string()
    };
    component.object_type_ids = dedup(&input.object_type_ids);
    component.parameter_ids = dedup(&input.parameter_ids);
    component.defect_ids = dedup(&input.defect_ids);
}

/// Components with their relations
pub struct ComponentRepository {
    backend: Arc<dyn Backend>,
    store: Mutex<MemoryComponentStore>,
}

impl ComponentRepository {
    pub fn new(backend: Arc<dyn Backend>, store: MemoryComponentStore) -> Self {
        Self {
            backend,
            store: Mutex::new(store),
        }
    }

    /// Refresh from the backend when reachable, then compose from the store
    pub async fn snapshot(&self) -> ComponentsSnapshot {
        match list_components(self.backend.as_ref()).await {
            Ok(listed) => {
                let listed: Vec<(i64, i64, String)> = listed
                    .into_iter()
                    .filter_map(|c| c.id.parse::<i64>().ok().map(|id| (id, COMPONENT_CLS, c.name)))
                    .collect();
                debug!(count = listed.len(), "Merging backend components into store");
                self.store.lock().await.merge_components(listed);
            }
            Err(e) => warn!(error = %e, "Component list unavailable, using store only"),
        }

        let store = self.store.lock().await;
        let mut items: Vec<LoadedComponent> = store
            .components()
            .map(|component| load_component(&store, component))
            .collect();
        sort_by_name_ru(&mut items, |item| item.name.as_str());

        ComponentsSnapshot {
            items,
            object_types: sort_options(store.directory(RelationKind::ObjectType)),
            parameters: sort_options(store.directory(RelationKind::Parameter)),
            defects: sort_options(store.directory(RelationKind::Defect)),
        }
    }

    /// Create on the backend when possible, otherwise with a local id
    pub async fn create(&self, input: &ComponentInput) -> LoadedComponent {
        let trimmed = input.name.trim();
        let base_name = if trimmed.is_empty() { "Новый компонент" } else { trimmed };
        let created = match create_component_record(self.backend.as_ref(), base_name).await {
            Ok(created) => Some(created),
            Err(e) => {
                warn!(error = %e, "Backend create failed, allocating local id");
                None
            }
        };

        let mut store = self.store.lock().await;
        let created = created.unwrap_or_else(|| CreatedComponent {
            id: store.next_component_id(),
            cls: COMPONENT_CLS,
            name: base_name.to_string(),
        });
        let mut component = StoredComponent::new(created.id, created.cls, created.name);
        apply_input(&mut component, input);
        let loaded = load_component(&store, &component);
        store.put_component(component);
        info!(id = %loaded.id, name = %loaded.name, "Component created");
        loaded
    }

    /// Update a stored component; unknown ids are created instead
    pub async fn update(&self, id: i64, input: &ComponentInput) -> LoadedComponent {
        let existing_cls = self.store.lock().await.component(id).map(|c| c.cls);
        let Some(existing_cls) = existing_cls else {
            debug!(id, "Component not in store, creating");
            return self.create(input).await;
        };

        let body = json!({
            "id": id,
            "cls": input.cls.unwrap_or(existing_cls),
            "accessLevel": input.access_level.unwrap_or(1),
            "name": input.name,
        });
        if let Err(e) = self.backend.rpc("data/saveComponents", vec![json!("upd"), body]).await {
            warn!(id, error = %e, "Backend update failed, updating store only");
        }

        let mut store = self.store.lock().await;
        let mut component = store
            .component(id)
            .cloned()
            .unwrap_or_else(|| StoredComponent::new(id, existing_cls, input.name.clone()));
        apply_input(&mut component, input);
        let loaded = load_component(&store, &component);
        store.put_component(component);
        loaded
    }

    /// Remove from the store, then from the backend best-effort
    pub async fn delete(&self, id: i64) {
        self.store.lock().await.remove_component(id);
        if let Err(e) = self.backend.rpc("data/deleteComponents", vec![json!(id)]).await {
            warn!(id, error = %e, "Backend delete failed");
        }
    }

    /// Directory entry matched by normalised name, created when missing
    pub async fn ensure_relation(&self, kind: RelationKind, name: &str) -> DirectoryOption {
        self.store.lock().await.ensure_directory_entry(kind, name)
    }
}
