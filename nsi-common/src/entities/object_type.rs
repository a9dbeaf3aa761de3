//! Object types (RPC)

use serde::Serialize;
use serde_json::{json, Value};

use crate::client::Backend;
use crate::collate::sort_by_name_ru;
use crate::directory::{build_lookup, sort_options, DirectoryLookup, DirectoryOption};
use crate::entities::component::COMPONENT_ALIASES;
use crate::entities::{map_records, rpc_records};
use crate::fields::AliasTable;
use crate::value::{normalize_string, normalize_text};
use crate::Result;

pub static OBJECT_TYPE_ALIASES: AliasTable = AliasTable {
    entity: "object-type",
    fields: &[
        ("id", &["id", "ID", "number"]),
        ("name", &["name", "NAME", "title"]),
        ("geometry", &["geometry", "shape", "geom", "Shape"]),
        ("componentIds", &["componentIds", "component_ids", "components"]),
        ("componentNames", &["componentNames", "component_names", "component"]),
    ],
};

/// Map geometry of an object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    Point,
    Line,
    Polygon,
}

impl Geometry {
    /// Parse Russian or English spellings
    pub fn parse(text: &str) -> Option<Self> {
        match normalize_text(text).as_str() {
            "точка" | "point" => Some(Geometry::Point),
            "линия" | "line" | "polyline" => Some(Geometry::Line),
            "полигон" | "polygon" | "area" => Some(Geometry::Polygon),
            _ => None,
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Geometry::Point => "точка",
            Geometry::Line => "линия",
            Geometry::Polygon => "полигон",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedObjectType {
    pub id: String,
    pub name: String,
    pub geometry: Option<Geometry>,
    pub component_ids: Vec<String>,
    pub component_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypesSnapshot {
    pub items: Vec<LoadedObjectType>,
    pub components: Vec<DirectoryOption>,
    pub component_directory: DirectoryLookup,
}

/// Strings of an array value or a comma-separated list
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                normalize_string(item).or_else(|| item.get("id").and_then(normalize_string))
            })
            .collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(other) => normalize_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Map one raw object type; `None` without id or name.
///
/// Component names come from the directory by id; where an id misses, the
/// inline name at the same position is used, then the id itself. Names stay
/// aligned with ids.
pub fn map_object_type(raw: &Value, components: &DirectoryLookup) -> Option<LoadedObjectType> {
    let record = OBJECT_TYPE_ALIASES.record(raw);
    let id = record.string("id")?;
    let name = record.string("name")?;

    let component_ids = string_list(record.value("componentIds"));
    let inline_names = string_list(record.value("componentNames"));
    let component_names = if component_ids.is_empty() {
        inline_names
    } else {
        component_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                components
                    .name_of(id)
                    .map(str::to_string)
                    .or_else(|| inline_names.get(index).cloned())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    };

    Some(LoadedObjectType {
        id,
        name,
        geometry: record.string("geometry").as_deref().and_then(Geometry::parse),
        component_ids,
        component_names,
    })
}

/// Fetch object types with the component directory
pub async fn fetch_object_types_snapshot(backend: &dyn Backend) -> Result<ObjectTypesSnapshot> {
    let (types, components) = tokio::try_join!(
        rpc_records(backend, "data/loadObjectTypes", Vec::new()),
        rpc_records(backend, "data/loadComponents", vec![json!(0)]),
    )?;

    let components: Vec<DirectoryOption> = components
        .iter()
        .filter_map(|raw| {
            let record = COMPONENT_ALIASES.record(raw);
            let id = record.string("id")?;
            let name = record.string("name").unwrap_or_else(|| id.clone());
            Some(DirectoryOption {
                cls: record.string("cls"),
                ..DirectoryOption::new(id, name)
            })
        })
        .collect();
    let component_directory = build_lookup(&components);

    let mut items = map_records("object-type", &types, |_, raw| {
        map_object_type(raw, &component_directory)
    });
    sort_by_name_ru(&mut items, |item| item.name.as_str());

    Ok(ObjectTypesSnapshot {
        items,
        components: sort_options(components),
        component_directory,
    })
}
