//! Parameter ↔ component relation stitching
//!
//! A parameter's component is not stored on the parameter. It is recovered
//! from up to four independent responses:
//!
//! 1. parameters: parameter id → class tag
//! 2. relations: (parameter id, class) → (component id, component class, relation id)
//! 3. components: (component id, component class) → component name
//! 4. limits: relation id → limit range and comment
//!
//! Each step is a dictionary build followed by a probe; a miss at any step
//! leaves the remaining enrichment empty. Some backends describe relations
//! only with a compound name such as `"Давление, МПа<=>Насос"`; those are
//! indexed by `(parameter name|unit name)` with a name-only fallback.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::fields::AliasTable;
use crate::value::normalize_text;

/// Wire names of parameter fields used by the join
pub static PARAMETER_CLASS_ALIASES: AliasTable = AliasTable {
    entity: "parameter-class",
    fields: &[
        ("id", &["id", "parameterId", "parameter_id"]),
        ("cls", &["cls", "CLS", "class", "typ"]),
    ],
};

/// Wire names of relation records
pub static RELATION_ALIASES: AliasTable = AliasTable {
    entity: "parameter-component-relation",
    fields: &[
        ("parameterId", &["idrom1", "paramId", "parameterId"]),
        ("parameterCls", &["clsrom1", "paramCls", "parameterCls"]),
        ("componentId", &["idrom2", "componentId"]),
        ("componentCls", &["clsrom2", "componentCls"]),
        ("relationId", &["idro", "relationId", "id"]),
        ("compound", &["name", "namerom", "relationName"]),
    ],
};

/// Wire names of component records
pub static COMPONENT_ALIASES: AliasTable = AliasTable {
    entity: "component",
    fields: &[
        ("id", &["id", "ID", "number"]),
        ("cls", &["cls", "CLS"]),
        ("name", &["name", "NAME"]),
    ],
};

/// Wire names of relation limit records
pub static LIMIT_ALIASES: AliasTable = AliasTable {
    entity: "relation-limit",
    fields: &[
        ("relationId", &["relationId", "idro", "owner"]),
        ("min", &["limitMin", "ParamsLimitMin", "minValue"]),
        ("max", &["limitMax", "ParamsLimitMax", "maxValue"]),
        ("comment", &["comment", "ParamsComment", "cmt"]),
    ],
};

/// Component association of one parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentLink {
    pub component_id: Option<String>,
    pub component_cls: Option<String>,
    pub component_name: Option<String>,
    pub relation_id: Option<String>,
    pub limit_min: Option<f64>,
    pub limit_max: Option<f64>,
    pub limit_comment: Option<String>,
}

#[derive(Debug, Clone)]
struct RelationTarget {
    component_id: String,
    component_cls: String,
    relation_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Limits {
    min: Option<f64>,
    max: Option<f64>,
    comment: Option<String>,
}

/// Parsed compound relation string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundRelation {
    pub parameter_name: String,
    pub unit_name: Option<String>,
    pub component_name: String,
}

/// Parse `"Parameter, Unit<=>Component"`.
///
/// The unit is the text after the last comma on the left side; without a
/// comma there is no unit. Both parameter and component names are required.
///
/// ```
/// use nsi_common::relations::parse_compound_relation;
///
/// let parsed = parse_compound_relation("Давление, МПа<=>Насос").unwrap();
/// assert_eq!(parsed.parameter_name, "Давление");
/// assert_eq!(parsed.unit_name.as_deref(), Some("МПа"));
/// assert_eq!(parsed.component_name, "Насос");
/// assert!(parse_compound_relation("no separator").is_none());
/// ```
pub fn parse_compound_relation(text: &str) -> Option<CompoundRelation> {
    let (left, right) = text.split_once("<=>")?;
    let component_name = right.trim();
    let (parameter_name, unit_name) = match left.rsplit_once(',') {
        Some((name, unit)) => {
            let unit = unit.trim();
            (name.trim(), if unit.is_empty() { None } else { Some(unit) })
        }
        None => (left.trim(), None),
    };
    if parameter_name.is_empty() || component_name.is_empty() {
        return None;
    }
    Some(CompoundRelation {
        parameter_name: parameter_name.to_string(),
        unit_name: unit_name.map(str::to_string),
        component_name: component_name.to_string(),
    })
}

fn composite_key(name: &str, unit: Option<&str>) -> String {
    format!("{}|{}", normalize_text(name), normalize_text(unit.unwrap_or("")))
}

/// Index of compound relation strings
#[derive(Debug, Clone, Default)]
pub struct CompoundIndex {
    by_name_and_unit: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl CompoundIndex {
    /// Component name for a parameter: `(name|unit)` first, then name only
    pub fn lookup(&self, parameter_name: &str, unit_name: Option<&str>) -> Option<&str> {
        self.by_name_and_unit
            .get(&composite_key(parameter_name, unit_name))
            .or_else(|| self.by_name.get(&normalize_text(parameter_name)))
            .map(String::as_str)
    }

    fn insert(&mut self, relation: CompoundRelation) {
        let key = composite_key(&relation.parameter_name, relation.unit_name.as_deref());
        self.by_name_and_unit
            .insert(key, relation.component_name.clone());
        self.by_name
            .entry(normalize_text(&relation.parameter_name))
            .or_insert(relation.component_name);
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Raw responses feeding the join; any of them may be empty
#[derive(Debug, Clone, Default)]
pub struct RelationPayload {
    pub relations: Vec<Value>,
    pub components: Vec<Value>,
    pub limits: Vec<Value>,
}

/// Result of stitching: per-parameter links plus the compound index
#[derive(Debug, Clone, Default)]
pub struct ParameterLinks {
    by_parameter: HashMap<String, ComponentLink>,
    compound: CompoundIndex,
}

impl ParameterLinks {
    /// Join the responses for the given raw parameter records
    pub fn stitch(parameters: &[Value], payload: &RelationPayload) -> Self {
        // (a) parameter id → class
        let parameter_class: HashMap<String, String> = parameters
            .iter()
            .filter_map(|raw| {
                let record = PARAMETER_CLASS_ALIASES.record(raw);
                let id = record.string("id")?;
                Some((id, record.string("cls").unwrap_or_default()))
            })
            .collect();

        // (b) (parameter id, class) → relation target; compound-only records go to the index
        let mut targets: HashMap<(String, String), RelationTarget> = HashMap::new();
        let mut compound = CompoundIndex::default();
        for raw in &payload.relations {
            let record = RELATION_ALIASES.record(raw);
            match (record.string("parameterId"), record.string("componentId")) {
                (Some(parameter_id), Some(component_id)) => {
                    let key = (parameter_id, record.string("parameterCls").unwrap_or_default());
                    targets.insert(
                        key,
                        RelationTarget {
                            component_id,
                            component_cls: record.string("componentCls").unwrap_or_default(),
                            relation_id: record.string("relationId"),
                        },
                    );
                }
                _ => {
                    if let Some(parsed) = record
                        .string("compound")
                        .as_deref()
                        .and_then(parse_compound_relation)
                    {
                        compound.insert(parsed);
                    }
                }
            }
        }

        // (c) (component id, class) → name
        let component_names: HashMap<(String, String), String> = payload
            .components
            .iter()
            .filter_map(|raw| {
                let record = COMPONENT_ALIASES.record(raw);
                let id = record.string("id")?;
                let name = record.string("name")?;
                Some(((id, record.string("cls").unwrap_or_default()), name))
            })
            .collect();

        // (d) relation id → limits
        let limits: HashMap<String, Limits> = payload
            .limits
            .iter()
            .filter_map(|raw| {
                let record = LIMIT_ALIASES.record(raw);
                let relation_id = record.string("relationId")?;
                Some((
                    relation_id,
                    Limits {
                        min: record.number("min"),
                        max: record.number("max"),
                        comment: record.string("comment"),
                    },
                ))
            })
            .collect();

        let by_parameter = parameter_class
            .into_iter()
            .filter_map(|(parameter_id, cls)| {
                let target = targets.get(&(parameter_id.clone(), cls))?;
                let component_name = component_names
                    .get(&(target.component_id.clone(), target.component_cls.clone()))
                    .cloned();
                let limits = target
                    .relation_id
                    .as_ref()
                    .and_then(|id| limits.get(id))
                    .cloned()
                    .unwrap_or_default();
                let link = ComponentLink {
                    component_id: Some(target.component_id.clone()),
                    component_cls: non_empty(&target.component_cls),
                    component_name,
                    relation_id: target.relation_id.clone(),
                    limit_min: limits.min,
                    limit_max: limits.max,
                    limit_comment: limits.comment,
                };
                Some((parameter_id, link))
            })
            .collect();

        Self {
            by_parameter,
            compound,
        }
    }

    /// Link for a parameter: id-based join first, compound names second
    pub fn link_for(&self, parameter_id: &str, name: &str, unit_name: Option<&str>) -> ComponentLink {
        if let Some(link) = self.by_parameter.get(parameter_id) {
            return link.clone();
        }
        match self.compound.lookup(name, unit_name) {
            Some(component_name) => ComponentLink {
                component_name: Some(component_name.to_string()),
                ..ComponentLink::default()
            },
            None => ComponentLink::default(),
        }
    }

    /// Number of parameters linked by id
    pub fn linked_count(&self) -> usize {
        self.by_parameter.len()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
