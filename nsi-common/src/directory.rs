//! Directory resolvers
//!
//! Directories are small reference lists (units, sources, categories,
//! statuses, severities, components, object types). They are turned into
//! [`DirectoryOption`]s and indexed by id in a [`DirectoryLookup`] so that
//! foreign-key fields of primary entities can be given display names.
//! A lookup belongs to exactly one fetch batch and is rebuilt, never patched,
//! on refetch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::collate::sort_by_name_ru;
use crate::fields::pick_string;

/// One entry of a reference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryOption {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend class tag, for directories whose entries are typed objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<String>,
}

impl DirectoryOption {
    /// Option with only identity and name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: None,
            description: None,
            cls: None,
        }
    }
}

/// Build a directory option from a raw record.
///
/// `id` is the first usable value under `id_keys`, else `fallback_id`;
/// `name` is the first usable value under `name_keys`, else the id.
///
/// # Examples
///
/// ```
/// use nsi_common::directory::to_directory_option;
/// use serde_json::json;
///
/// let option = to_directory_option(&json!({"measure_id": 4, "shortName": "мм"}), "unit-0",
///     &["id", "measure_id"], &["name", "shortName"]);
/// assert_eq!(option.id, "4");
/// assert_eq!(option.name, "мм");
///
/// let option = to_directory_option(&json!({}), "unit-3", &["id"], &["name"]);
/// assert_eq!((option.id.as_str(), option.name.as_str()), ("unit-3", "unit-3"));
/// ```
pub fn to_directory_option(
    raw: &Value,
    fallback_id: &str,
    id_keys: &[&str],
    name_keys: &[&str],
) -> DirectoryOption {
    let (id, name) = match raw.as_object() {
        Some(map) => (pick_string(map, id_keys), pick_string(map, name_keys)),
        None => (None, None),
    };
    let id = id.unwrap_or_else(|| fallback_id.to_string());
    let name = name.unwrap_or_else(|| id.clone());
    DirectoryOption::new(id, name)
}

/// Map every record of a directory payload, using `<prefix>-<index>` as the
/// positional fallback id
pub fn to_directory_options(
    records: &[Value],
    fallback_prefix: &str,
    id_keys: &[&str],
    name_keys: &[&str],
) -> Vec<DirectoryOption> {
    records
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            to_directory_option(
                raw,
                &format!("{}-{}", fallback_prefix, index),
                id_keys,
                name_keys,
            )
        })
        .collect()
}

/// Directory options indexed by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryLookup {
    entries: BTreeMap<String, DirectoryOption>,
}

impl DirectoryLookup {
    /// Option by id
    pub fn get(&self, id: &str) -> Option<&DirectoryOption> {
        self.entries.get(id)
    }

    /// Display name by id
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|option| option.name.as_str())
    }

    /// Display name for an optional id
    pub fn resolve(&self, id: Option<&str>) -> Option<String> {
        id.and_then(|id| self.name_of(id)).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &DirectoryOption> {
        self.entries.values()
    }
}

/// Index options by id in one pass; a later duplicate id replaces an earlier one
pub fn build_lookup(options: &[DirectoryOption]) -> DirectoryLookup {
    let entries = options
        .iter()
        .map(|option| (option.id.clone(), option.clone()))
        .collect();
    DirectoryLookup { entries }
}

/// Sort options by name in Russian collation
pub fn sort_options(mut options: Vec<DirectoryOption>) -> Vec<DirectoryOption> {
    sort_by_name_ru(&mut options, |option| option.name.as_str());
    options
}

/// Display name of a relation: the directory entry for `id` first, then the
/// name the record carries inline
pub fn resolve_name(
    lookup: &DirectoryLookup,
    id: Option<&str>,
    inline_name: Option<String>,
) -> Option<String> {
    lookup.resolve(id).or(inline_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID_KEYS: &[&str] = &["id", "measureId", "measure_id"];
    const NAME_KEYS: &[&str] = &["name", "shortName", "title"];

    #[test]
    fn test_fallback_when_no_id_key() {
        let option = to_directory_option(&json!({"other": 1}), "unit-7", ID_KEYS, NAME_KEYS);
        assert_eq!(option, DirectoryOption::new("unit-7", "unit-7"));

        let option = to_directory_option(&json!("garbage"), "unit-8", ID_KEYS, NAME_KEYS);
        assert_eq!(option, DirectoryOption::new("unit-8", "unit-8"));
    }

    #[test]
    fn test_name_defaults_to_id() {
        let option = to_directory_option(&json!({"measureId": 12}), "x", ID_KEYS, NAME_KEYS);
        assert_eq!(option, DirectoryOption::new("12", "12"));
    }

    #[test]
    fn test_key_probing_order() {
        let raw = json!({"measure_id": "b", "measureId": "a", "title": "T", "shortName": "S"});
        let option = to_directory_option(&raw, "x", ID_KEYS, NAME_KEYS);
        assert_eq!(option, DirectoryOption::new("a", "S"));
    }

    #[test]
    fn test_positional_fallback_ids() {
        let records = vec![json!({"name": "мм"}), json!({"id": 3, "name": "кг"})];
        let options = to_directory_options(&records, "unit", ID_KEYS, NAME_KEYS);
        assert_eq!(options[0].id, "unit-0");
        assert_eq!(options[1].id, "3");
    }

    #[test]
    fn test_lookup_last_write_wins() {
        let lookup = build_lookup(&[
            DirectoryOption::new("1", "Первый"),
            DirectoryOption::new("2", "Второй"),
            DirectoryOption::new("1", "Заменён"),
        ]);
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.name_of("1"), Some("Заменён"));
        assert_eq!(lookup.name_of("3"), None);
    }

    #[test]
    fn test_resolve_name_prefers_directory() {
        let lookup = build_lookup(&[DirectoryOption::new("deg", "°C")]);
        assert_eq!(
            resolve_name(&lookup, Some("deg"), Some("градусы".to_string())),
            Some("°C".to_string())
        );
        assert_eq!(
            resolve_name(&lookup, Some("missing"), Some("градусы".to_string())),
            Some("градусы".to_string())
        );
        assert_eq!(resolve_name(&lookup, None, None), None);
    }

    #[test]
    fn test_sort_options() {
        let sorted = sort_options(vec![
            DirectoryOption::new("2", "Шпала"),
            DirectoryOption::new("1", "Рельс"),
        ]);
        assert_eq!(sorted[0].name, "Рельс");
    }
}
