//! Declarative field-alias tables
//!
//! Upstream records spell the same logical attribute in several ways
//! (`unitId`, `unit_id`, `measureId`, ...). Each entity declares one
//! [`AliasTable`] mapping a logical field to its ordered list of accepted wire
//! names, and every mapper reads fields through [`RawRecord`]. The key order
//! is a contract: the first key holding a usable value wins.

use serde_json::{Map, Value};

use crate::value::{normalize_integer, normalize_number, normalize_string, parse_flag};

/// Logical field → ordered wire-name candidates
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    /// Entity the table belongs to (used in diagnostics)
    pub entity: &'static str,
    /// `(logical field, wire keys)` pairs
    pub fields: &'static [(&'static str, &'static [&'static str])],
}

impl AliasTable {
    /// Wire keys for a logical field, in probing order.
    ///
    /// Unknown fields have no keys, so lookups through them resolve to nothing.
    pub fn keys(&self, field: &str) -> &'static [&'static str] {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, keys)| *keys)
            .unwrap_or(&[])
    }

    /// Whether the table declares a logical field
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| *name == field)
    }

    /// Wrap a raw record for field resolution through this table
    pub fn record<'a>(&'static self, raw: &'a Value) -> RawRecord<'a> {
        RawRecord {
            map: raw.as_object(),
            aliases: self,
        }
    }
}

/// First non-empty string (or finite number, stringified) under `keys`
pub fn pick_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(normalize_string))
}

/// First parsable number under `keys`
pub fn pick_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(normalize_number))
}

/// First integral number under `keys`
pub fn pick_integer(map: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| map.get(*key).and_then(normalize_integer))
}

/// First decidable flag under `keys`; `false` when none decides
pub fn pick_bool(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(parse_flag))
        .unwrap_or(false)
}

/// First value under `keys` that is present and not null
pub fn pick_value<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| map.get(*key).filter(|value| !value.is_null()))
}

/// A raw upstream record viewed through an entity's alias table.
///
/// Non-object records behave as empty objects.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    map: Option<&'a Map<String, Value>>,
    aliases: &'static AliasTable,
}

impl<'a> RawRecord<'a> {
    fn with_map<T>(&self, f: impl FnOnce(&'a Map<String, Value>) -> Option<T>) -> Option<T> {
        self.map.and_then(f)
    }

    /// Resolve a logical field as a string
    pub fn string(&self, field: &str) -> Option<String> {
        let keys = self.aliases.keys(field);
        self.with_map(|map| pick_string(map, keys))
    }

    /// Resolve a logical field as a number
    pub fn number(&self, field: &str) -> Option<f64> {
        let keys = self.aliases.keys(field);
        self.with_map(|map| pick_number(map, keys))
    }

    /// Resolve a logical field as an integer
    pub fn integer(&self, field: &str) -> Option<i64> {
        let keys = self.aliases.keys(field);
        self.with_map(|map| pick_integer(map, keys))
    }

    /// Resolve a logical field as a flag
    pub fn flag(&self, field: &str) -> bool {
        let keys = self.aliases.keys(field);
        self.map.map_or(false, |map| pick_bool(map, keys))
    }

    /// Resolve a logical field as a raw value
    pub fn value(&self, field: &str) -> Option<&'a Value> {
        let keys = self.aliases.keys(field);
        self.with_map(|map| pick_value(map, keys))
    }

    /// Whether the underlying record is a JSON object
    pub fn is_object(&self) -> bool {
        self.map.is_some()
    }
}
