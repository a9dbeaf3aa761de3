//! Text and value normalizers
//!
//! Total functions that coerce loosely-typed JSON values coming from the
//! backend into canonical strings, numbers and flags. None of them fail:
//! unusable input maps to `None` (or `false` for flags).

use serde_json::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strings accepted as `true`
const TRUTHY: [&str; 5] = ["1", "true", "yes", "y", "checked"];

/// Strings accepted as `false`
const FALSY: [&str; 4] = ["0", "false", "no", "n"];

/// Largest float that still holds every smaller integer exactly (2^53 - 1)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Canonical string form of a scalar value.
///
/// Strings are trimmed, finite numbers are stringified. Empty strings and
/// every other JSON type yield `None`.
///
/// # Examples
///
/// ```
/// use nsi_common::value::normalize_string;
/// use serde_json::json;
///
/// assert_eq!(normalize_string(&json!("  Рельс ")), Some("Рельс".to_string()));
/// assert_eq!(normalize_string(&json!(42)), Some("42".to_string()));
/// assert_eq!(normalize_string(&json!("   ")), None);
/// assert_eq!(normalize_string(&json!(null)), None);
/// ```
pub fn normalize_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Some(n.to_string());
            }
            let float = n.as_f64().filter(|v| v.is_finite())?;
            if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER {
                // 1.0 and 1 name the same record
                Some((float as i64).to_string())
            } else {
                Some(n.to_string())
            }
        }
        _ => None,
    }
}

/// Trimmed string or empty string, for fields where absence and emptiness
/// mean the same thing
pub fn trimmed_string(value: &Value) -> String {
    normalize_string(value).unwrap_or_default()
}

/// Canonical numeric form of a scalar value.
///
/// Accepts finite JSON numbers and numeric strings; the first `,` in a string
/// is treated as the decimal separator.
///
/// # Examples
///
/// ```
/// use nsi_common::value::normalize_number;
/// use serde_json::json;
///
/// assert_eq!(normalize_number(&json!(12.5)), Some(12.5));
/// assert_eq!(normalize_number(&json!(" 0,75 ")), Some(0.75));
/// assert_eq!(normalize_number(&json!("abc")), None);
/// assert_eq!(normalize_number(&json!(true)), None);
/// ```
pub fn normalize_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let normalized = s.trim().replacen(',', ".", 1);
            if normalized.is_empty() {
                return None;
            }
            normalized.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Integer form of a value, accepted only when the number has no fraction
pub fn normalize_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let number = normalize_number(value)?;
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

/// Decide a flag if the value is recognisably true or false.
///
/// Returns `None` for values that carry no decision (empty strings,
/// unrecognised words, null, containers) so callers probing several keys can
/// move on to the next candidate.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            if TRUTHY.contains(&normalized.as_str()) {
                Some(true)
            } else if FALSY.contains(&normalized.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Canonical flag form of a value; anything undecided is `false`
pub fn normalize_bool(value: &Value) -> bool {
    parse_flag(value).unwrap_or(false)
}

/// Fold text for substring search.
///
/// Lowercases, strips combining accents, maps `ё` to `е` and collapses
/// whitespace runs to single spaces. `й` is a letter of its own and keeps
/// its breve.
///
/// ```
/// use nsi_common::value::normalize_text;
///
/// assert_eq!(normalize_text("  Ёмкость   Café "), "емкость cafe");
/// assert_eq!(normalize_text("Стройка"), "стройка");
/// ```
pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.nfc().flat_map(char::to_lowercase) {
        match c {
            'ё' => folded.push('е'),
            'й' => folded.push('й'),
            other => folded.extend(
                std::iter::once(other)
                    .nfd()
                    .filter(|c| !is_combining_mark(*c)),
            ),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Code normalisation: whitespace removed, upper-cased
pub fn normalize_code(value: &Value) -> Option<String> {
    let trimmed = normalize_string(value)?;
    let code: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    Some(code)
}

/// Multi-line text normalisation: trimmed, line-break runs collapsed to a
/// single `\n`
pub fn normalize_multiline(value: &Value) -> Option<String> {
    let trimmed = normalize_string(value)?;
    let mut out = String::with_capacity(trimmed.len());
    let mut in_break = false;
    for c in trimmed.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push('\n');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    Some(out)
}

/// JavaScript-style truthiness, used to decide whether an envelope field is set
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
