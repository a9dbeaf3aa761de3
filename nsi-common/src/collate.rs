//! Russian collation for display ordering
//!
//! Entity and directory lists are presented in Russian alphabetical order:
//! Cyrillic before Latin, `ё` sorted between `е` and `ж`, case only breaking
//! ties (lower case first). The comparator is a total order, so sorting is
//! deterministic for any input.

use std::cmp::Ordering;

/// Script class weights; lower sorts first
fn class_of(c: char) -> u8 {
    if c.is_whitespace() {
        0
    } else if c.is_ascii_punctuation() {
        1
    } else if c.is_numeric() {
        2
    } else if ('\u{0400}'..='\u{04FF}').contains(&c) {
        3
    } else if c.is_ascii_alphabetic() {
        4
    } else {
        5
    }
}

/// Primary weight of one already-lowercased character
fn primary_weight(c: char) -> (u8, u32) {
    let weight = match c {
        // ё sits right after е in the alphabet
        'ё' => ('е' as u32) * 2 + 1,
        other => (other as u32) * 2,
    };
    (class_of(c), weight)
}

fn primary_key(s: &str) -> impl Iterator<Item = (u8, u32)> + '_ {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(primary_weight)
}

fn case_key(s: &str) -> impl Iterator<Item = bool> + '_ {
    s.chars().map(char::is_uppercase)
}

/// Compare two strings in Russian collation order.
///
/// # Examples
///
/// ```
/// use nsi_common::collate::compare_ru;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_ru("Агрегат", "Блок"), Ordering::Less);
/// assert_eq!(compare_ru("ель", "ёж"), Ordering::Less);
/// assert_eq!(compare_ru("ёж", "жук"), Ordering::Less);
/// assert_eq!(compare_ru("б", "Б"), Ordering::Less);
/// ```
pub fn compare_ru(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(primary_key(b))
        .then_with(|| case_key(a).cmp(case_key(b)))
        .then_with(|| a.cmp(b))
}

/// Sort items in place by a display name
pub fn sort_by_name_ru<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| compare_ru(name(a), name(b)));
}

/// Compare optional names, treating a missing name as the empty string
pub fn compare_optional_ru(a: Option<&str>, b: Option<&str>) -> Ordering {
    compare_ru(a.unwrap_or(""), b.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut items: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        sort_by_name_ru(&mut items, |s| s.as_str());
        items
    }

    #[test]
    fn test_cyrillic_alphabet_order() {
        assert_eq!(sorted(&["Блок", "Агрегат"]), vec!["Агрегат", "Блок"]);
        assert_eq!(
            sorted(&["жук", "ёж", "ель", "дом"]),
            vec!["дом", "ель", "ёж", "жук"]
        );
    }

    #[test]
    fn test_case_is_tie_breaker_only() {
        assert_eq!(sorted(&["Б", "б"]), vec!["б", "Б"]);
        assert_eq!(sorted(&["б", "Б"]), vec!["б", "Б"]);
        assert_eq!(sorted(&["Бета", "альфа"]), vec!["альфа", "Бета"]);
    }

    #[test]
    fn test_cyrillic_before_latin_and_digits_first() {
        assert_eq!(
            sorted(&["Zeta", "Яблоко", "10 мм", "alpha"]),
            vec!["10 мм", "Яблоко", "alpha", "Zeta"]
        );
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(compare_ru("Опора", "Опора ЛЭП"), Ordering::Less);
        assert_eq!(compare_ru("", "а"), Ordering::Less);
        assert_eq!(compare_ru("а", "а"), Ordering::Equal);
    }

    #[test]
    fn test_optional_names() {
        assert_eq!(compare_optional_ru(None, Some("Альбом")), Ordering::Less);
        assert_eq!(compare_optional_ru(Some("Альбом"), Some("База")), Ordering::Less);
        assert_eq!(compare_optional_ru(Some("База"), Some("Альбом")), Ordering::Greater);
    }
}
