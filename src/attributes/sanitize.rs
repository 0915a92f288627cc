use super::{AttributeValue, RawAttributeSet, MEMBERSHIP_KEY};
use std::collections::BTreeSet;

/// Strips noise from a raw attribute set.
///
/// Positional keys and keys in `ignored` are dropped. One-element lists are
/// collapsed to scalars, except for the membership attribute which is always
/// kept as a list.
pub fn sanitize(raw: RawAttributeSet, ignored: &BTreeSet<String>) -> RawAttributeSet {
    raw.into_iter()
        .filter(|(key, _)| !is_positional(key) && !ignored.contains(key))
        .map(|(key, value)| {
            let value = if key == MEMBERSHIP_KEY {
                value.into_multi()
            } else {
                value.collapse()
            };
            (key, value)
        })
        .collect()
}

/// A key is positional when it is the canonical decimal form of an integer:
/// `"0"`, `"7"` and `"-1"` are, while `"012"`, `"+1"`, `"-0"` and `"1a"` are not.
fn is_positional(key: &str) -> bool {
    key.parse::<i64>()
        .map_or(false, |index| index.to_string() == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignored() -> BTreeSet<String> {
        ["distinguishedname", "dn", "objectcategory", "objectclass"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn multi(values: &[&str]) -> AttributeValue {
        AttributeValue::Multi(values.iter().map(|v| v.to_string()).collect())
    }

    fn sample() -> RawAttributeSet {
        let mut raw = RawAttributeSet::new();
        raw.insert("0".to_string(), multi(&["cn"]));
        raw.insert("12".to_string(), multi(&["mail"]));
        raw.insert("dn".to_string(), "CN=Jane,DC=example".into());
        raw.insert("objectclass".to_string(), multi(&["top", "person", "user"]));
        raw.insert("cn".to_string(), multi(&["Jane Doe"]));
        raw.insert("proxyaddresses".to_string(), multi(&["smtp:a@x", "smtp:b@x"]));
        raw.insert("othertelephone".to_string(), multi(&[]));
        raw.insert("memberof".to_string(), multi(&["CN=Admins,DC=example"]));
        raw
    }

    #[test]
    fn test_drops_ignored_and_positional_keys() {
        let clean = sanitize(sample(), &ignored());

        for key in ["0", "12", "dn", "objectclass"] {
            assert!(!clean.contains_key(key), "{} should be dropped", key);
        }
        assert_eq!(clean.len(), 4);
    }

    #[test]
    fn test_ignored_keys_are_case_sensitive() {
        let mut raw = RawAttributeSet::new();
        raw.insert("DN".to_string(), "CN=Jane".into());
        let clean = sanitize(raw, &ignored());
        assert!(clean.contains_key("DN"));
    }

    #[test]
    fn test_collapses_single_element_lists() {
        let clean = sanitize(sample(), &ignored());

        assert_eq!(clean["cn"], AttributeValue::from("Jane Doe"));
        assert_eq!(clean["proxyaddresses"], multi(&["smtp:a@x", "smtp:b@x"]));
        assert_eq!(clean["othertelephone"], multi(&[]));
    }

    #[test]
    fn test_membership_stays_a_list() {
        let clean = sanitize(sample(), &ignored());
        assert_eq!(clean["memberof"], multi(&["CN=Admins,DC=example"]));

        let mut raw = RawAttributeSet::new();
        raw.insert("memberof".to_string(), "CN=Staff,DC=example".into());
        let clean = sanitize(raw, &ignored());
        assert_eq!(clean["memberof"], multi(&["CN=Staff,DC=example"]));
    }

    #[test]
    fn test_only_canonical_integer_keys_are_positional() {
        let mut raw = RawAttributeSet::new();
        for key in ["-1", "7", "1a", "", "012", "+1", "-0"] {
            raw.insert(key.to_string(), "x".into());
        }

        let clean = sanitize(raw, &BTreeSet::new());

        let kept: Vec<&str> = clean.keys().map(String::as_str).collect();
        assert_eq!(kept, vec!["", "+1", "-0", "012", "1a"]);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let keys = ignored();
        let once = sanitize(sample(), &keys);
        let twice = sanitize(once.clone(), &keys);
        assert_eq!(once, twice);
    }
}
