//! Directory attribute values and the normalized user record built from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod groups;
pub mod sanitize;

pub use groups::extract_groups;
pub use sanitize::sanitize;

/// Attribute holding the DNs of the groups a principal belongs to.
pub const MEMBERSHIP_KEY: &str = "memberof";

/// Key under which the derived group names are exposed on a user record.
pub const GROUPS_KEY: &str = "groups";

/// A single directory attribute value.
///
/// Directories hand back every attribute as a list; after sanitizing, lists
/// holding exactly one value are collapsed to `Single`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttributeValue {
    pub fn values(&self) -> &[String] {
        match self {
            AttributeValue::Single(value) => std::slice::from_ref(value),
            AttributeValue::Multi(values) => values,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }

    /// Collapses a one-element list into a scalar. Anything else is left alone.
    pub fn collapse(self) -> Self {
        match self {
            AttributeValue::Multi(mut values) if values.len() == 1 => {
                AttributeValue::Single(values.remove(0))
            }
            other => other,
        }
    }

    pub fn into_multi(self) -> Self {
        match self {
            AttributeValue::Single(value) => AttributeValue::Multi(vec![value]),
            multi => multi,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Single(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::Multi(values)
    }
}

/// Attributes of one directory entry, keyed by lower-case attribute name.
pub type RawAttributeSet = BTreeMap<String, AttributeValue>;

/// The result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedUserRecord {
    #[serde(flatten)]
    pub attributes: RawAttributeSet,
    pub groups: Vec<String>,
}

impl NormalizedUserRecord {
    /// Builds the record from already sanitized attributes, deriving `groups`
    /// from the membership attribute.
    pub fn from_sanitized(mut attributes: RawAttributeSet) -> Self {
        // The derived list always wins over a directory attribute of the same name.
        attributes.remove(GROUPS_KEY);

        let groups = attributes
            .get(MEMBERSHIP_KEY)
            .map(|memberships| extract_groups(memberships.values()))
            .unwrap_or_default();

        Self { attributes, groups }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::first)
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
