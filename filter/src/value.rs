use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single service property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A boolean flag.
    Boolean(bool),

    /// A signed integer.
    Long(i64),

    /// A floating point number.
    Double(f64),

    /// A string.
    String(String),

    /// A list of values. Filters match a list if any element matches.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// The string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer value.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The list elements, if this is a list value.
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(v) => v.fmt(f),
            PropertyValue::Long(v) => v.fmt(f),
            PropertyValue::Double(v) => v.fmt(f),
            PropertyValue::String(v) => v.fmt(f),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt(f)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Long(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Long(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl<T> From<Vec<T>> for PropertyValue
where
    T: Into<PropertyValue>,
{
    fn from(value: Vec<T>) -> Self {
        PropertyValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// Service properties, keyed case-insensitively.
///
/// The original spelling of each key is preserved for iteration and
/// serialization; lookups ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, PropertyValue>",
    into = "BTreeMap<String, PropertyValue>"
)]
pub struct Properties {
    // lowercased key -> (original key, value)
    entries: BTreeMap<String, (String, PropertyValue)>,
}

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, returning the updated set.
    #[must_use]
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        self.insert(key, value);
        self
    }

    /// Insert a property, replacing any value stored under the same key
    /// regardless of case.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<PropertyValue>
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let key = key.into();
        self.entries
            .insert(key.to_ascii_lowercase(), (key, value.into()))
            .map(|(_, old)| old)
    }

    /// Look up a property by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    /// Remove a property by key, ignoring case.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries
            .remove(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    /// Check whether a key is present, ignoring case.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Iterate over the properties with their original key spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        properties.extend(iter);
        properties
    }
}

impl<K, V> Extend<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl From<BTreeMap<String, PropertyValue>> for Properties {
    fn from(value: BTreeMap<String, PropertyValue>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Properties> for BTreeMap<String, PropertyValue> {
    fn from(value: Properties) -> Self {
        value.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut properties = Properties::new().with("Color", "red");
        assert_eq!(properties.get("color"), Some(&PropertyValue::from("red")));
        assert_eq!(properties.get("COLOR"), Some(&PropertyValue::from("red")));

        let old = properties.insert("COLOR", "blue");
        assert_eq!(old, Some(PropertyValue::from("red")));
        assert_eq!(properties.len(), 1);

        let keys: Vec<_> = properties.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["COLOR"]);
    }

    #[test]
    fn remove_ignores_case() {
        let mut properties = Properties::new().with("service.ranking", 3);
        assert!(properties.contains_key("Service.Ranking"));
        assert_eq!(
            properties.remove("SERVICE.RANKING"),
            Some(PropertyValue::Long(3))
        );
        assert!(properties.is_empty());
    }

    #[test]
    fn deserialize_untagged_values() {
        let properties: Properties = serde_json::from_str(
            r#"{"color": "red", "service.ranking": 10, "weight": 1.5, "enabled": true, "tags": ["a", "b"]}"#,
        )
        .unwrap();

        assert_eq!(properties.get("color"), Some(&PropertyValue::from("red")));
        assert_eq!(
            properties.get("service.ranking"),
            Some(&PropertyValue::Long(10))
        );
        assert_eq!(properties.get("weight"), Some(&PropertyValue::Double(1.5)));
        assert_eq!(properties.get("enabled"), Some(&PropertyValue::Boolean(true)));
        assert_eq!(
            properties.get("tags"),
            Some(&PropertyValue::from(vec!["a", "b"]))
        );
    }

    #[test]
    fn display_list() {
        let value = PropertyValue::from(vec![1, 2, 3]);
        assert_eq!(value.to_string(), "[1, 2, 3]");
    }
}
