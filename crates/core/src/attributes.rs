//! Attribute values and multi-valued attribute maps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::{CaseFoldingMap, KeyComparison};

/// A single attribute value as returned by a backend or supplied in a seed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for null and the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(v) => v.is_empty(),
            _ => false,
        }
    }

    /// Text form used for identity names and query fragments.
    ///
    /// Null has no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Attribute name -> ordered list of values.
pub type AttributeMap = CaseFoldingMap<Vec<AttributeValue>>;

/// Logical query input: attribute name -> query values.
///
/// An attribute that was not supplied is absent from the map; it is never
/// represented by an empty value list.
pub type Seed = AttributeMap;

/// Build a one-entry seed `{attribute: [value]}`.
pub fn seed_for(attribute: &str, value: impl Into<AttributeValue>) -> Seed {
    let mut seed = Seed::new(KeyComparison::CaseSensitive);
    seed.put(attribute, vec![value.into()]);
    seed
}

/// Append `value` to the list stored under `name`, creating it if absent.
pub fn add_value(map: &mut AttributeMap, name: &str, value: AttributeValue) {
    map.get_or_insert_with(name, Vec::new).push(value);
}

/// Build a case-sensitive [`AttributeMap`] from `(name, values)` pairs.
///
/// Mostly useful in tests and when wiring static configuration.
pub fn attribute_map<N, I, V>(pairs: impl IntoIterator<Item = (N, I)>) -> AttributeMap
where
    N: Into<String>,
    I: IntoIterator<Item = V>,
    V: Into<AttributeValue>,
{
    pairs
        .into_iter()
        .map(|(name, values)| {
            let values: Vec<AttributeValue> = values.into_iter().map(Into::into).collect();
            (name, values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_emptiness() {
        assert!(AttributeValue::Null.is_empty());
        assert!(AttributeValue::from("").is_empty());
        assert!(!AttributeValue::from("bob").is_empty());
        assert!(!AttributeValue::Int(0).is_empty());
        assert!(!AttributeValue::Bool(false).is_empty());
    }

    #[test]
    fn test_value_text() {
        assert_eq!(AttributeValue::from("Andrew").to_text().as_deref(), Some("Andrew"));
        assert_eq!(AttributeValue::Int(42).to_text().as_deref(), Some("42"));
        assert_eq!(AttributeValue::Null.to_text(), None);
        assert_eq!(AttributeValue::from(None::<&str>), AttributeValue::Null);
    }

    #[test]
    fn test_value_untagged_serde() {
        let values: Vec<AttributeValue> =
            serde_json::from_str(r#"["blue", 7, true, 1.5, null]"#).unwrap();
        assert_eq!(
            values,
            vec![
                AttributeValue::from("blue"),
                AttributeValue::Int(7),
                AttributeValue::Bool(true),
                AttributeValue::Float(1.5),
                AttributeValue::Null,
            ]
        );
    }

    #[test]
    fn test_add_value_accumulates() {
        let mut map = AttributeMap::case_insensitive();
        add_value(&mut map, "email", "a@x".into());
        add_value(&mut map, "Email", "b@x".into());
        assert_eq!(
            map.get("EMAIL"),
            Some(&vec![AttributeValue::from("a@x"), AttributeValue::from("b@x")])
        );
    }

    #[test]
    fn test_seed_for() {
        let seed = seed_for("username", "bob");
        assert_eq!(seed.get("username"), Some(&vec![AttributeValue::from("bob")]));
        assert_eq!(seed.len(), 1);
    }
}
