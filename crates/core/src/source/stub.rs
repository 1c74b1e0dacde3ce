//! Source that returns one fixed person for every query.

use super::AttributeSource;
use crate::attributes::{AttributeMap, Seed};
use crate::errors::CoreError;
use crate::identity::DEFAULT_IDENTITY_ATTRIBUTE;
use crate::person::AttributeSet;

/// Returns its backing attribute set for every query, or `None` when it has
/// no backing set.
#[derive(Debug, Clone, Default)]
pub struct StubSource {
    backing: Option<AttributeSet>,
}

impl StubSource {
    /// Back the stub with `attributes`; the identity is the `username`
    /// attribute.
    pub fn new(attributes: AttributeMap) -> Self {
        Self {
            backing: Some(AttributeSet::attribute_named(
                DEFAULT_IDENTITY_ATTRIBUTE,
                attributes,
            )),
        }
    }

    /// A stub with no backing person.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn backing(&self) -> Option<&AttributeSet> {
        self.backing.as_ref()
    }
}

impl AttributeSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    fn identity_attribute(&self) -> &str {
        DEFAULT_IDENTITY_ATTRIBUTE
    }

    fn query(&self, _seed: &Seed, _hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        Ok(self.backing.clone().map(|person| vec![person]))
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        Some(
            self.backing
                .iter()
                .flat_map(|person| person.attributes().keys().map(str::to_string))
                .collect(),
        )
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{attribute_map, seed_for, AttributeValue};

    #[test]
    fn test_same_person_for_any_query() {
        let stub = StubSource::new(attribute_map([
            ("username", vec!["awp9"]),
            ("shirtColor", vec!["blue"]),
        ]));
        let person = stub.person("anyone").unwrap().unwrap();
        assert_eq!(person.name().as_deref(), Some("awp9"));

        let people = stub.people(&seed_for("mail", "x@y")).unwrap().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(
            people[0].attribute_value("shirtColor"),
            Some(&AttributeValue::from("blue"))
        );
        assert_eq!(
            stub.possible_attribute_names(),
            Some(vec!["username".to_string(), "shirtColor".to_string()])
        );
        assert!(stub.available_query_attributes().is_none());
    }

    #[test]
    fn test_empty_stub() {
        let stub = StubSource::empty();
        assert!(stub.person("awp9").unwrap().is_none());
        assert_eq!(stub.possible_attribute_names(), Some(Vec::new()));
    }
}
