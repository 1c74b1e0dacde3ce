//! Resolved person attribute sets.
//!
//! An [`AttributeSet`] is the normalized output of a resolution call: a
//! multi-valued attribute map plus the designated identity. The key
//! comparison of the map (case-sensitive or not) is injected at
//! construction and never mixed within one set.

use serde::Serialize;

use crate::attributes::{AttributeMap, AttributeValue};
use crate::container::KeyComparison;

/// Where the canonical subject identity of an [`AttributeSet`] comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    /// The identity is this name verbatim.
    Named(String),
    /// The identity is the value of this attribute. When the attribute is
    /// not present the identity is deferred and [`AttributeSet::name`]
    /// returns `None`.
    Attribute(String),
}

/// Immutable set of resolved attributes for one person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSet {
    identity: Identity,
    attributes: AttributeMap,
}

impl AttributeSet {
    pub fn new(identity: Identity, attributes: AttributeMap) -> Self {
        Self {
            identity,
            attributes,
        }
    }

    /// Identity bound to a fixed name.
    pub fn named(name: impl Into<String>, attributes: AttributeMap) -> Self {
        Self::new(Identity::Named(name.into()), attributes)
    }

    /// Identity bound to the value(s) of `attribute`.
    pub fn attribute_named(attribute: impl Into<String>, attributes: AttributeMap) -> Self {
        Self::new(Identity::Attribute(attribute.into()), attributes)
    }

    /// Rebuild this set with a different key comparison mode.
    pub fn with_comparison(self, comparison: KeyComparison) -> Self {
        Self {
            identity: self.identity,
            attributes: self.attributes.with_comparison(comparison),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The resolved identity name, or `None` while it is deferred.
    pub fn name(&self) -> Option<String> {
        match &self.identity {
            Identity::Named(name) => Some(name.clone()),
            Identity::Attribute(attr) => self
                .attributes
                .get(attr)?
                .iter()
                .find_map(AttributeValue::to_text),
        }
    }

    /// All values backing an attribute-bound identity.
    pub fn identity_values(&self) -> Option<&[AttributeValue]> {
        match &self.identity {
            Identity::Named(_) => None,
            Identity::Attribute(attr) => self.attribute(attr),
        }
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// First value of an attribute.
    pub fn attribute_value(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).and_then(|values| values.first())
    }

    pub fn into_parts(self) -> (Identity, AttributeMap) {
        (self.identity, self.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attribute_map;

    #[test]
    fn test_named_identity() {
        let set = AttributeSet::named("bob123", attribute_map([("mail", ["bob@x"])]));
        assert_eq!(set.name().as_deref(), Some("bob123"));
        assert!(set.identity_values().is_none());
    }

    #[test]
    fn test_attribute_identity_resolves_first_value() {
        let set = AttributeSet::attribute_named(
            "uid",
            attribute_map([("uid", vec!["awp9", "andrew"]), ("mail", vec!["a@x"])]),
        );
        assert_eq!(set.name().as_deref(), Some("awp9"));
        assert_eq!(set.identity_values().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_deferred_identity() {
        let set = AttributeSet::attribute_named("uid", attribute_map([("mail", ["a@x"])]));
        assert_eq!(set.identity(), &Identity::Attribute("uid".into()));
        assert_eq!(set.name(), None);
    }

    #[test]
    fn test_with_comparison() {
        let set = AttributeSet::named("bob", attribute_map([("Email", ["b@x"])]));
        assert!(set.attribute("email").is_none());
        let folded = set.with_comparison(KeyComparison::CaseInsensitive);
        assert_eq!(folded.attribute_value("email"), Some(&AttributeValue::from("b@x")));
        assert_eq!(folded.attributes().keys().collect::<Vec<_>>(), vec!["Email"]);
    }
}
