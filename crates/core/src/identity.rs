//! Canonical identity selection for resolved attribute sets.

use tracing::debug;

use crate::attributes::AttributeMap;
use crate::person::{AttributeSet, Identity};

/// Default name of the identity (username) attribute.
pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "username";

/// Assigns the identity of a pivoted attribute map.
///
/// The branches are evaluated in a fixed order and the first that applies
/// wins:
///
/// 1. a configured identity attribute present in the map
/// 2. the identity hint supplied with the query
/// 3. a seed-derived fallback whose seed attribute is the identity attribute
/// 4. the identity attribute name with a deferred value
///
/// This order is kept for compatibility with existing consumers even where
/// it looks inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResolver {
    attribute: String,
    /// Whether `attribute` was configured explicitly rather than defaulted.
    explicit: bool,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_IDENTITY_ATTRIBUTE.to_string(),
            explicit: false,
        }
    }
}

impl IdentityResolver {
    /// Resolver with an explicitly configured identity attribute.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            explicit: true,
        }
    }

    /// Build from an optional configured attribute name.
    pub fn from_config(attribute: Option<&str>) -> Self {
        attribute.map(Self::new).unwrap_or_default()
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Bind an identity to `attributes`.
    ///
    /// `fallback` is `(seed attribute, value)` taken from the query seed.
    pub fn resolve(
        &self,
        attributes: AttributeMap,
        hint: Option<&str>,
        fallback: Option<(&str, &str)>,
    ) -> AttributeSet {
        if self.explicit && attributes.contains_key(&self.attribute) {
            debug!(attribute = %self.attribute, "identity bound to configured attribute");
            return AttributeSet::attribute_named(self.attribute.clone(), attributes);
        }

        if let Some(hint) = hint {
            debug!(hint, "identity bound to query hint");
            return AttributeSet::named(hint, attributes);
        }

        if let Some((seed_attribute, value)) = fallback {
            if seed_attribute == self.attribute {
                debug!(seed_attribute, "identity bound to seed value");
                return AttributeSet::named(value, attributes);
            }
        }

        debug!(attribute = %self.attribute, "identity deferred");
        AttributeSet::new(Identity::Attribute(self.attribute.clone()), attributes)
    }
}
