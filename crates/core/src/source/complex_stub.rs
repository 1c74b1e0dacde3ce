//! In-memory source over a keyed backing collection, with wildcard lookups.

use tracing::debug;

use super::{non_empty, AttributeSource};
use crate::attributes::{AttributeMap, AttributeValue, Seed};
use crate::container::CaseFoldingMap;
use crate::errors::CoreError;
use crate::identity::IdentityResolver;
use crate::mapping::QueryAttributeMapping;
use crate::person::AttributeSet;
use crate::query::{Append, QueryBuilder};
use crate::wildcard::{has_wildcard, WildcardMatcher};

/// Backing collection: key value -> that person's attributes. A key may be
/// present without attributes.
pub type BackingCollection = CaseFoldingMap<Option<AttributeMap>>;

/// Looks people up in a keyed in-memory collection.
///
/// The first value of the query attribute (the identity attribute unless
/// configured otherwise) selects entries, exactly or by wildcard.
#[derive(Debug, Clone)]
pub struct ComplexStubSource {
    backing: BackingCollection,
    query_attribute: Option<String>,
    identity: IdentityResolver,
    queries: QueryBuilder,
    possible_names: Vec<String>,
}

impl ComplexStubSource {
    pub fn new(backing: BackingCollection) -> Self {
        let mut possible_names: Vec<String> = Vec::new();
        for name in backing.values().flatten().flat_map(|attrs| attrs.keys()) {
            if !possible_names.iter().any(|n| n == name) {
                possible_names.push(name.to_string());
            }
        }
        Self {
            backing,
            query_attribute: None,
            identity: IdentityResolver::default(),
            queries: QueryBuilder::new(QueryAttributeMapping::new()).use_all_query_attributes(true),
            possible_names,
        }
    }

    /// Match backing keys against this seed attribute instead of the
    /// identity attribute.
    pub fn with_query_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.query_attribute = Some(attribute.into());
        self
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the query builder, e.g. to rename seed attributes first.
    pub fn with_query_builder(mut self, queries: QueryBuilder) -> Self {
        self.queries = queries;
        self
    }

    pub fn backing(&self) -> &BackingCollection {
        &self.backing
    }

    fn key_attribute(&self) -> &str {
        self.query_attribute
            .as_deref()
            .unwrap_or_else(|| self.identity.attribute())
    }
}

impl AttributeSource for ComplexStubSource {
    fn name(&self) -> &str {
        "complex_stub"
    }

    fn identity_attribute(&self) -> &str {
        self.identity.attribute()
    }

    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        let key_attribute = self.key_attribute();
        let first_match = |accumulated: Option<String>, attribute: &str, values: &[AttributeValue]| {
            if accumulated.is_some() || attribute != key_attribute {
                return Append::Skipped(accumulated);
            }
            match values.first().and_then(AttributeValue::to_text) {
                Some(text) => Append::Accepted {
                    fragment: text,
                    parameters: Vec::new(),
                },
                None => Append::Skipped(None),
            }
        };

        let Some(built) = self.queries.build(seed, &first_match) else {
            return Ok(None);
        };
        let seed_value = built.fragment;

        let Some(matches) = WildcardMatcher.lookup(&seed_value, &self.backing)? else {
            debug!(query = %seed_value, "no backing entry");
            return Ok(None);
        };

        let fallback = match (&self.query_attribute, has_wildcard(&seed_value)) {
            (Some(attribute), false) => Some((attribute.as_str(), seed_value.as_str())),
            _ => None,
        };

        let people = matches
            .into_iter()
            .filter_map(|m| m.value)
            .map(|attributes| self.identity.resolve(attributes.clone(), hint, fallback))
            .collect();
        Ok(non_empty(people))
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        Some(self.possible_names.clone())
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        Some(vec![self.identity.attribute().to_string()])
    }
}
