//! Translation of a logical seed into backend query fragments.
//!
//! [`QueryBuilder`] walks the seed in insertion order and hands each mapped
//! backend attribute to an injected [`FragmentBuilder`], threading the
//! accumulated fragment through. Two reference builders are provided:
//! [`WhereClauseBuilder`] for SQL-like backends and [`FilterBuilder`] for
//! directory-like backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::{AttributeValue, Seed};
use crate::mapping::{CaseCanonicalization, QueryAttributeMapping};

/// The wildcard token accepted in query values.
pub const WILDCARD: char = '*';

// ---------------------------------------------------------------------------
// Fragment building capability
// ---------------------------------------------------------------------------

/// Result of offering one backend attribute to a [`FragmentBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Append<F> {
    /// The attribute contributed to the query.
    Accepted {
        fragment: F,
        parameters: Vec<AttributeValue>,
    },
    /// The attribute was not used; the accumulated fragment is handed back.
    Skipped(Option<F>),
}

/// Builds backend query fragments one attribute at a time.
///
/// Implemented for any `Fn(Option<F>, &str, &[AttributeValue]) -> Append<F>`.
pub trait FragmentBuilder<F> {
    fn append_fragment(
        &self,
        accumulated: Option<F>,
        backend_attribute: &str,
        values: &[AttributeValue],
    ) -> Append<F>;
}

impl<F, T> FragmentBuilder<F> for T
where
    T: Fn(Option<F>, &str, &[AttributeValue]) -> Append<F>,
{
    fn append_fragment(
        &self,
        accumulated: Option<F>,
        backend_attribute: &str,
        values: &[AttributeValue],
    ) -> Append<F> {
        self(accumulated, backend_attribute, values)
    }
}

/// A finished backend query: the fragment plus its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery<F> {
    pub fragment: F,
    pub parameters: Vec<AttributeValue>,
}

// ---------------------------------------------------------------------------
// Query builder
// ---------------------------------------------------------------------------

/// Builds backend queries from seeds. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    mapping: QueryAttributeMapping,
    require_all: bool,
    use_all_query_attributes: bool,
    case: CaseCanonicalization,
}

impl QueryBuilder {
    pub fn new(mapping: QueryAttributeMapping) -> Self {
        Self {
            mapping,
            ..Default::default()
        }
    }

    /// Fail the whole build when any seed attribute or mapping key cannot be
    /// used.
    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    /// Query seed attributes without a mapping entry under their own name.
    pub fn use_all_query_attributes(mut self, use_all: bool) -> Self {
        self.use_all_query_attributes = use_all;
        self
    }

    /// Fold seed values of case-insensitive attributes before building.
    pub fn with_case(mut self, case: CaseCanonicalization) -> Self {
        self.case = case;
        self
    }

    pub fn mapping(&self) -> &QueryAttributeMapping {
        &self.mapping
    }

    pub fn requires_all(&self) -> bool {
        self.require_all
    }

    /// Build a query for `seed`.
    ///
    /// Returns `None` when nothing could be queried or when `require_all`
    /// is set and some attribute was unusable. Callers treat `None` exactly
    /// like "not found".
    pub fn build<F, B>(&self, seed: &Seed, builder: &B) -> Option<BuiltQuery<F>>
    where
        B: FragmentBuilder<F> + ?Sized,
    {
        if self.require_all {
            if let Some(missing) = self.mapping.logical_names().find(|name| !seed.contains_key(name)) {
                debug!(attribute = missing, "required query attribute missing from seed");
                return None;
            }
        }

        let mut accumulated: Option<F> = None;
        let mut parameters = Vec::new();

        for (attribute, values) in seed.iter() {
            let own_name = [attribute.to_string()];
            let backends: &[String] = match self.mapping.get(attribute) {
                Some(backends) => backends,
                None if self.use_all_query_attributes => &own_name,
                None if self.require_all => {
                    debug!(attribute, "seed attribute has no query mapping");
                    return None;
                }
                None => continue,
            };

            let values = self.case.canonicalize_values(attribute, values);
            let mut accepted = false;
            for backend in backends {
                match builder.append_fragment(accumulated.take(), backend, &values) {
                    Append::Accepted {
                        fragment,
                        parameters: params,
                    } => {
                        accumulated = Some(fragment);
                        parameters.extend(params);
                        accepted = true;
                    }
                    Append::Skipped(previous) => accumulated = previous,
                }
            }

            if self.require_all && !accepted {
                debug!(attribute, "required query attribute produced no fragment");
                return None;
            }
        }

        match accumulated {
            Some(fragment) => Some(BuiltQuery {
                fragment,
                parameters,
            }),
            None => {
                debug!(seed_attributes = seed.len(), "no query could be built from seed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reference fragment builders
// ---------------------------------------------------------------------------

/// How fragments for several attributes are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    And,
    Or,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

fn non_blank_text(values: &[AttributeValue]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .filter_map(AttributeValue::to_text)
        .filter(|text| !text.trim().is_empty())
}

/// Builds a parameterized SQL-style `WHERE` clause body.
///
/// Each non-blank value becomes `attr = ?`, or `attr LIKE ?` when it holds
/// the wildcard token; the parameter carries `%` in place of `*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhereClauseBuilder {
    pub query_type: QueryType,
}

impl WhereClauseBuilder {
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type }
    }
}

impl FragmentBuilder<String> for WhereClauseBuilder {
    fn append_fragment(
        &self,
        accumulated: Option<String>,
        backend_attribute: &str,
        values: &[AttributeValue],
    ) -> Append<String> {
        let mut clause = accumulated.clone().unwrap_or_default();
        let mut parameters = Vec::new();

        for text in non_blank_text(values) {
            if !clause.is_empty() {
                clause.push_str(&format!(" {} ", self.query_type));
            }
            let formatted = text.replace(WILDCARD, "%");
            let operator = if formatted == text { "=" } else { "LIKE" };
            clause.push_str(&format!("{backend_attribute} {operator} ?"));
            parameters.push(AttributeValue::String(formatted));
        }

        if parameters.is_empty() {
            Append::Skipped(accumulated)
        } else {
            Append::Accepted {
                fragment: clause,
                parameters,
            }
        }
    }
}

/// A directory search filter under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFilter {
    query_type: QueryType,
    terms: Vec<String>,
}

impl DirectoryFilter {
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Render as an RFC 4515 filter string.
    pub fn to_filter_string(&self) -> String {
        match self.terms.as_slice() {
            [single] => single.clone(),
            terms => {
                let op = match self.query_type {
                    QueryType::And => '&',
                    QueryType::Or => '|',
                };
                format!("({op}{})", terms.concat())
            }
        }
    }
}

impl fmt::Display for DirectoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter_string())
    }
}

/// Escape a filter assertion value per RFC 4515, leaving the wildcard
/// token intact.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\5c"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\0' => out.push_str("\\00"),
            other => out.push(other),
        }
    }
    out
}

/// Builds `(attr=value)` directory filters; values are embedded, so no
/// parameters are produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBuilder {
    pub query_type: QueryType,
}

impl FilterBuilder {
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type }
    }
}

impl FragmentBuilder<DirectoryFilter> for FilterBuilder {
    fn append_fragment(
        &self,
        accumulated: Option<DirectoryFilter>,
        backend_attribute: &str,
        values: &[AttributeValue],
    ) -> Append<DirectoryFilter> {
        let terms: Vec<String> = non_blank_text(values)
            .map(|text| format!("({backend_attribute}={})", escape_filter_value(&text)))
            .collect();
        if terms.is_empty() {
            return Append::Skipped(accumulated);
        }

        let mut filter = accumulated.unwrap_or(DirectoryFilter {
            query_type: self.query_type,
            terms: Vec::new(),
        });
        filter.terms.extend(terms);
        Append::Accepted {
            fragment: filter,
            parameters: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attribute_map;
    use crate::mapping::CaseMode;

    fn mapping() -> QueryAttributeMapping {
        QueryAttributeMapping::from_pairs(
            "query.mapping",
            [("username", vec!["netid"]), ("mail", vec!["email", "alt_email"])],
        )
        .unwrap()
    }

    #[test]
    fn test_where_clause_in_seed_order() {
        let seed = attribute_map([("mail", vec!["a@x"]), ("username", vec!["awp9"])]);
        let query = QueryBuilder::new(mapping())
            .build(&seed, &WhereClauseBuilder::new(QueryType::Or))
            .unwrap();
        assert_eq!(query.fragment, "email = ? OR alt_email = ? OR netid = ?");
        assert_eq!(
            query.parameters,
            vec![
                AttributeValue::from("a@x"),
                AttributeValue::from("a@x"),
                AttributeValue::from("awp9"),
            ]
        );
    }

    #[test]
    fn test_wildcard_becomes_like() {
        let seed = attribute_map([("username", vec!["aw*"])]);
        let query = QueryBuilder::new(mapping())
            .build(&seed, &WhereClauseBuilder::default())
            .unwrap();
        assert_eq!(query.fragment, "netid LIKE ?");
        assert_eq!(query.parameters, vec![AttributeValue::from("aw%")]);
    }

    #[test]
    fn test_unmapped_attributes_ignored() {
        let seed = attribute_map([("shirt", vec!["blue"])]);
        assert!(QueryBuilder::new(mapping())
            .build(&seed, &WhereClauseBuilder::default())
            .is_none());
    }

    #[test]
    fn test_use_all_query_attributes() {
        let seed = attribute_map([("shirt", vec!["blue"])]);
        let query = QueryBuilder::new(mapping())
            .use_all_query_attributes(true)
            .build(&seed, &WhereClauseBuilder::default())
            .unwrap();
        assert_eq!(query.fragment, "shirt = ?");
    }

    #[test]
    fn test_require_all_reports_no_result() {
        let builder = QueryBuilder::new(mapping()).require_all(true);

        // mapping key "mail" absent from the seed
        let seed = attribute_map([("username", vec!["awp9"])]);
        assert!(builder.build(&seed, &WhereClauseBuilder::default()).is_none());

        // seed attribute without a mapping
        let seed = attribute_map([
            ("username", vec!["awp9"]),
            ("mail", vec!["a@x"]),
            ("shirt", vec!["blue"]),
        ]);
        assert!(builder.build(&seed, &WhereClauseBuilder::default()).is_none());

        // blank value produces no fragment
        let seed = attribute_map([("username", vec!["awp9"]), ("mail", vec![" "])]);
        assert!(builder.build(&seed, &WhereClauseBuilder::default()).is_none());

        let seed = attribute_map([("username", vec!["awp9"]), ("mail", vec!["a@x"])]);
        assert!(builder.build(&seed, &WhereClauseBuilder::default()).is_some());
    }

    #[test]
    fn test_first_match_wins_closure() {
        let first_wins = |acc: Option<String>, attr: &str, values: &[AttributeValue]| match acc {
            Some(existing) => Append::Skipped(Some(existing)),
            None => Append::Accepted {
                fragment: attr.to_string(),
                parameters: values.to_vec(),
            },
        };
        let seed = attribute_map([("mail", vec!["a@x"]), ("username", vec!["awp9"])]);
        let query = QueryBuilder::new(mapping()).build(&seed, &first_wins).unwrap();
        assert_eq!(query.fragment, "email");
        assert_eq!(query.parameters, vec![AttributeValue::from("a@x")]);
    }

    #[test]
    fn test_case_insensitive_attribute_values() {
        let seed = attribute_map([("username", vec!["AWP9"])]);
        let query = QueryBuilder::new(mapping())
            .with_case(CaseCanonicalization::none().with_attribute("username", CaseMode::Lower))
            .build(&seed, &WhereClauseBuilder::default())
            .unwrap();
        assert_eq!(query.parameters, vec![AttributeValue::from("awp9")]);
    }

    #[test]
    fn test_directory_filter() {
        let seed = attribute_map([("username", vec!["awp9"]), ("mail", vec!["a(b)*"])]);
        let query = QueryBuilder::new(mapping())
            .build(&seed, &FilterBuilder::new(QueryType::And))
            .unwrap();
        assert_eq!(
            query.fragment.to_filter_string(),
            r"(&(netid=awp9)(email=a\28b\29*)(alt_email=a\28b\29*))"
        );
        assert!(query.parameters.is_empty());

        let seed = attribute_map([("username", vec!["awp9"])]);
        let query = QueryBuilder::new(mapping())
            .build(&seed, &FilterBuilder::default())
            .unwrap();
        assert_eq!(query.fragment.to_string(), "(netid=awp9)");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value(r"a\b"), r"a\5cb");
        assert_eq!(escape_filter_value("plain*"), "plain*");
    }
}
