//! TOML-based resolver configuration.
//!
//! A [`ResolverConfig`] describes the read-only runtime objects of a
//! resolver: query and result mappings, case canonicalization, the row
//! layout of SQL-like backends, the identity attribute, the cache key policy
//! and an optional static backing collection. Mappings are validated eagerly
//! so a bad key is reported at load time, never silently ignored later.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::{AttributeMap, AttributeValue};
use crate::cache_key::{CacheKeyConfig, CacheKeyGenerator};
use crate::container::{CaseFoldingMap, KeyComparison};
use crate::errors::ConfigError;
use crate::identity::IdentityResolver;
use crate::mapping::{CaseCanonicalization, QueryAttributeMapping, ResultAttributeMapping};
use crate::pivot::{NameValueColumns, RowPivot};
use crate::query::{QueryBuilder, QueryType};
use crate::source::complex_stub::{BackingCollection, ComplexStubSource};
use crate::source::RowLayout;

/// Annotated starting configuration written by `persondir init`.
pub const EXAMPLE_CONFIG: &str = r#"# persondir resolver configuration

[identity]
# Attribute carrying the canonical identity. Omit to default to "username"
# without binding it explicitly.
attribute = "username"
comparison = "case_insensitive"

[case]
default = "none"

[case.attributes]
username = "lower"

[query]
require_all = false
use_all_query_attributes = false
query_type = "and"

[query.mapping]
username = "uid"
mail = ["mail", "alt_mail"]

[result]
passthrough = ["shirtColor"]

[result.mapping]
uid = "username"
mail = ["email", "emailAddress"]
givenName = "firstName"

[rows]
layout = "multi_row"
entity_column = "uid"
ignore_null = false

[[rows.name_value]]
name_column = "attr_name"
value_columns = ["attr_value"]

[cache_key]
default_attribute_name = "username"
ignore_empty_attributes = true

[stub.people.awp9]
username = "awp9"
givenName = "Andrew"
mail = ["awp9@example.edu", "andrew@example.edu"]
shirtColor = "blue"

[stub.people.aam26]
username = "aam26"
givenName = "Alice"
mail = "aam26@example.edu"
"#;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level resolver configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Identity attribute and attribute-name comparison.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Case canonicalization of attribute names and query values.
    #[serde(default)]
    pub case: CaseCanonicalization,

    /// Seed -> backend query translation.
    #[serde(default)]
    pub query: QueryConfig,

    /// Backend -> logical attribute translation.
    #[serde(default)]
    pub result: ResultConfig,

    /// Shape of SQL-like result rows.
    #[serde(default)]
    pub rows: RowsConfig,

    /// Cache key policy.
    #[serde(default)]
    pub cache_key: CacheKeyConfig,

    /// Static backing collection.
    #[serde(default)]
    pub stub: StubConfig,
}

/// A single name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name.clone()],
            Self::Many(names) => names.clone(),
        }
    }
}

/// A single attribute value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueList {
    Many(Vec<AttributeValue>),
    One(AttributeValue),
}

impl ValueList {
    pub fn to_vec(&self) -> Vec<AttributeValue> {
        match self {
            Self::Many(values) => values.clone(),
            Self::One(value) => vec![value.clone()],
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Explicit identity attribute.
    #[serde(default)]
    pub attribute: Option<String>,

    /// Key comparison of resolved attribute sets.
    #[serde(default)]
    pub comparison: KeyComparison,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Logical seed attribute -> backend attribute(s).
    #[serde(default)]
    pub mapping: CaseFoldingMap<OneOrMany>,

    /// Report "no result" unless every attribute can be used.
    #[serde(default)]
    pub require_all: bool,

    /// Query unmapped seed attributes under their own name.
    #[serde(default)]
    pub use_all_query_attributes: bool,

    /// How per-attribute fragments are combined.
    #[serde(default)]
    pub query_type: QueryType,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultConfig {
    /// Backend attribute -> logical name(s). An empty list drops the
    /// attribute.
    #[serde(default)]
    pub mapping: CaseFoldingMap<OneOrMany>,

    /// Backend attributes kept under their own name.
    #[serde(default)]
    pub passthrough: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// One row per person.
    #[default]
    SingleRow,
    /// Attribute name/value pairs spread over several rows.
    MultiRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    pub name_column: String,
    pub value_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowsConfig {
    #[serde(default)]
    pub layout: LayoutKind,

    /// Name/value column pairs for the multi-row layout.
    #[serde(default)]
    pub name_value: Vec<NameValuePair>,

    /// Groups multi-row results into one person per value.
    #[serde(default)]
    pub entity_column: Option<String>,

    /// Leave null columns out of rows before pivoting.
    #[serde(default)]
    pub ignore_null: bool,
}

// ---------------------------------------------------------------------------
// Stub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubConfig {
    /// Seed attribute whose value selects backing entries. Defaults to the
    /// identity attribute.
    #[serde(default)]
    pub query_attribute: Option<String>,

    /// Key -> attribute name -> value(s).
    #[serde(default)]
    pub people: CaseFoldingMap<CaseFoldingMap<ValueList>>,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

fn require_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            detail: "name must not be empty".into(),
        });
    }
    Ok(())
}

impl ResolverConfig {
    /// Load a [`ResolverConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse a configuration document without validating it.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate every section. Mappings are built once so their own checks
    /// run here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(attribute) = &self.identity.attribute {
            require_name("identity.attribute", attribute)?;
        }

        self.query_mapping()?;
        self.result_mapping()?;
        self.row_layout()?;

        require_name("cache_key.default_attribute_name", &self.cache_key.default_attribute_name)?;
        for attribute in self.cache_key.cache_key_attributes.iter().flatten() {
            require_name("cache_key.cache_key_attributes", attribute)?;
        }

        if let Some(attribute) = &self.stub.query_attribute {
            require_name("stub.query_attribute", attribute)?;
        }
        for (key, attributes) in self.stub.people.iter() {
            if key.is_empty() {
                return Err(ConfigError::EmptyMappingKey {
                    field: "stub.people".into(),
                });
            }
            if attributes.keys().any(str::is_empty) {
                return Err(ConfigError::EmptyMappingKey {
                    field: format!("stub.people.{key}"),
                });
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    // -----------------------------------------------------------------------
    // Runtime objects
    // -----------------------------------------------------------------------

    pub fn query_mapping(&self) -> Result<QueryAttributeMapping, ConfigError> {
        QueryAttributeMapping::from_pairs(
            "query.mapping",
            self.query.mapping.iter().map(|(logical, backend)| (logical, backend.to_vec())),
        )
    }

    pub fn result_mapping(&self) -> Result<ResultAttributeMapping, ConfigError> {
        let mut mapping = ResultAttributeMapping::from_pairs(
            "result.mapping",
            self.identity.comparison,
            self.result
                .mapping
                .iter()
                .map(|(backend, targets)| (backend, Some(targets.to_vec()))),
        )?;
        for backend in &self.result.passthrough {
            if mapping.get(backend).is_some() {
                return Err(ConfigError::InvalidValue {
                    field: format!("result.passthrough.{backend}"),
                    detail: "attribute is also renamed in result.mapping".into(),
                });
            }
            mapping.insert_passthrough("result.passthrough", backend.clone())?;
        }
        Ok(mapping)
    }

    pub fn case_canonicalization(&self) -> CaseCanonicalization {
        self.case.clone()
    }

    pub fn query_builder(&self) -> Result<QueryBuilder, ConfigError> {
        Ok(QueryBuilder::new(self.query_mapping()?)
            .require_all(self.query.require_all)
            .use_all_query_attributes(self.query.use_all_query_attributes)
            .with_case(self.case_canonicalization()))
    }

    pub fn row_pivot(&self) -> Result<RowPivot, ConfigError> {
        Ok(RowPivot::new(self.result_mapping()?)
            .with_case(self.case_canonicalization())
            .with_comparison(self.identity.comparison))
    }

    pub fn row_layout(&self) -> Result<RowLayout, ConfigError> {
        match self.rows.layout {
            LayoutKind::SingleRow => Ok(RowLayout::SingleRow),
            LayoutKind::MultiRow => {
                let mut pairs = self.rows.name_value.iter();
                let first = pairs.next().ok_or_else(|| ConfigError::InvalidValue {
                    field: "rows.name_value".into(),
                    detail: "multi_row layout needs at least one name/value column pair".into(),
                })?;
                let mut columns = pair_columns(first)?;
                for pair in pairs {
                    let extra = pair_columns(pair)?;
                    for (name, values) in extra.pairs() {
                        columns = columns.with_pair(name, values.iter().cloned());
                    }
                }
                if let Some(entity) = &self.rows.entity_column {
                    require_name("rows.entity_column", entity)?;
                }
                Ok(RowLayout::MultiRow {
                    columns,
                    entity_column: self.rows.entity_column.clone(),
                })
            }
        }
    }

    pub fn identity_resolver(&self) -> IdentityResolver {
        IdentityResolver::from_config(self.identity.attribute.as_deref())
    }

    pub fn cache_key_generator(&self) -> CacheKeyGenerator {
        CacheKeyGenerator::new(self.cache_key.clone())
    }

    /// Build the static source from `[stub]`.
    pub fn stub_source(&self) -> ComplexStubSource {
        let comparison = self.identity.comparison;
        let mut backing = BackingCollection::new(comparison);
        for (key, attributes) in self.stub.people.iter() {
            let mut map = AttributeMap::new(comparison);
            for (name, values) in attributes.iter() {
                map.put(name, values.to_vec());
            }
            backing.put(key, Some(map));
        }

        let source = ComplexStubSource::new(backing).with_identity(self.identity_resolver());
        match &self.stub.query_attribute {
            Some(attribute) => source.with_query_attribute(attribute.clone()),
            None => source,
        }
    }
}

fn pair_columns(pair: &NameValuePair) -> Result<NameValueColumns, ConfigError> {
    require_name("rows.name_value.name_column", &pair.name_column)?;
    let mut values = pair.value_columns.iter();
    let first = values.next().ok_or_else(|| ConfigError::InvalidValue {
        field: format!("rows.name_value.{}", pair.name_column),
        detail: "at least one value column is required".into(),
    })?;
    require_name("rows.name_value.value_columns", first)?;
    let rest: Vec<String> = values.cloned().collect();
    for value in &rest {
        require_name("rows.name_value.value_columns", value)?;
    }

    let columns = NameValueColumns::new(pair.name_column.clone(), first.clone());
    Ok(if rest.is_empty() {
        columns
    } else {
        columns.with_pair(pair.name_column.clone(), rest)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CaseMode;
    use crate::source::AttributeSource;
    use std::io::Write;

    fn example() -> ResolverConfig {
        ResolverConfig::from_toml(EXAMPLE_CONFIG).expect("failed to parse example config")
    }

    #[test]
    fn test_parse_example_config() {
        let config = example();
        config.validate().unwrap();
        assert_eq!(config.identity.attribute.as_deref(), Some("username"));
        assert_eq!(config.identity.comparison, KeyComparison::CaseInsensitive);
        assert_eq!(config.case.mode_for("username"), CaseMode::Lower);
        assert_eq!(config.rows.layout, LayoutKind::MultiRow);
        assert!(config.cache_key.ignore_empty_attributes);
        assert_eq!(config.stub.people.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persondir.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(EXAMPLE_CONFIG.as_bytes()).unwrap();

        let config = ResolverConfig::load_and_validate(&path).expect("load_and_validate failed");
        assert_eq!(config.query.query_type, QueryType::And);
    }

    #[test]
    fn test_file_not_found() {
        let result = ResolverConfig::load_from_file("/nonexistent/persondir.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = ResolverConfig::from_toml("[query\nmapping = 3");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::from_toml("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.identity.attribute, None);
        assert_eq!(config.identity_resolver().attribute(), "username");
        assert_eq!(config.cache_key.default_attribute_name, "username");
        assert_eq!(config.rows.layout, LayoutKind::SingleRow);
        assert!(!config.query.require_all);
        assert!(config.result_mapping().unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_result_key() {
        let config = ResolverConfig::from_toml(
            r#"
[result.mapping]
"" = "dressShirtColor"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyMappingKey { ref field }) if field == "result.mapping"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_passthrough() {
        let config = ResolverConfig::from_toml("[result]\npassthrough = [\"\"]\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyMappingKey { .. })));
    }

    #[test]
    fn test_validate_rejects_conflicting_passthrough() {
        let config = ResolverConfig::from_toml(
            r#"
[result]
passthrough = ["mail"]
[result.mapping]
mail = "email"
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_multi_row_without_columns() {
        let config = ResolverConfig::from_toml("[rows]\nlayout = \"multi_row\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "rows.name_value"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_cache_attribute() {
        let config = ResolverConfig::from_toml("[cache_key]\ndefault_attribute_name = \"\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "cache_key.default_attribute_name"
        ));
    }

    #[test]
    fn test_runtime_objects() {
        let config = example();

        let query = config.query_mapping().unwrap();
        assert_eq!(query.get("mail").map(<[_]>::len), Some(2));

        let result = config.result_mapping().unwrap();
        assert_eq!(result.targets("MAIL"), vec!["email", "emailAddress"]);
        assert_eq!(result.targets("shirtColor"), vec!["shirtColor"]);

        match config.row_layout().unwrap() {
            RowLayout::MultiRow { entity_column, .. } => assert_eq!(entity_column.as_deref(), Some("uid")),
            RowLayout::SingleRow => panic!("expected multi-row layout"),
        }

        assert!(config.identity_resolver().is_explicit());
        assert!(config.cache_key_generator().config().ignore_empty_attributes);
    }

    #[test]
    fn test_stub_source_from_config() {
        let source = example().stub_source();
        let person = source.person("awp9").unwrap().unwrap();
        assert_eq!(person.name().as_deref(), Some("awp9"));
        assert_eq!(person.attribute("MAIL").map(<[_]>::len), Some(2));
        assert_eq!(person.attribute_value("givenName"), Some(&AttributeValue::from("Andrew")));
    }
}
