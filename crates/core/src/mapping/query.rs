//! Query attribute mapping: logical seed attribute -> backend attributes.

use crate::container::CaseFoldingMap;
use crate::errors::ConfigError;

/// Translates logical seed attribute names into the backend attribute
/// names queried for them. Many-to-many; insertion ordered.
///
/// A seed attribute with no entry is not used to build a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryAttributeMapping {
    entries: CaseFoldingMap<Vec<String>>,
}

impl QueryAttributeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from `(logical, backend attributes)` pairs.
    ///
    /// `field` names the configuration location for error messages. Empty
    /// logical or backend names are rejected.
    pub fn from_pairs<K, I, S>(
        field: &str,
        pairs: impl IntoIterator<Item = (K, I)>,
    ) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mapping = Self::new();
        for (logical, backends) in pairs {
            let logical = logical.into();
            if logical.is_empty() {
                return Err(ConfigError::EmptyMappingKey {
                    field: field.to_string(),
                });
            }
            for backend in backends {
                let backend = backend.into();
                if backend.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{field}.{logical}"),
                        detail: "backend attribute name must not be empty".into(),
                    });
                }
                mapping.insert(&logical, backend);
            }
        }
        Ok(mapping)
    }

    /// Add one logical -> backend pair. Duplicate pairs are ignored.
    pub fn insert(&mut self, logical: &str, backend: impl Into<String>) {
        let backend = backend.into();
        let targets = self.entries.get_or_insert_with(logical, Vec::new);
        if !targets.contains(&backend) {
            targets.push(backend);
        }
    }

    /// Backend attributes mapped from `logical`, in configuration order.
    pub fn get(&self, logical: &str) -> Option<&[String]> {
        self.entries.get(logical).map(Vec::as_slice)
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.entries.contains_key(logical)
    }

    /// Logical attribute names that can be queried.
    pub fn logical_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
