//! Result attribute mapping: backend attribute/column -> logical names.

use crate::container::{CaseFoldingMap, KeyComparison};
use crate::errors::ConfigError;

/// What a configured backend attribute turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultTarget {
    /// Keep the backend name unchanged (explicit "no rename").
    Passthrough,
    /// Fan out to each of these logical names. An empty list drops the
    /// attribute.
    Rename(Vec<String>),
}

/// Translates backend attribute names into logical output names.
///
/// Backend names without an entry pass through unchanged, as do entries
/// configured as [`ResultTarget::Passthrough`]. The empty backend name is
/// rejected when the mapping is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultAttributeMapping {
    entries: CaseFoldingMap<ResultTarget>,
}

impl Default for ResultAttributeMapping {
    fn default() -> Self {
        Self::new(KeyComparison::CaseSensitive)
    }
}

impl ResultAttributeMapping {
    /// Empty mapping; every backend name passes through.
    pub fn new(comparison: KeyComparison) -> Self {
        Self {
            entries: CaseFoldingMap::new(comparison),
        }
    }

    /// Build a mapping from `(backend, targets)` pairs where `None` targets
    /// mean pass-through.
    pub fn from_pairs<K, S>(
        field: &str,
        comparison: KeyComparison,
        pairs: impl IntoIterator<Item = (K, Option<Vec<S>>)>,
    ) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        S: Into<String>,
    {
        let mut mapping = Self::new(comparison);
        for (backend, targets) in pairs {
            let backend = backend.into();
            match targets {
                None => mapping.insert_passthrough(field, backend)?,
                Some(targets) => {
                    mapping.insert(field, backend, targets.into_iter().map(Into::into))?
                }
            }
        }
        Ok(mapping)
    }

    /// Map `backend` to the given logical names, merging with any names
    /// already configured for it.
    pub fn insert(
        &mut self,
        field: &str,
        backend: impl Into<String>,
        targets: impl IntoIterator<Item = String>,
    ) -> Result<(), ConfigError> {
        let backend = backend.into();
        validate_key(field, &backend)?;

        let mut names = Vec::new();
        for target in targets {
            if target.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{field}.{backend}"),
                    detail: "logical attribute name must not be empty".into(),
                });
            }
            if !names.contains(&target) {
                names.push(target);
            }
        }

        match self.entries.get_mut(&backend) {
            Some(ResultTarget::Rename(existing)) => {
                for name in names {
                    if !existing.contains(&name) {
                        existing.push(name);
                    }
                }
            }
            Some(slot @ ResultTarget::Passthrough) => *slot = ResultTarget::Rename(names),
            None => {
                self.entries.put(backend, ResultTarget::Rename(names));
            }
        }
        Ok(())
    }

    /// Mark `backend` as explicitly passed through unchanged.
    pub fn insert_passthrough(
        &mut self,
        field: &str,
        backend: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let backend = backend.into();
        validate_key(field, &backend)?;
        self.entries.put(backend, ResultTarget::Passthrough);
        Ok(())
    }

    pub fn comparison(&self) -> KeyComparison {
        self.entries.comparison()
    }

    pub fn get(&self, backend: &str) -> Option<&ResultTarget> {
        self.entries.get(backend)
    }

    /// Logical output names for a backend attribute, in configuration order.
    pub fn targets<'a>(&'a self, backend: &'a str) -> Vec<&'a str> {
        match self.entries.get(backend) {
            Some(ResultTarget::Rename(names)) => names.iter().map(String::as_str).collect(),
            Some(ResultTarget::Passthrough) | None => vec![backend],
        }
    }

    /// Every logical name this mapping can produce for configured entries.
    pub fn logical_names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (backend, target) in self.entries.iter() {
            let names: Vec<&str> = match target {
                ResultTarget::Passthrough => vec![backend],
                ResultTarget::Rename(names) => names.iter().map(String::as_str).collect(),
            };
            for name in names {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_key(field: &str, backend: &str) -> Result<(), ConfigError> {
    if backend.is_empty() {
        return Err(ConfigError::EmptyMappingKey {
            field: field.to_string(),
        });
    }
    Ok(())
}
