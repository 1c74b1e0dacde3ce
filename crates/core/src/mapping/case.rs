//! Case canonicalization of attribute names and values.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;

/// How text is folded before it is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    /// Compare text exactly as given.
    #[default]
    None,
    /// Fold to lower case before comparing.
    Lower,
    /// Fold to upper case before comparing.
    Upper,
}

impl CaseMode {
    pub fn apply<'a>(self, text: &'a str) -> Cow<'a, str> {
        match self {
            Self::None => Cow::Borrowed(text),
            Self::Lower => Cow::Owned(text.to_lowercase()),
            Self::Upper => Cow::Owned(text.to_uppercase()),
        }
    }

    /// Fold a string value; other value kinds pass through unchanged.
    pub fn apply_value(self, value: &AttributeValue) -> AttributeValue {
        match value {
            AttributeValue::String(text) if self != Self::None => {
                AttributeValue::String(self.apply(text).into_owned())
            }
            other => other.clone(),
        }
    }
}

/// Per-attribute case canonicalization settings.
///
/// Attributes without an explicit entry use `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCanonicalization {
    #[serde(default)]
    pub default: CaseMode,

    #[serde(default)]
    pub attributes: BTreeMap<String, CaseMode>,
}

impl CaseCanonicalization {
    /// Canonicalization that never folds anything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the mode used for one attribute.
    pub fn with_attribute(mut self, attribute: impl Into<String>, mode: CaseMode) -> Self {
        self.attributes.insert(attribute.into(), mode);
        self
    }

    pub fn mode_for(&self, attribute: &str) -> CaseMode {
        self.attributes
            .get(attribute)
            .copied()
            .unwrap_or(self.default)
    }

    /// `true` when comparisons against `attribute` fold case.
    pub fn is_case_insensitive(&self, attribute: &str) -> bool {
        self.mode_for(attribute) != CaseMode::None
    }

    /// Fold `text` using the mode configured for `attribute`.
    pub fn canonicalize<'a>(&self, attribute: &str, text: &'a str) -> Cow<'a, str> {
        self.mode_for(attribute).apply(text)
    }

    /// Fold every string value using the mode configured for `attribute`.
    pub fn canonicalize_values(&self, attribute: &str, values: &[AttributeValue]) -> Vec<AttributeValue> {
        let mode = self.mode_for(attribute);
        values.iter().map(|v| mode.apply_value(v)).collect()
    }
}
