//! Rule-driven source: declared rules turn seed values into attributes.

use regex_lite::Regex;

use super::AttributeSource;
use crate::attributes::{AttributeMap, AttributeValue, Seed};
use crate::container::KeyComparison;
use crate::errors::{ConfigError, CoreError};
use crate::identity::IdentityResolver;
use crate::person::AttributeSet;

/// A rule that may contribute attributes for a seed.
pub trait AttributeRule: Send + Sync {
    fn applies_to(&self, seed: &Seed) -> bool;

    /// Attributes produced for a seed this rule applies to.
    fn evaluate(&self, seed: &Seed) -> AttributeMap;

    fn possible_attribute_names(&self) -> Vec<String>;
}

/// When any value of `when_attribute` fully matches `pattern`, set
/// `set_attribute` to `set_value`.
#[derive(Debug, Clone)]
pub struct SimpleAttributeRule {
    when_attribute: String,
    pattern: Regex,
    set_attribute: String,
    set_value: AttributeValue,
}

impl SimpleAttributeRule {
    pub fn new(
        when_attribute: impl Into<String>,
        pattern: &str,
        set_attribute: impl Into<String>,
        set_value: impl Into<AttributeValue>,
    ) -> Result<Self, ConfigError> {
        let when_attribute = when_attribute.into();
        let set_attribute = set_attribute.into();
        for (field, value) in [("rule.when", &when_attribute), ("rule.set", &set_attribute)] {
            if value.is_empty() {
                return Err(ConfigError::EmptyMappingKey {
                    field: field.to_string(),
                });
            }
        }
        let pattern = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?;
        Ok(Self {
            when_attribute,
            pattern,
            set_attribute,
            set_value: set_value.into(),
        })
    }
}

impl AttributeRule for SimpleAttributeRule {
    fn applies_to(&self, seed: &Seed) -> bool {
        seed.get(&self.when_attribute)
            .into_iter()
            .flatten()
            .filter_map(AttributeValue::to_text)
            .any(|text| self.pattern.is_match(&text))
    }

    fn evaluate(&self, _seed: &Seed) -> AttributeMap {
        let mut out = AttributeMap::new(KeyComparison::CaseSensitive);
        out.put(self.set_attribute.clone(), vec![self.set_value.clone()]);
        out
    }

    fn possible_attribute_names(&self) -> Vec<String> {
        vec![self.set_attribute.clone()]
    }
}

/// Evaluates declared rules in order; the first rule that applies wins.
pub struct DeclaredRuleSource {
    attribute_name: String,
    rules: Vec<Box<dyn AttributeRule>>,
    identity: IdentityResolver,
}

impl DeclaredRuleSource {
    /// `attribute_name` is the seed attribute a uid is queried under.
    /// An empty rule list is rejected.
    pub fn new(attribute_name: impl Into<String>, rules: Vec<Box<dyn AttributeRule>>) -> Result<Self, ConfigError> {
        let attribute_name = attribute_name.into();
        if attribute_name.is_empty() {
            return Err(ConfigError::EmptyMappingKey {
                field: "rules.attribute_name".into(),
            });
        }
        if rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rules".into(),
                detail: "at least one rule is required".into(),
            });
        }
        Ok(Self {
            identity: IdentityResolver::new(attribute_name.clone()),
            attribute_name,
            rules,
        })
    }
}

impl AttributeSource for DeclaredRuleSource {
    fn name(&self) -> &str {
        "declared_rules"
    }

    fn identity_attribute(&self) -> &str {
        &self.attribute_name
    }

    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        Ok(self
            .rules
            .iter()
            .find(|rule| rule.applies_to(seed))
            .map(|rule| vec![self.identity.resolve(rule.evaluate(seed), hint, None)]))
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for name in self.rules.iter().flat_map(|rule| rule.possible_attribute_names()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Some(names)
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        Some(vec![self.attribute_name.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "eduPersonPrimaryAffiliation";
    const VALUE: &str = "(480) 555-1212";

    fn source() -> DeclaredRuleSource {
        let rule = SimpleAttributeRule::new(NAME, "records-staff", "fax", VALUE).unwrap();
        DeclaredRuleSource::new(NAME, vec![Box::new(rule) as Box<dyn AttributeRule>]).unwrap()
    }

    #[test]
    fn test_matches() {
        let person = source().person("records-staff").unwrap().unwrap();
        assert_eq!(person.attribute("fax"), Some(&[AttributeValue::from(VALUE)][..]));
        assert_eq!(person.name().as_deref(), Some("records-staff"));
    }

    #[test]
    fn test_does_not_match() {
        assert!(source().person("faculty").unwrap().is_none());
    }

    #[test]
    fn test_possible_names() {
        assert_eq!(source().possible_attribute_names(), Some(vec!["fax".to_string()]));
        assert_eq!(source().available_query_attributes(), Some(vec![NAME.to_string()]));
    }

    #[test]
    fn test_constructor_rejects_bad_input() {
        assert!(matches!(
            DeclaredRuleSource::new(NAME, Vec::new()),
            Err(ConfigError::InvalidValue { .. })
        ));
        let rule = SimpleAttributeRule::new(NAME, "x", "fax", VALUE).unwrap();
        assert!(DeclaredRuleSource::new("", vec![Box::new(rule) as Box<dyn AttributeRule>]).is_err());
        assert!(matches!(
            SimpleAttributeRule::new(NAME, "(unclosed", "fax", VALUE),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let rule = SimpleAttributeRule::new(NAME, "staff", "fax", VALUE).unwrap();
        let seed = crate::attributes::seed_for(NAME, "records-staff");
        assert!(!rule.applies_to(&seed));
    }
}
