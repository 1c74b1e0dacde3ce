//! Reproducible cache keys for resolution calls.
//!
//! A cache layer asks [`CacheKeyGenerator::generate_key`] for a key before
//! delegating a call to the real source. `Ok(None)` means the call must not
//! be cached; an unknown operation tag is a configuration error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::attributes::{AttributeValue, Seed};
use crate::container::KeyComparison;
use crate::errors::ConfigError;
use crate::identity::DEFAULT_IDENTITY_ATTRIBUTE;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Sentinel seed key for [`CachableOperation::GetPossibleUserAttributeNames`].
///
/// The leading NUL keeps it apart from every real attribute name.
pub const POSSIBLE_USER_ATTRIBUTE_NAMES_KEY: &str = "\u{0}persondir.possible_user_attribute_names";

/// Sentinel seed key for [`CachableOperation::GetAvailableQueryAttributes`].
pub const AVAILABLE_QUERY_ATTRIBUTES_KEY: &str = "\u{0}persondir.available_query_attributes";

/// How an operation's arguments become a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    /// The single argument is the seed map.
    SeedMap,
    /// The identity string becomes `{default: uid}`.
    IdentityScalar,
    /// The identity string becomes `{default: [uid]}`.
    IdentityList,
    /// No arguments; a per-operation sentinel seed is used.
    NoArguments,
}

impl CallConvention {
    fn describe(self) -> &'static str {
        match self {
            Self::SeedMap => "seed map",
            Self::IdentityScalar | Self::IdentityList => "identity string",
            Self::NoArguments => "no",
        }
    }
}

/// The closed set of resolution calls that can be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachableOperation {
    GetMultivaluedUserAttributesBySeed,
    GetMultivaluedUserAttributesByUid,
    GetUserAttributesBySeed,
    GetUserAttributesByUid,
    GetPerson,
    GetPeople,
    GetPeopleWithMultivaluedAttributes,
    GetPossibleUserAttributeNames,
    GetAvailableQueryAttributes,
}

impl CachableOperation {
    pub const ALL: [CachableOperation; 9] = [
        Self::GetMultivaluedUserAttributesBySeed,
        Self::GetMultivaluedUserAttributesByUid,
        Self::GetUserAttributesBySeed,
        Self::GetUserAttributesByUid,
        Self::GetPerson,
        Self::GetPeople,
        Self::GetPeopleWithMultivaluedAttributes,
        Self::GetPossibleUserAttributeNames,
        Self::GetAvailableQueryAttributes,
    ];

    /// Stable identity string of this operation.
    pub fn tag(self) -> &'static str {
        match self {
            Self::GetMultivaluedUserAttributesBySeed => "get_multivalued_user_attributes(seed)",
            Self::GetMultivaluedUserAttributesByUid => "get_multivalued_user_attributes(uid)",
            Self::GetUserAttributesBySeed => "get_user_attributes(seed)",
            Self::GetUserAttributesByUid => "get_user_attributes(uid)",
            Self::GetPerson => "get_person(uid)",
            Self::GetPeople => "get_people(seed)",
            Self::GetPeopleWithMultivaluedAttributes => "get_people_with_multivalued_attributes(seed)",
            Self::GetPossibleUserAttributeNames => "get_possible_user_attribute_names()",
            Self::GetAvailableQueryAttributes => "get_available_query_attributes()",
        }
    }

    pub fn convention(self) -> CallConvention {
        match self {
            Self::GetMultivaluedUserAttributesBySeed
            | Self::GetUserAttributesBySeed
            | Self::GetPeople
            | Self::GetPeopleWithMultivaluedAttributes => CallConvention::SeedMap,
            Self::GetMultivaluedUserAttributesByUid | Self::GetPerson => CallConvention::IdentityList,
            Self::GetUserAttributesByUid => CallConvention::IdentityScalar,
            Self::GetPossibleUserAttributeNames | Self::GetAvailableQueryAttributes => {
                CallConvention::NoArguments
            }
        }
    }

    /// Resolve an exact tag.
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|op| op.tag() == tag)
            .ok_or_else(|| ConfigError::UnsupportedOperation(tag.to_string()))
    }

    fn sentinel(self) -> Option<&'static str> {
        match self {
            Self::GetPossibleUserAttributeNames => Some(POSSIBLE_USER_ATTRIBUTE_NAMES_KEY),
            Self::GetAvailableQueryAttributes => Some(AVAILABLE_QUERY_ATTRIBUTES_KEY),
            _ => None,
        }
    }
}

impl fmt::Display for CachableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Arguments of an intercepted resolution call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    Seed(Seed),
    Identity(String),
    None,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Opaque cache key. Equal only when both components match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub checksum: u64,
    pub hash_code: i32,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            hex::encode(self.checksum.to_be_bytes()),
            hex::encode(self.hash_code.to_be_bytes())
        )
    }
}

/// Value of one key-contributing attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
enum KeyValue {
    Single(AttributeValue),
    List(Vec<AttributeValue>),
    Sentinel(&'static str),
}

impl KeyValue {
    /// A list is empty when every element is null or blank.
    fn is_empty(&self) -> bool {
        match self {
            Self::Single(value) => value.is_empty(),
            Self::List(values) => values.iter().all(AttributeValue::is_empty),
            Self::Sentinel(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

fn default_attribute_name() -> String {
    DEFAULT_IDENTITY_ATTRIBUTE.to_string()
}

/// Which seed attributes contribute to a key.
///
/// Precedence: `use_all_attributes`, then an explicit
/// `cache_key_attributes` list, then `default_attribute_name` alone. An
/// explicit empty list selects nothing, so no call gets a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyConfig {
    #[serde(default = "default_attribute_name")]
    pub default_attribute_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key_attributes: Option<Vec<String>>,

    #[serde(default)]
    pub use_all_attributes: bool,

    #[serde(default)]
    pub ignore_empty_attributes: bool,
}

impl Default for CacheKeyConfig {
    fn default() -> Self {
        Self {
            default_attribute_name: default_attribute_name(),
            cache_key_attributes: None,
            use_all_attributes: false,
            ignore_empty_attributes: false,
        }
    }
}

/// Computes [`CacheKey`]s for resolution calls.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    config: CacheKeyConfig,
}

impl CacheKeyGenerator {
    pub fn new(config: CacheKeyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheKeyConfig {
        &self.config
    }

    /// Generate a key for the operation identified by `tag`.
    pub fn generate_key(
        &self,
        tag: &str,
        arguments: &CallArguments,
    ) -> Result<Option<CacheKey>, ConfigError> {
        let operation = CachableOperation::from_tag(tag)?;
        self.generate(operation, arguments)
    }

    /// Generate a key for a resolved operation.
    pub fn generate(
        &self,
        operation: CachableOperation,
        arguments: &CallArguments,
    ) -> Result<Option<CacheKey>, ConfigError> {
        let seed = self.derive_seed(operation, arguments)?;
        let comparison = match arguments {
            CallArguments::Seed(seed) => seed.comparison(),
            _ => KeyComparison::CaseSensitive,
        };
        let mut contributing = self.select(seed, comparison);

        if self.config.ignore_empty_attributes {
            contributing.retain(|_, value| !value.is_empty());
        }

        if contributing.is_empty() {
            debug!(operation = %operation, "no key attributes, call will not be cached");
            return Ok(None);
        }

        let key = hash(&contributing)?;
        debug!(
            operation = %operation,
            attributes = contributing.len(),
            key = %key,
            "generated cache key"
        );
        Ok(Some(key))
    }

    fn derive_seed(
        &self,
        operation: CachableOperation,
        arguments: &CallArguments,
    ) -> Result<Vec<(String, KeyValue)>, ConfigError> {
        let convention = operation.convention();
        let mismatch = || ConfigError::ArgumentMismatch {
            operation: operation.tag().to_string(),
            expected: convention.describe(),
        };

        let default = self.config.default_attribute_name.clone();
        match (convention, arguments) {
            (CallConvention::SeedMap, CallArguments::Seed(seed)) => Ok(seed
                .iter()
                .map(|(name, values)| (name.to_string(), KeyValue::List(values.clone())))
                .collect()),
            (CallConvention::IdentityScalar, CallArguments::Identity(uid)) => {
                Ok(vec![(default, KeyValue::Single(uid.as_str().into()))])
            }
            (CallConvention::IdentityList, CallArguments::Identity(uid)) => {
                Ok(vec![(default, KeyValue::List(vec![uid.as_str().into()]))])
            }
            (CallConvention::NoArguments, CallArguments::None) => {
                let sentinel = operation.sentinel().ok_or_else(mismatch)?;
                Ok(vec![(sentinel.to_string(), KeyValue::Sentinel(sentinel))])
            }
            _ => Err(mismatch()),
        }
    }

    fn select(
        &self,
        seed: Vec<(String, KeyValue)>,
        comparison: KeyComparison,
    ) -> BTreeMap<String, KeyValue> {
        if self.config.use_all_attributes {
            return seed.into_iter().collect();
        }
        let wanted: Vec<&str> = match &self.config.cache_key_attributes {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => vec![self.config.default_attribute_name.as_str()],
        };
        // Matched names take the configured spelling.
        seed.into_iter()
            .filter_map(|(name, value)| {
                wanted
                    .iter()
                    .find(|w| comparison.keys_equal(w, &name))
                    .map(|w| (w.to_string(), value))
            })
            .collect()
    }
}

fn hash(contributing: &BTreeMap<String, KeyValue>) -> Result<CacheKey, ConfigError> {
    // serde_json renders a BTreeMap in key order, which makes the bytes
    // canonical for equal inputs.
    let bytes =
        serde_json::to_vec(contributing).map_err(|e| ConfigError::KeyEncoding(e.to_string()))?;
    let digest = Sha256::digest(&bytes);

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&digest[0..8]);
    let mut hash_code = [0u8; 4];
    hash_code.copy_from_slice(&digest[8..12]);

    Ok(CacheKey {
        checksum: u64::from_be_bytes(checksum),
        hash_code: i32::from_be_bytes(hash_code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attribute_map;

    fn seed(pairs: &[(&str, &str)]) -> CallArguments {
        CallArguments::Seed(attribute_map(pairs.iter().map(|(k, v)| (*k, vec![*v]))))
    }

    #[test]
    fn test_tags_round_trip_and_are_unique() {
        for op in CachableOperation::ALL {
            assert_eq!(CachableOperation::from_tag(op.tag()).unwrap(), op);
        }
        let mut tags: Vec<_> = CachableOperation::ALL.iter().map(|op| op.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), CachableOperation::ALL.len());
    }

    #[test]
    fn test_same_seed_same_key() {
        let generator = CacheKeyGenerator::default();
        let tag = CachableOperation::GetMultivaluedUserAttributesBySeed.tag();
        let first = generator.generate_key(tag, &seed(&[("username", "bob")])).unwrap();
        let second = generator.generate_key(tag, &seed(&[("username", "bob")])).unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);

        let other = generator.generate_key(tag, &seed(&[("username", "Bob")])).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_value_case_matters_in_case_insensitive_seed() {
        let generator = CacheKeyGenerator::default();
        let lower = attribute_map([("username", ["bob"])]).with_comparison(KeyComparison::CaseInsensitive);
        let upper = attribute_map([("username", ["BOB"])]).with_comparison(KeyComparison::CaseInsensitive);
        let a = generator
            .generate(CachableOperation::GetPeople, &CallArguments::Seed(lower))
            .unwrap();
        let b = generator
            .generate(CachableOperation::GetPeople, &CallArguments::Seed(upper))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ignore_empty_attributes() {
        let generator = CacheKeyGenerator::new(CacheKeyConfig {
            use_all_attributes: true,
            ignore_empty_attributes: true,
            ..Default::default()
        });
        let op = CachableOperation::GetUserAttributesBySeed;

        let with_empty = CallArguments::Seed(attribute_map([
            ("username", vec![AttributeValue::from("bob")]),
            ("phone", vec![]),
        ]));
        let without = seed(&[("username", "bob")]);
        let a = generator.generate(op, &with_empty).unwrap();
        assert!(a.is_some());
        assert_eq!(a, generator.generate(op, &without).unwrap());

        let all_empty = CallArguments::Seed(attribute_map([("phone", Vec::<AttributeValue>::new())]));
        assert_eq!(generator.generate(op, &all_empty).unwrap(), None);

        let scalar = CacheKeyGenerator::new(CacheKeyConfig {
            ignore_empty_attributes: true,
            ..Default::default()
        });
        let empty_uid = CallArguments::Identity(String::new());
        assert_eq!(
            scalar.generate(CachableOperation::GetUserAttributesByUid, &empty_uid).unwrap(),
            None
        );
    }

    #[test]
    fn test_blank_list_values_count_as_empty() {
        let generator = CacheKeyGenerator::new(CacheKeyConfig {
            use_all_attributes: true,
            ignore_empty_attributes: true,
            ..Default::default()
        });
        let op = CachableOperation::GetPeople;

        let blank = CallArguments::Seed(attribute_map([
            ("username", vec![AttributeValue::from("bob")]),
            ("phone", vec![AttributeValue::from("")]),
            ("fax", vec![AttributeValue::Null, AttributeValue::from("")]),
        ]));
        let plain = generator.generate(op, &seed(&[("username", "bob")])).unwrap();
        assert!(plain.is_some());
        assert_eq!(generator.generate(op, &blank).unwrap(), plain);

        let only_blank = CallArguments::Seed(attribute_map([("phone", vec![AttributeValue::from("")])]));
        assert_eq!(generator.generate(op, &only_blank).unwrap(), None);

        let mixed = CallArguments::Seed(attribute_map([(
            "phone",
            vec![AttributeValue::from(""), AttributeValue::from("555")],
        )]));
        assert!(generator.generate(op, &mixed).unwrap().is_some());
    }

    #[test]
    fn test_unknown_tag_is_config_error() {
        let err = CacheKeyGenerator::default()
            .generate_key("get_everything()", &CallArguments::None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedOperation(tag) if tag == "get_everything()"));
    }

    #[test]
    fn test_argument_mismatch() {
        let err = CacheKeyGenerator::default()
            .generate(CachableOperation::GetPerson, &seed(&[("username", "bob")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_case_insensitive_seed_attribute_names() {
        let generator = CacheKeyGenerator::default();
        let seed_map = attribute_map([("UserName", ["bob"])]).with_comparison(KeyComparison::CaseInsensitive);
        let key = generator
            .generate(CachableOperation::GetPeople, &CallArguments::Seed(seed_map))
            .unwrap();
        assert!(key.is_some());

        let lower = generator
            .generate(CachableOperation::GetPeople, &seed(&[("username", "bob")]))
            .unwrap();
        assert_eq!(key, lower);
    }

    #[test]
    fn test_default_attribute_only() {
        let generator = CacheKeyGenerator::default();
        let op = CachableOperation::GetPeople;
        let a = generator
            .generate(op, &seed(&[("username", "bob"), ("mail", "b@x")]))
            .unwrap();
        let b = generator
            .generate(op, &seed(&[("username", "bob"), ("mail", "other@x")]))
            .unwrap();
        assert_eq!(a, b);

        assert_eq!(generator.generate(op, &seed(&[("mail", "b@x")])).unwrap(), None);
    }

    #[test]
    fn test_explicit_key_attributes() {
        let generator = CacheKeyGenerator::new(CacheKeyConfig {
            cache_key_attributes: Some(vec!["mail".into()]),
            ..Default::default()
        });
        let op = CachableOperation::GetPeople;
        let a = generator
            .generate(op, &seed(&[("username", "bob"), ("mail", "b@x")]))
            .unwrap();
        let b = generator
            .generate(op, &seed(&[("username", "alice"), ("mail", "b@x")]))
            .unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_explicit_empty_key_attributes_select_nothing() {
        let generator = CacheKeyGenerator::new(CacheKeyConfig {
            cache_key_attributes: Some(Vec::new()),
            ..Default::default()
        });
        let key = generator
            .generate(CachableOperation::GetPeople, &seed(&[("username", "bob")]))
            .unwrap();
        assert_eq!(key, None);
        assert_eq!(
            generator
                .generate(CachableOperation::GetPerson, &CallArguments::Identity("bob".into()))
                .unwrap(),
            None
        );

        let config: CacheKeyConfig = toml::from_str("cache_key_attributes = []").unwrap();
        assert_eq!(config.cache_key_attributes, Some(Vec::new()));
        let config: CacheKeyConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache_key_attributes, None);
    }

    #[test]
    fn test_hash_returns_stable_key() {
        let mut contributing = BTreeMap::new();
        contributing.insert("username".to_string(), KeyValue::List(vec!["bob".into()]));
        let first = hash(&contributing).unwrap();
        assert_eq!(hash(&contributing).unwrap(), first);

        contributing.insert("mail".to_string(), KeyValue::Single(AttributeValue::Float(1.5)));
        assert_ne!(hash(&contributing).unwrap(), first);

        let err = ConfigError::KeyEncoding("bad value".into());
        assert!(err.to_string().contains("could not be encoded"));
    }

    #[test]
    fn test_identity_conventions_hash_differently() {
        let generator = CacheKeyGenerator::default();
        let uid = CallArguments::Identity("bob".into());
        let list = generator
            .generate(CachableOperation::GetMultivaluedUserAttributesByUid, &uid)
            .unwrap();
        let scalar = generator
            .generate(CachableOperation::GetUserAttributesByUid, &uid)
            .unwrap();
        assert!(list.is_some() && scalar.is_some());
        assert_ne!(list, scalar);

        // get_person(uid) shares the list convention
        assert_eq!(
            list,
            generator.generate(CachableOperation::GetPerson, &uid).unwrap()
        );
        assert_eq!(
            list,
            generator
                .generate(CachableOperation::GetPeople, &seed(&[("username", "bob")]))
                .unwrap()
        );
    }

    #[test]
    fn test_introspection_sentinels() {
        let default = CacheKeyGenerator::default();
        assert_eq!(
            default
                .generate(CachableOperation::GetPossibleUserAttributeNames, &CallArguments::None)
                .unwrap(),
            None
        );

        let all = CacheKeyGenerator::new(CacheKeyConfig {
            use_all_attributes: true,
            ..Default::default()
        });
        let names = all
            .generate(CachableOperation::GetPossibleUserAttributeNames, &CallArguments::None)
            .unwrap();
        let query = all
            .generate(CachableOperation::GetAvailableQueryAttributes, &CallArguments::None)
            .unwrap();
        assert!(names.is_some() && query.is_some());
        assert_ne!(names, query);

        let spoof = CallArguments::Seed(attribute_map([(
            POSSIBLE_USER_ATTRIBUTE_NAMES_KEY,
            [POSSIBLE_USER_ATTRIBUTE_NAMES_KEY],
        )]));
        assert_ne!(names, all.generate(CachableOperation::GetPeople, &spoof).unwrap());
    }

    #[test]
    fn test_display() {
        let key = CacheKey {
            checksum: 1,
            hash_code: -1,
        };
        assert_eq!(key.to_string(), "0000000000000001:ffffffff");
    }
}
