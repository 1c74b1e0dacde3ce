//! Attribute sources: the seam where backends plug into resolution.
//!
//! Every source answers the same four questions through [`AttributeSource`].
//! "No data" is always `Ok(None)`; a source never returns an empty list of
//! people.

pub mod complex_stub;
pub mod descriptors;
pub mod directory;
pub mod row;
pub mod rule;
pub mod scripted;
pub mod stub;

pub use complex_stub::ComplexStubSource;
pub use descriptors::{CurrentUserProvider, DescriptorSource};
pub use directory::{DirectorySource, EntryFetcher};
pub use row::{RowFetcher, RowLayout, RowSource};
pub use rule::{AttributeRule, DeclaredRuleSource, SimpleAttributeRule};
pub use scripted::ScriptedSource;
pub use stub::StubSource;

use crate::attributes::{seed_for, AttributeValue, Seed};
use crate::errors::{BackendError, CoreError};
use crate::person::AttributeSet;
use crate::wildcard::has_wildcard;

/// A backend capable of resolving person attributes.
///
/// Implementations are read-only once built and may be shared across
/// threads.
pub trait AttributeSource: Send + Sync {
    /// Short label used in logs and backend errors.
    fn name(&self) -> &str;

    /// Attribute that carries the canonical identity, used to turn a uid
    /// into a seed.
    fn identity_attribute(&self) -> &str;

    /// Resolve everyone matching `seed`. `hint` is the identity the caller
    /// already knows, if any.
    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError>;

    /// Attribute names this source may return; `None` when unknown.
    fn possible_attribute_names(&self) -> Option<Vec<String>>;

    /// Seed attribute names this source can query on; `None` when unknown.
    fn available_query_attributes(&self) -> Option<Vec<String>>;

    /// Resolve everyone matching `seed`.
    ///
    /// The hint is the first value of the seed's identity attribute, unless
    /// that value is a wildcard pattern.
    fn people(&self, seed: &Seed) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        let hint = identity_hint(seed, self.identity_attribute()).filter(|h| !has_wildcard(h));
        self.query(seed, hint.as_deref())
    }

    /// Resolve one person by identity.
    ///
    /// The seed is `{identity_attribute: [uid]}` and `uid` is the identity
    /// hint. More than one match is a backend failure.
    fn person(&self, uid: &str) -> Result<Option<AttributeSet>, CoreError> {
        let seed = seed_for(self.identity_attribute(), uid);
        let Some(mut people) = self.query(&seed, Some(uid))? else {
            return Ok(None);
        };
        match people.len() {
            0 => Ok(None),
            1 => Ok(people.pop()),
            n => Err(BackendError::new(
                self.name(),
                format!("{n} people matched identity '{uid}'"),
            )
            .into()),
        }
    }
}

/// First textual value of `attribute` in `seed`.
pub fn identity_hint(seed: &Seed, attribute: &str) -> Option<String> {
    seed.get(attribute)?.iter().find_map(AttributeValue::to_text)
}

/// `None` for an empty result list.
pub(crate) fn non_empty(people: Vec<AttributeSet>) -> Option<Vec<AttributeSet>> {
    if people.is_empty() {
        None
    } else {
        Some(people)
    }
}
