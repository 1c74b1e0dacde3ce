//! Source backed by caller-supplied code.

use std::fmt;

use super::AttributeSource;
use crate::attributes::{AttributeMap, Seed};
use crate::errors::{BackendError, CoreError};
use crate::identity::IdentityResolver;
use crate::person::AttributeSet;

type Script = dyn Fn(&Seed) -> Result<Option<AttributeMap>, BackendError> + Send + Sync;

/// Wraps a function that builds the attribute map for a seed. Identity
/// resolution still applies to what it returns.
pub struct ScriptedSource {
    name: String,
    script: Box<Script>,
    identity: IdentityResolver,
}

impl ScriptedSource {
    pub fn new<F>(name: impl Into<String>, script: F) -> Self
    where
        F: Fn(&Seed) -> Result<Option<AttributeMap>, BackendError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            script: Box::new(script),
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }
}

impl fmt::Debug for ScriptedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedSource")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl AttributeSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_attribute(&self) -> &str {
        self.identity.attribute()
    }

    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        Ok((self.script)(seed)?.map(|attributes| vec![self.identity.resolve(attributes, hint, None)]))
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        None
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        None
    }
}
