//! Source that exposes extra descriptors for the current user only.

use tracing::debug;

use super::{identity_hint, AttributeSource};
use crate::attributes::Seed;
use crate::errors::CoreError;
use crate::identity::IdentityResolver;
use crate::person::AttributeSet;

/// Reports who the current user is, if anyone.
pub trait CurrentUserProvider: Send + Sync {
    fn current_user_name(&self) -> Option<String>;
}

impl<T> CurrentUserProvider for T
where
    T: Fn() -> Option<String> + Send + Sync,
{
    fn current_user_name(&self) -> Option<String> {
        self()
    }
}

/// Returns `descriptors` when the seed's identity attribute names the
/// current user, and `None` otherwise.
pub struct DescriptorSource<P> {
    descriptors: AttributeSet,
    current_user: P,
    identity: IdentityResolver,
}

impl<P: CurrentUserProvider> DescriptorSource<P> {
    pub fn new(descriptors: AttributeSet, current_user: P) -> Self {
        Self {
            descriptors,
            current_user,
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }
}

impl<P: CurrentUserProvider> AttributeSource for DescriptorSource<P> {
    fn name(&self) -> &str {
        "descriptors"
    }

    fn identity_attribute(&self) -> &str {
        self.identity.attribute()
    }

    fn query(&self, seed: &Seed, _hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        let Some(requested) = identity_hint(seed, self.identity.attribute()) else {
            return Ok(None);
        };
        match self.current_user.current_user_name() {
            Some(current) if current == requested => Ok(Some(vec![self.descriptors.clone()])),
            _ => {
                debug!(requested = %requested, "seed does not name the current user");
                Ok(None)
            }
        }
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        Some(self.descriptors.attributes().keys().map(str::to_string).collect())
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        Some(vec![self.identity.attribute().to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attribute_map;

    fn source() -> DescriptorSource<impl CurrentUserProvider> {
        let descriptors = AttributeSet::named("user", attribute_map([("attribute", vec!["foo", "bar"])]));
        DescriptorSource::new(descriptors, || Some("user".to_string()))
    }

    #[test]
    fn test_only_current_user_gets_descriptors() {
        let source = source();
        let mut seed = attribute_map([("attribute", vec!["foo", "bar"])]);
        assert!(source.people(&seed).unwrap().is_none());

        seed.put("username", vec!["user".into()]);
        let people = source.people(&seed).unwrap().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name().as_deref(), Some("user"));

        assert!(source.person("someone_else").unwrap().is_none());
    }

    #[test]
    fn test_available_query_attributes() {
        assert_eq!(source().available_query_attributes(), Some(vec!["username".to_string()]));
        assert_eq!(source().possible_attribute_names(), Some(vec!["attribute".to_string()]));
    }

    #[test]
    fn test_no_current_user() {
        let source = DescriptorSource::new(AttributeSet::named("user", attribute_map([("a", ["b"])])), || None::<String>);
        assert!(source.person("user").unwrap().is_none());
    }
}
