//! Directory-like source: search filter in, flattened entries out.

use tracing::debug;

use super::{non_empty, AttributeSource};
use crate::attributes::Seed;
use crate::errors::{BackendError, CoreError};
use crate::identity::IdentityResolver;
use crate::person::AttributeSet;
use crate::pivot::{Entry, RowPivot};
use crate::query::{DirectoryFilter, FilterBuilder, QueryBuilder, QueryType};

/// Runs a directory search.
pub trait EntryFetcher: Send + Sync {
    fn search(&self, filter: &DirectoryFilter) -> Result<Vec<Entry>, BackendError>;
}

impl<T> EntryFetcher for T
where
    T: Fn(&DirectoryFilter) -> Result<Vec<Entry>, BackendError> + Send + Sync,
{
    fn search(&self, filter: &DirectoryFilter) -> Result<Vec<Entry>, BackendError> {
        self(filter)
    }
}

/// Resolves people from a directory through an [`EntryFetcher`]. Each
/// entry is one person.
pub struct DirectorySource<E> {
    name: String,
    fetcher: E,
    queries: QueryBuilder,
    filters: FilterBuilder,
    pivot: RowPivot,
    identity: IdentityResolver,
}

impl<E: EntryFetcher> DirectorySource<E> {
    pub fn new(name: impl Into<String>, fetcher: E, queries: QueryBuilder, pivot: RowPivot) -> Self {
        Self {
            name: name.into(),
            fetcher,
            queries,
            filters: FilterBuilder::default(),
            pivot,
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }

    /// Combine per-attribute filters with `&` or `|`.
    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.filters = FilterBuilder::new(query_type);
        self
    }
}

impl<E: EntryFetcher> AttributeSource for DirectorySource<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_attribute(&self) -> &str {
        self.identity.attribute()
    }

    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        let Some(query) = self.queries.build(seed, &self.filters) else {
            return Ok(None);
        };
        debug!(source = %self.name, filter = %query.fragment, "searching directory");

        let people = self
            .fetcher
            .search(&query.fragment)?
            .iter()
            .map(|entry| self.pivot.pivot_entry(entry))
            .filter(|attributes| !attributes.is_empty())
            .map(|attributes| self.identity.resolve(attributes, hint, None))
            .collect();
        Ok(non_empty(people))
    }

    fn possible_attribute_names(&self) -> Option<Vec<String>> {
        let names: Vec<String> = self
            .pivot
            .mapping()
            .logical_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    fn available_query_attributes(&self) -> Option<Vec<String>> {
        Some(self.queries.mapping().logical_names().map(str::to_string).collect())
    }
}
