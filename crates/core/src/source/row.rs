//! SQL-like source: parameterized query in, rows out.

use tracing::debug;

use super::{non_empty, AttributeSource};
use crate::attributes::Seed;
use crate::errors::{BackendError, CoreError};
use crate::identity::IdentityResolver;
use crate::person::AttributeSet;
use crate::pivot::{NameValueColumns, Row, RowPivot};
use crate::query::{BuiltQuery, FragmentBuilder, QueryBuilder, WhereClauseBuilder};

/// Executes a built query against a SQL-like backend.
pub trait RowFetcher: Send + Sync {
    fn fetch(&self, query: &BuiltQuery<String>) -> Result<Vec<Row>, BackendError>;
}

impl<T> RowFetcher for T
where
    T: Fn(&BuiltQuery<String>) -> Result<Vec<Row>, BackendError> + Send + Sync,
{
    fn fetch(&self, query: &BuiltQuery<String>) -> Result<Vec<Row>, BackendError> {
        self(query)
    }
}

/// How result rows map onto people.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLayout {
    /// Each row is one person; columns are attributes.
    SingleRow,
    /// Rows carry attribute names and values. Without an entity column all
    /// rows form one person; with one, rows are grouped per entity value.
    MultiRow {
        columns: NameValueColumns,
        entity_column: Option<String>,
    },
}

/// Resolves people from a SQL-like backend through a [`RowFetcher`].
pub struct RowSource<R> {
    name: String,
    fetcher: R,
    queries: QueryBuilder,
    fragments: Box<dyn FragmentBuilder<String> + Send + Sync>,
    pivot: RowPivot,
    layout: RowLayout,
    identity: IdentityResolver,
}

impl<R: RowFetcher> RowSource<R> {
    pub fn new(name: impl Into<String>, fetcher: R, queries: QueryBuilder, pivot: RowPivot, layout: RowLayout) -> Self {
        Self {
            name: name.into(),
            fetcher,
            queries,
            fragments: Box::new(WhereClauseBuilder::default()),
            pivot,
            layout,
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the `WHERE` clause builder.
    pub fn with_fragment_builder(mut self, fragments: impl FragmentBuilder<String> + Send + Sync + 'static) -> Self {
        self.fragments = Box::new(fragments);
        self
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    fn people_from_rows(&self, rows: &[Row], hint: Option<&str>) -> Result<Vec<AttributeSet>, CoreError> {
        let people = match &self.layout {
            RowLayout::SingleRow => rows
                .iter()
                .map(|row| self.pivot.pivot_row(row))
                .filter(|attributes| !attributes.is_empty())
                .map(|attributes| self.identity.resolve(attributes, hint, None))
                .collect(),
            RowLayout::MultiRow {
                columns,
                entity_column: None,
            } => {
                let attributes = self.pivot.pivot_name_value(rows, columns)?;
                if attributes.is_empty() {
                    Vec::new()
                } else {
                    vec![self.identity.resolve(attributes, hint, None)]
                }
            }
            RowLayout::MultiRow {
                columns,
                entity_column: Some(entity_column),
            } => self
                .pivot
                .pivot_name_value_grouped(rows, columns, entity_column)?
                .into_iter()
                .map(|group| {
                    let entity = group.entity.to_text();
                    let fallback = entity.as_deref().map(|value| (entity_column.as_str(), value));
                    self.identity.resolve(group.attributes, None, fallback)
                })
                .collect(),
        };
        Ok(people)
    }
}

impl<R: RowFetcher> AttributeSource for RowSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity_attribute(&self) -> &str {
        self.identity.attribute()
    }

    fn query(&self, seed: &Seed, hint: Option<&str>) -> Result<Option<Vec<AttributeSet>>, CoreError> {
        let Some(query) = self.queries.build(seed, self.fragments.as_ref()) else {
            return Ok(None);
        };
        debug!(source = %self.name, clause = %query.fragment, "executing row query");

        let rows = self.fetcher.fetch(&query)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(non_empty(self.people_from_rows(&rows, hint)?))
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
