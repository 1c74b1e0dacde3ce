//! persondir core library.
//!
//! This crate resolves person attributes from heterogeneous backends: it maps
//! a logical seed into backend queries, pivots raw rows and entries into
//! normalized attribute sets, assigns a canonical identity, matches wildcard
//! lookups against static collections, and computes reproducible cache keys
//! for resolution calls.

pub mod attributes;
pub mod cache_key;
pub mod config;
pub mod container;
pub mod errors;
pub mod identity;
pub mod mapping;
pub mod person;
pub mod pivot;
pub mod query;
pub mod source;
pub mod wildcard;

// Re-exports for convenience.
pub use attributes::{AttributeMap, AttributeValue, Seed};
pub use cache_key::{CachableOperation, CacheKey, CacheKeyGenerator, CallArguments};
pub use config::ResolverConfig;
pub use container::{CaseFoldingMap, KeyComparison};
pub use errors::{BackendError, ConfigError, CoreError, ShapeError};
pub use identity::IdentityResolver;
pub use person::{AttributeSet, Identity};
pub use pivot::RowPivot;
pub use query::QueryBuilder;
pub use source::AttributeSource;
pub use wildcard::WildcardMatcher;
