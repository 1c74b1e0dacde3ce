//! Attribute mapping configuration.
//!
//! Mappings are built once at setup and treated as read-only afterwards:
//! 1. [`QueryAttributeMapping`]: logical seed attribute -> backend attributes
//! 2. [`ResultAttributeMapping`]: backend attribute -> logical output names
//! 3. [`CaseCanonicalization`]: per-attribute case folding before comparison

pub mod case;
pub mod query;
pub mod result;

pub use case::{CaseCanonicalization, CaseMode};
pub use query::QueryAttributeMapping;
pub use result::{ResultAttributeMapping, ResultTarget};
