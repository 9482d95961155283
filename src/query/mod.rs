//! # Query Value Types
//!
//! Shapes exchanged between the pipeline and its adapter: resolved join
//! definitions, pagination windows and sort criteria. The query itself stays
//! an adapter-defined `serde_json::Value`.

pub mod joins;
pub mod pagination;
pub mod sorting;

pub use joins::{JoinDefinition, JoinType};
pub use pagination::{parse_int, Pagination};
pub use sorting::{SortCriterion, SortDirection};
