//! Star-schema inference from a header row.
//!
//! - [`types`] — inferred schema descriptors (dimensions, facts, date)
//! - [`infer`] — header classification and column type inference

pub mod infer;
pub mod types;

pub use infer::{infer_column_type, infer_schema, parse_date_cell};
pub use types::{ColumnType, DateSpec, DimensionColumn, DimensionSpec, FactColumn, TableSchema};
