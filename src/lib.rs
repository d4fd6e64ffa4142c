//! starmill — spreadsheet-to-star-schema conversion and cube queries.
//!
//! A tenant uploads a sheet whose header row follows a naming convention:
//! dotted `table.column` names declare dimension columns, a configured set
//! of measure names declare facts, and a date column announces itself with
//! a prefix. starmill infers a star schema from that convention,
//! materializes it as per-tenant relational tables with surrogate-keyed
//! dimensions, persists a flattened cube view, and answers date-range,
//! dimension-listing, and grouped aggregation queries against it.
//!
//! # Module structure
//!
//! - [`raw`] — untyped cell/table input model
//! - [`ident`] — header-text → SQL-identifier normalization
//! - [`config`] — fact names, date prefix, excluded markers
//! - [`schema`] — column type + star schema inference
//! - [`store`] — connection handle, relation registry, tenant teardown
//! - [`star`] — materialization and the `convert` entry point
//! - [`cube`] — cube view construction and the query surface
//!
//! HTTP routing, auth, and upload parsing live outside this crate; the
//! engine consumes a tenant id, a 2-D cell array, and a store handle.

pub mod config;
pub mod cube;
pub mod error;
pub mod ident;
pub mod raw;
pub mod schema;
pub mod star;
pub mod store;

pub use config::ConvertConfig;
pub use cube::{CubeQueryManager, CubeRow};
pub use error::{ConvertError, Result, SchemaError};
pub use raw::{Cell, RawTable};
pub use star::{convert, ConvertOutcome};
pub use store::Store;
