//! Flattened cube view and the query surface over it.
//!
//! - [`view`] — builds the per-tenant view joining facts to dimensions
//! - [`query`] — date borders, dimension listings, grouped cube queries

pub mod query;
pub mod view;

pub use query::{CubeQueryManager, CubeRow};
pub use view::build_view;
