//! Error taxonomy for the conversion and query engine.
//!
//! The split matters to callers: [`SchemaError`] is pre-flight — the header
//! convention was violated and nothing has touched the store yet.
//! [`ConvertError`] covers the whole conversion, distinguishing that
//! pre-flight case from mid-flight storage failures and from internal
//! invariant violations.

use thiserror::Error;

/// Header-convention failure, raised before any DDL runs.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("input table has no header row")]
    EmptyInput,

    #[error("malformed input: {0}")]
    BadInput(String),

    #[error("no date column found: no header starts with '{prefix}'")]
    MissingDateColumn { prefix: String },

    #[error("configured fact column '{name}' not present in the header")]
    FactColumnMissing { name: String },

    #[error("no fact columns configured")]
    NoFactColumns,

    #[error("headers '{first}' and '{second}' both map to table identifier '{ident}'")]
    DuplicateDimension {
        first: String,
        second: String,
        ident: String,
    },

    #[error("unparseable date '{value}' in data row {row}")]
    UnparseableDate { row: usize, value: String },
}

/// Any failure of a conversion or cube query.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Header convention violated; the store was never touched.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A fact row referenced a dimension value with no surrogate id.
    /// Unreachable under the single-pass load order; if it fires, the
    /// materializer itself is broken, not the input.
    #[error("dimension '{table}' has no surrogate id for value '{value}'")]
    Reference { table: String, value: String },

    /// No cube view has been built for this tenant yet.
    #[error("no cube exists for tenant '{tenant}'")]
    MissingCube { tenant: String },

    /// Underlying DDL/DML/SELECT failure. Not retried; a failed conversion
    /// starts over from a clean drop.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
