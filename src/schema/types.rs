//! Inferred schema descriptors.
//!
//! These replace the original system's runtime-synthesized table classes:
//! a generic DDL/DML builder consumes them instead.

use chrono::NaiveDateTime;

/// Inferred storage type of a dimension column.
///
/// A column is `Integer` only when every non-empty cell is strictly digit
/// text. Decimal and signed text intentionally fall through to
/// `Categorical`; see the inference tests before changing this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Categorical,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Categorical => "TEXT",
        }
    }
}

/// One column of a dimension group.
#[derive(Debug, Clone)]
pub struct DimensionColumn {
    /// Column name as written in the header (after the dot, or `value`).
    pub name: String,
    /// Normalized identifier used in DDL.
    pub ident: String,
    /// 1-based source column index.
    pub index: usize,
    pub ty: ColumnType,
}

/// One dimension table discovered in the header, columns in first-seen
/// order.
#[derive(Debug, Clone)]
pub struct DimensionSpec {
    /// Table name as written in the header (before the dot, or the bare
    /// header itself).
    pub name: String,
    /// Normalized table identifier (without the tenant prefix).
    pub ident: String,
    pub columns: Vec<DimensionColumn>,
}

impl DimensionSpec {
    /// The dedup/main column: first categorical column in declared order.
    /// A group with no categorical column has no main column and is left
    /// out of surrogate-key assignment, the fact table, and the cube.
    pub fn main_column(&self) -> Option<&DimensionColumn> {
        self.columns
            .iter()
            .find(|c| c.ty == ColumnType::Categorical)
    }
}

/// One configured measure column found in the header.
#[derive(Debug, Clone)]
pub struct FactColumn {
    /// Header text as written.
    pub name: String,
    /// Normalized identifier.
    pub ident: String,
    /// 1-based source column index.
    pub index: usize,
}

/// The date column, with borders parsed pre-flight over all data rows.
#[derive(Debug, Clone)]
pub struct DateSpec {
    pub name: String,
    pub ident: String,
    /// 1-based source column index.
    pub index: usize,
    pub min: Option<NaiveDateTime>,
    pub max: Option<NaiveDateTime>,
}

/// Complete inferred star schema for one sheet.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Dimension groups in first-seen header order.
    pub dimensions: Vec<DimensionSpec>,
    /// Measures in header order.
    pub facts: Vec<FactColumn>,
    pub date: DateSpec,
}
