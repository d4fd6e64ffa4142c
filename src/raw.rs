//! Untyped input model for an uploaded sheet.
//!
//! Upload parsing itself (XLSX, CSV, whatever the frontend accepts) lives
//! outside this crate; the engine consumes a [`RawTable`] of untyped cells
//! where row 0 is the header and everything after it is data.

use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

use crate::error::SchemaError;

/// One spreadsheet cell. Numbers keep their numeric identity so they load
/// verbatim; everything else is text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Canonical text rendering used for header matching, type inference,
    /// and surrogate-key dedup. Integral numbers render without a decimal
    /// point so `10.0` passes the digits-only check the same way the text
    /// `"10"` does.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }

    /// The value as stored: raw, no transformation.
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            Cell::Empty => SqlValue::Null,
            Cell::Text(s) => SqlValue::Text(s.clone()),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    SqlValue::Integer(*n as i64)
                } else {
                    SqlValue::Real(*n)
                }
            }
        }
    }
}

/// Ordered rows of ordered cells; row 0 is the header. Immutable once built.
#[derive(Debug, Clone)]
pub struct RawTable {
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Wrap a 2-D cell array. Fails only when there is no header row at all.
    pub fn new(rows: Vec<Vec<Cell>>) -> Result<Self, SchemaError> {
        if rows.is_empty() {
            return Err(SchemaError::EmptyInput);
        }
        Ok(Self { rows })
    }

    /// Parse the JSON adapter format: a 2-D array where each cell is a
    /// string, a number, or null. Empty strings and nulls are empty cells.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let parsed: JsonValue =
            serde_json::from_str(text).map_err(|e| SchemaError::BadInput(e.to_string()))?;
        let outer = parsed
            .as_array()
            .ok_or_else(|| SchemaError::BadInput("expected a 2-D array of cells".into()))?;

        let mut rows = Vec::with_capacity(outer.len());
        for row in outer {
            let cells = row
                .as_array()
                .ok_or_else(|| SchemaError::BadInput("expected a 2-D array of cells".into()))?;
            let mut out = Vec::with_capacity(cells.len());
            for cell in cells {
                out.push(match cell {
                    JsonValue::Null => Cell::Empty,
                    JsonValue::String(s) if s.is_empty() => Cell::Empty,
                    JsonValue::String(s) => Cell::Text(s.clone()),
                    JsonValue::Number(n) => Cell::Number(n.as_f64().unwrap_or(0.0)),
                    other => Cell::Text(other.to_string()),
                });
            }
            rows.push(out);
        }
        Self::new(rows)
    }

    pub fn header(&self) -> &[Cell] {
        &self.rows[0]
    }

    /// Data rows in source order (everything after the header).
    pub fn data_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows[1..].iter().map(Vec::as_slice)
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len() - 1
    }

    /// Cell at (0-based data row, 1-based column), as the header scan
    /// numbers columns. Missing cells in a ragged row read as empty.
    pub fn data_cell(&self, data_row: usize, col: usize) -> &Cell {
        self.rows[data_row + 1].get(col - 1).unwrap_or(&Cell::Empty)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
