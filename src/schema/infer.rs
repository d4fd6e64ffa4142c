//! Header classification and column type inference.
//!
//! Runs entirely before any DDL: every failure out of this module leaves
//! the store untouched.

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{ConvertConfig, DEFAULT_DIM_COLUMN};
use crate::error::SchemaError;
use crate::ident;
use crate::raw::RawTable;

use super::types::*;

/// Classify one source column by scanning its data cells.
///
/// Integer only when every non-empty cell's text is entirely ASCII digits.
/// Decimal text (`10.5`), signed text (`-3`), and columns with no
/// non-empty cells at all are categorical.
pub fn infer_column_type(table: &RawTable, col: usize) -> ColumnType {
    let mut saw_value = false;
    for row in 0..table.data_row_count() {
        let text = table.data_cell(row, col).as_text();
        if text.is_empty() {
            continue;
        }
        saw_value = true;
        if !text.chars().all(|c| c.is_ascii_digit()) {
            return ColumnType::Categorical;
        }
    }
    if saw_value {
        ColumnType::Integer
    } else {
        ColumnType::Categorical
    }
}

/// Parse a date cell's text. Accepts ISO date/datetime plus the dotted and
/// slashed day-first forms common in the source sheets.
pub fn parse_date_cell(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Classify the header row into dimension groups, fact columns, and the
/// date column, and parse the date borders.
///
/// Header cells are processed left-to-right with 1-based column indices:
///
/// 1. a dotted header names a `table.column` dimension column;
/// 2. a configured fact name (case-insensitive) is a measure;
/// 3. the first header starting with the date prefix is the date column,
///    later prefix matches are not re-evaluated and fall through;
/// 4. an excluded marker drops the column;
/// 5. anything else is a one-column dimension named by the header, with an
///    implicit `value` column.
pub fn infer_schema(table: &RawTable, config: &ConvertConfig) -> Result<TableSchema, SchemaError> {
    if config.fact_columns.is_empty() {
        return Err(SchemaError::NoFactColumns);
    }

    let mut dimensions: Vec<DimensionSpec> = Vec::new();
    let mut facts: Vec<FactColumn> = Vec::new();
    let mut date: Option<(String, usize)> = None;

    for (col, cell) in table.header().iter().enumerate() {
        let col = col + 1;
        let header = cell.as_text();
        let lower = header.to_lowercase();

        let (dim_name, col_name) = if let Some((t, c)) = header.split_once('.') {
            (t.to_string(), c.to_string())
        } else if config.is_fact(&lower) {
            facts.push(FactColumn {
                ident: ident::normalize(&header),
                name: header,
                index: col,
            });
            continue;
        } else if config.matches_date_prefix(&lower) && date.is_none() {
            date = Some((header, col));
            continue;
        } else if config.is_excluded(&lower) {
            continue;
        } else {
            (header.clone(), DEFAULT_DIM_COLUMN.to_string())
        };

        let column = DimensionColumn {
            ident: ident::normalize(&col_name),
            name: col_name,
            index: col,
            ty: infer_column_type(table, col),
        };

        if let Some(dim) = dimensions.iter_mut().find(|d| d.name == dim_name) {
            dim.columns.push(column);
        } else {
            let dim_ident = ident::normalize(&dim_name);
            // Distinct header names can normalize to the same identifier
            // (transliteration makes this easy to hit). Catch it here so
            // the caller gets both header names instead of a DDL conflict
            // mid-transaction.
            if let Some(existing) = dimensions.iter().find(|d| d.ident == dim_ident) {
                return Err(SchemaError::DuplicateDimension {
                    first: existing.name.clone(),
                    second: dim_name,
                    ident: dim_ident,
                });
            }
            dimensions.push(DimensionSpec {
                ident: dim_ident,
                name: dim_name,
                columns: vec![column],
            });
        }
    }

    let (date_name, date_index) = date.ok_or_else(|| SchemaError::MissingDateColumn {
        prefix: config.date_prefix.clone(),
    })?;

    for configured in &config.fact_columns {
        let wanted = configured.to_lowercase();
        if !facts.iter().any(|f| f.name.to_lowercase() == wanted) {
            return Err(SchemaError::FactColumnMissing {
                name: configured.clone(),
            });
        }
    }

    // Parse the whole date column up front so a bad cell fails the
    // conversion before any mutation.
    let mut min: Option<NaiveDateTime> = None;
    let mut max: Option<NaiveDateTime> = None;
    for row in 0..table.data_row_count() {
        let text = table.data_cell(row, date_index).as_text();
        let parsed = parse_date_cell(&text).ok_or_else(|| SchemaError::UnparseableDate {
            row: row + 1,
            value: text,
        })?;
        min = Some(min.map_or(parsed, |m| m.min(parsed)));
        max = Some(max.map_or(parsed, |m| m.max(parsed)));
    }

    Ok(TableSchema {
        dimensions,
        facts,
        date: DateSpec {
            ident: ident::normalize(&date_name),
            name: date_name,
            index: date_index,
            min,
            max,
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
