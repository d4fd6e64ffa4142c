//! Queries against a tenant's already-built cube view.
//!
//! The manager discovers everything it needs from the relation registry
//! and the view's own column metadata; nothing is guessed from name
//! suffixes. Rows come back with named columns in projection order, ready
//! for the presentation layer to serialize.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::error::{ConvertError, Result};
use crate::ident::{self, display_name, quote_ident};
use crate::store::{self, RelationKind, Store};

/// One result row: (column name, value) pairs in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeRow {
    pub columns: Vec<(String, JsonValue)>,
}

impl CubeRow {
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Row as a JSON object for serialization.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.columns
                .iter()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
        )
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// A dimension wired into the cube.
#[derive(Debug, Clone)]
struct CubeDimension {
    /// Physical table name, tenant prefix included.
    table: String,
    /// Normalized main-column identifier within that table.
    main_column: String,
    /// Projection label of the main column in the cube view.
    display: String,
}

/// Read-only query surface over one tenant's cube.
#[derive(Debug)]
pub struct CubeQueryManager<'a> {
    conn: &'a Connection,
    cube_name: String,
    date_column: String,
    measure: String,
    dimensions: Vec<CubeDimension>,
}

impl<'a> CubeQueryManager<'a> {
    /// Bind to the tenant's cube. Fails with [`ConvertError::MissingCube`]
    /// when no conversion has run for this tenant.
    pub fn new(store: &'a Store, tenant: &str) -> Result<Self> {
        let tenant = ident::normalize(tenant);
        let conn = store.conn();
        let relations = store::tenant_relations(conn, &tenant)?;

        let cube_name = relations
            .iter()
            .find(|r| r.kind == RelationKind::View)
            .map(|r| r.name.clone())
            .ok_or_else(|| ConvertError::MissingCube {
                tenant: tenant.clone(),
            })?;

        let cube_prefix = format!("{tenant}_cube_");
        let measure = cube_name
            .strip_prefix(&cube_prefix)
            .unwrap_or(&cube_name)
            .to_string();

        // The date label is the view's first projected column.
        let date_column: String = conn.query_row(
            "SELECT name FROM pragma_table_info(?1) WHERE cid = 0",
            [&cube_name],
            |r| r.get(0),
        )?;

        let prefix = format!("{tenant}_");
        let dimensions = relations
            .iter()
            .filter(|r| r.kind == RelationKind::Dimension)
            .filter_map(|r| {
                let main = r.main_column.as_ref()?;
                let bare = r.name.strip_prefix(&prefix).unwrap_or(&r.name);
                Some(CubeDimension {
                    table: r.name.clone(),
                    main_column: main.clone(),
                    display: display_name(bare),
                })
            })
            .collect();

        Ok(Self {
            conn,
            cube_name,
            date_column,
            measure,
            dimensions,
        })
    }

    /// MIN/MAX over the cube's date column. Both `None` on an empty cube.
    pub fn date_borders(&self) -> Result<(Option<String>, Option<String>)> {
        let sql = format!(
            "SELECT MIN({d}), MAX({d}) FROM {c}",
            d = quote_ident(&self.date_column),
            c = quote_ident(&self.cube_name)
        );
        let borders = self
            .conn
            .query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?)))?;
        Ok(borders)
    }

    /// Distinct values of each dimension's main column, ordered ascending,
    /// keyed by the dimension's display name in registration order.
    pub fn dimension_values(&self) -> Result<Vec<(String, Vec<String>)>> {
        let mut out = Vec::with_capacity(self.dimensions.len());
        for dim in &self.dimensions {
            let sql = format!(
                "SELECT DISTINCT {m} FROM {t} ORDER BY {m}",
                m = quote_ident(&dim.main_column),
                t = quote_ident(&dim.table)
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let values = stmt
                .query_map([], |row| {
                    Ok(match row.get_ref(0)? {
                        ValueRef::Null => String::new(),
                        ValueRef::Integer(i) => i.to_string(),
                        ValueRef::Real(f) => f.to_string(),
                        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                        ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            out.push((dim.display.clone(), values));
        }
        Ok(out)
    }

    /// The cube, optionally grouped by time.
    ///
    /// `"year"` and `"month"` truncate the date to that granularity, group
    /// by truncated date plus every dimension column in the cube, sum the
    /// measure per group, and order by truncated date. Any other value —
    /// empty string included — returns the raw cube rows unchanged; an
    /// unrecognized period is not an error.
    pub fn cube(&self, group_period: &str) -> Result<Vec<CubeRow>> {
        let sql = match group_period {
            "year" | "month" => {
                let fmt = if group_period == "year" { "%Y" } else { "%Y-%m" };
                let expr = format!("strftime('{fmt}', {})", quote_ident(&self.date_column));
                let measure_q = quote_ident(&self.measure);
                let dim_cols: Vec<String> = self
                    .dimensions
                    .iter()
                    .map(|d| quote_ident(&d.display))
                    .collect();

                let mut select = vec![format!("{expr} AS {}", quote_ident(&self.date_column))];
                select.extend(dim_cols.iter().cloned());
                select.push(format!("SUM({measure_q}) AS {measure_q}"));

                let mut group = vec![expr.clone()];
                group.extend(dim_cols);

                format!(
                    "SELECT {} FROM {} GROUP BY {} ORDER BY {expr}",
                    select.join(", "),
                    quote_ident(&self.cube_name),
                    group.join(", ")
                )
            }
            _ => format!("SELECT * FROM {}", quote_ident(&self.cube_name)),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                columns.push((name.clone(), value_ref_to_json(row.get_ref(i)?)));
            }
            out.push(CubeRow { columns });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use crate::raw::{Cell, RawTable};
    use crate::star::convert;

    fn sheet(rows: &[&[&str]]) -> RawTable {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| Cell::Text((*c).to_string())).collect())
            .collect();
        RawTable::new(rows).unwrap()
    }

    fn cfg() -> ConvertConfig {
        ConvertConfig {
            fact_columns: vec!["amount".into()],
            date_prefix: "date".into(),
            ..Default::default()
        }
    }

    fn converted(rows: &[&[&str]]) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        convert(&mut store, "t", &sheet(rows), &cfg()).unwrap();
        store
    }

    fn reference_store() -> Store {
        converted(&[
            &["Category", "Region.Name", "Date_sale", "Amount"],
            &["A", "East", "2024-01-05", "10"],
            &["B", "East", "2024-01-06", "20"],
        ])
    }

    #[test]
    fn missing_cube_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let err = CubeQueryManager::new(&store, "nobody").unwrap_err();
        assert!(matches!(err, ConvertError::MissingCube { .. }));
    }

    #[test]
    fn date_borders_span_the_data() {
        let store = reference_store();
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let (min, max) = mgr.date_borders().unwrap();
        assert_eq!(min.as_deref(), Some("2024-01-05 00:00:00"));
        assert_eq!(max.as_deref(), Some("2024-01-06 00:00:00"));
    }

    #[test]
    fn dimension_values_are_distinct_and_ordered() {
        let store = converted(&[
            &["Category", "Date", "Amount"],
            &["B", "2024-01-05", "1"],
            &["A", "2024-01-06", "2"],
            &["B", "2024-01-07", "3"],
        ]);
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let dims = mgr.dimension_values().unwrap();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].0, "Category");
        assert_eq!(dims[0].1, ["A", "B"]);
    }

    #[test]
    fn year_grouping_matches_reference_example() {
        let store = reference_store();
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let rows = mgr.cube("year").unwrap();
        // Categories differ per row, so each group sums its own amount.
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.get("date_sale").unwrap().as_str(), Some("2024"));
            let amount = row.get("amount").unwrap().as_i64().unwrap();
            match row.get("Category").unwrap().as_str().unwrap() {
                "A" => assert_eq!(amount, 10),
                "B" => assert_eq!(amount, 20),
                other => panic!("unexpected category {other}"),
            }
        }
    }

    #[test]
    fn year_grouping_sums_within_groups() {
        let store = converted(&[
            &["Category", "Date", "Amount"],
            &["A", "2023-03-01", "1"],
            &["A", "2023-09-01", "2"],
            &["A", "2024-01-01", "4"],
            &["B", "2023-05-01", "8"],
        ]);
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let rows = mgr.cube("year").unwrap();
        assert_eq!(rows.len(), 3);

        let find = |year: &str, cat: &str| {
            rows.iter()
                .find(|r| {
                    r.get("date").unwrap().as_str() == Some(year)
                        && r.get("Category").unwrap().as_str() == Some(cat)
                })
                .unwrap_or_else(|| panic!("no row for {year}/{cat}"))
        };
        assert_eq!(find("2023", "A").get("amount").unwrap().as_i64(), Some(3));
        assert_eq!(find("2024", "A").get("amount").unwrap().as_i64(), Some(4));
        assert_eq!(find("2023", "B").get("amount").unwrap().as_i64(), Some(8));

        // Ordered by truncated date ascending.
        let years: Vec<&str> = rows
            .iter()
            .map(|r| r.get("date").unwrap().as_str().unwrap())
            .collect();
        let mut sorted = years.clone();
        sorted.sort();
        assert_eq!(years, sorted);
    }

    #[test]
    fn month_grouping_truncates_to_month() {
        let store = converted(&[
            &["Category", "Date", "Amount"],
            &["A", "2024-01-05", "1"],
            &["A", "2024-01-20", "2"],
            &["A", "2024-02-01", "4"],
        ]);
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let rows = mgr.cube("month").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("date").unwrap().as_str(), Some("2024-01"));
        assert_eq!(rows[0].get("amount").unwrap().as_i64(), Some(3));
        assert_eq!(rows[1].get("date").unwrap().as_str(), Some("2024-02"));
        assert_eq!(rows[1].get("amount").unwrap().as_i64(), Some(4));
    }

    #[test]
    fn unknown_period_falls_back_to_raw_cube() {
        let store = reference_store();
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let bogus = mgr.cube("bogus").unwrap();
        let empty = mgr.cube("").unwrap();
        assert_eq!(bogus, empty);
        assert_eq!(bogus.len(), 2);
        // Raw rows keep the full projection, labels included.
        assert!(bogus[0].get("Region").is_some());
    }

    #[test]
    fn degenerate_cube_groups_on_date_alone() {
        let store = converted(&[
            &["Code", "Date", "Amount"],
            &["11", "2024-01-05", "10"],
            &["12", "2024-03-06", "20"],
        ]);
        let mgr = CubeQueryManager::new(&store, "t").unwrap();
        let rows = mgr.cube("year").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("date").unwrap().as_str(), Some("2024"));
        assert_eq!(rows[0].get("amount").unwrap().as_i64(), Some(30));
        assert!(mgr.dimension_values().unwrap().is_empty());
    }
}
