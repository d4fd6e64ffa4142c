//! Cube view construction.
//!
//! One view per tenant, joining the fact table to every dimension it
//! actually references and projecting human-readable labels. The view is
//! built from structured projection/join pieces; every identifier in the
//! generated SQL is normalized and quoted, never interpolated raw.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::ident::{display_name, quote_ident};
use crate::schema::TableSchema;
use crate::store::{self, RelationKind};

/// Build and persist the tenant's cube view, named
/// `{tenant}_cube_{first_measure}`. Dimensions without a main column were
/// never wired into the fact table and are skipped here too; with no
/// categorical dimension at all the view degenerates to date + measures.
pub fn build_view(conn: &Connection, tenant: &str, schema: &TableSchema) -> Result<String> {
    let fact_table = format!("{tenant}_facts");
    let fact_q = quote_ident(&fact_table);

    let mut projection = vec![format!("{fact_q}.{}", quote_ident(&schema.date.ident))];
    for fact in &schema.facts {
        projection.push(format!("{fact_q}.{}", quote_ident(&fact.ident)));
    }

    let mut joins = String::new();
    for dim in &schema.dimensions {
        let Some(main) = dim.main_column() else {
            continue;
        };
        let dim_table = format!("{tenant}_{}", dim.ident);
        let dim_q = quote_ident(&dim_table);
        let display = display_name(&dim.ident);

        joins.push_str(&format!(
            " JOIN {dim_q} ON {fact_q}.{} = {dim_q}.\"id\"",
            quote_ident(&dim.ident)
        ));
        projection.push(format!(
            "{dim_q}.{} AS {}",
            quote_ident(&main.ident),
            quote_ident(&display)
        ));
        for col in &dim.columns {
            if col.index == main.index {
                continue;
            }
            projection.push(format!(
                "{dim_q}.{} AS {}",
                quote_ident(&col.ident),
                quote_ident(&format!("{display}.{}", display_name(&col.ident)))
            ));
        }
    }

    let view_name = format!("{tenant}_cube_{}", schema.facts[0].ident);
    let sql = format!(
        "CREATE VIEW {} AS SELECT {} FROM {fact_q}{joins}",
        quote_ident(&view_name),
        projection.join(", ")
    );
    debug!(view = %view_name, "creating cube view");
    conn.execute_batch(&sql)?;
    store::register_relation(conn, tenant, &view_name, RelationKind::View, None)?;
    Ok(view_name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use crate::raw::{Cell, RawTable};
    use crate::schema::infer_schema;
    use crate::star::materialize;
    use crate::store::Store;

    fn sheet(rows: &[&[&str]]) -> RawTable {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| Cell::Text((*c).to_string())).collect())
            .collect();
        RawTable::new(rows).unwrap()
    }

    fn build(table: &RawTable) -> (Store, String) {
        let cfg = ConvertConfig {
            fact_columns: vec!["amount".into()],
            date_prefix: "date".into(),
            ..Default::default()
        };
        let mut store = Store::open_in_memory().unwrap();
        let schema = infer_schema(table, &cfg).unwrap();
        let tx = store.conn_mut().transaction().unwrap();
        materialize(&tx, "t", &schema, table).unwrap();
        let view = build_view(&tx, "t", &schema).unwrap();
        tx.commit().unwrap();
        (store, view)
    }

    #[test]
    fn view_projects_labels_and_joins() {
        let t = sheet(&[
            &["Category", "Region.Name", "Region.Code", "Date_sale", "Amount"],
            &["A", "East", "x1", "2024-01-05", "10"],
            &["B", "East", "x1", "2024-01-06", "20"],
        ]);
        let (store, view) = build(&t);
        assert_eq!(view, "t_cube_amount");

        let mut stmt = store
            .conn()
            .prepare("SELECT * FROM t_cube_amount ORDER BY \"date_sale\"")
            .unwrap();
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            ["date_sale", "amount", "Category", "Region", "Region.Code"]
        );

        let first: (String, i64, String, String, String) = stmt
            .query_row([], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })
            .unwrap();
        assert_eq!(first.1, 10);
        assert_eq!(first.2, "A");
        assert_eq!(first.3, "East");
        assert_eq!(first.4, "x1");
    }

    #[test]
    fn cube_row_count_equals_fact_row_count() {
        let t = sheet(&[
            &["Category", "Date", "Amount"],
            &["A", "2024-01-05", "10"],
            &["B", "2024-01-06", "20"],
            &["A", "2024-02-01", "5"],
        ]);
        let (store, _) = build(&t);
        let cube: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM t_cube_amount", [], |r| r.get(0))
            .unwrap();
        let facts: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM t_facts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(cube, facts);
    }

    #[test]
    fn degenerate_cube_without_dimensions_still_builds() {
        // Every dimension group is integer-only, so the view has zero
        // joins: just date + measure.
        let t = sheet(&[
            &["Code", "Date", "Amount"],
            &["11", "2024-01-05", "10"],
            &["12", "2024-01-06", "20"],
        ]);
        let (store, view) = build(&t);
        let mut stmt = store
            .conn()
            .prepare(&format!("SELECT * FROM \"{view}\""))
            .unwrap();
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, ["date", "amount"]);
        let n: i64 = store
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM \"{view}\""), [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
