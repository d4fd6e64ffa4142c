//! Star-schema materialization and the conversion entry point.
//!
//! [`materialize`] turns an inferred [`TableSchema`] into per-tenant
//! dimension and fact tables; [`convert`] wraps inference, teardown,
//! materialization, and the cube view build into one transaction under the
//! tenant's exclusive lock. A failed conversion rolls back to whatever the
//! previous successful conversion left.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDateTime;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use crate::config::ConvertConfig;
use crate::cube;
use crate::error::{ConvertError, Result};
use crate::ident::{self, quote_ident};
use crate::raw::RawTable;
use crate::schema::{infer_schema, parse_date_cell, TableSchema};
use crate::store::{self, RelationKind, Store};

/// Stored text form of a parsed date cell. ISO so SQLite `strftime` can
/// truncate it.
pub const DATE_STORE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a completed materialization left behind.
#[derive(Debug)]
pub struct Materialized {
    pub dimension_tables: Vec<String>,
    pub fact_table: String,
    pub fact_rows: usize,
}

/// Outcome of a full conversion, for the caller's response payload.
#[derive(Debug)]
pub struct ConvertOutcome {
    pub view_name: String,
    pub fact_rows: usize,
    pub dimension_tables: Vec<String>,
    pub date_min: Option<NaiveDateTime>,
    pub date_max: Option<NaiveDateTime>,
}

/// Run one full conversion for a tenant: infer, tear down the tenant's
/// prior relations, materialize, build the cube view. Inference failures
/// surface before any mutation; everything after inference is one
/// transaction, serialized per tenant.
pub fn convert(
    store: &mut Store,
    tenant: &str,
    table: &RawTable,
    config: &ConvertConfig,
) -> Result<ConvertOutcome> {
    let tenant = ident::normalize(tenant);
    let schema = infer_schema(table, config)?;

    let lock = Store::tenant_lock(&tenant);
    let _guard = lock.lock();

    let tx = store.conn_mut().transaction()?;
    let materialized = materialize(&tx, &tenant, &schema, table)?;
    let view_name = cube::build_view(&tx, &tenant, &schema)?;
    tx.commit()?;

    info!(
        tenant = %tenant,
        view = %view_name,
        dimensions = materialized.dimension_tables.len(),
        fact_rows = materialized.fact_rows,
        "conversion complete"
    );

    Ok(ConvertOutcome {
        view_name,
        fact_rows: materialized.fact_rows,
        dimension_tables: materialized.dimension_tables,
        date_min: schema.date.min,
        date_max: schema.date.max,
    })
}

/// Materialize the inferred schema: drop the tenant's prior relations,
/// create and load dimension tables with surrogate keys, then create and
/// load the fact table. Must run inside the caller's transaction.
pub fn materialize(
    conn: &Connection,
    tenant: &str,
    schema: &TableSchema,
    table: &RawTable,
) -> Result<Materialized> {
    store::drop_tenant_relations(conn, tenant)?;

    let mut dimension_tables = Vec::with_capacity(schema.dimensions.len());
    // Per dimension ident: raw main-column value → surrogate id.
    let mut key_maps: HashMap<String, HashMap<String, i64>> = HashMap::new();

    for dim in &schema.dimensions {
        let table_name = format!("{tenant}_{}", dim.ident);
        create_dimension_table(conn, tenant, &table_name, dim)?;
        if let Some(main) = dim.main_column() {
            let map = load_dimension_rows(conn, &table_name, dim, main.index, table)?;
            debug!(table = %table_name, distinct = map.len(), "dimension loaded");
            key_maps.insert(dim.ident.clone(), map);
        }
        dimension_tables.push(table_name);
    }

    let fact_table = format!("{tenant}_facts");
    create_fact_table(conn, tenant, &fact_table, schema)?;
    let started = Instant::now();
    let fact_rows = load_fact_rows(conn, &fact_table, schema, table, &key_maps)?;
    debug!(
        table = %fact_table,
        rows = fact_rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fact table loaded"
    );

    Ok(Materialized {
        dimension_tables,
        fact_table,
        fact_rows,
    })
}

fn create_dimension_table(
    conn: &Connection,
    tenant: &str,
    table_name: &str,
    dim: &crate::schema::DimensionSpec,
) -> Result<()> {
    let main_index = dim.main_column().map(|c| c.index);
    let mut columns = vec!["\"id\" INTEGER PRIMARY KEY".to_string()];
    for col in &dim.columns {
        let unique = if Some(col.index) == main_index {
            " UNIQUE"
        } else {
            ""
        };
        columns.push(format!(
            "{} {}{unique}",
            quote_ident(&col.ident),
            col.ty.sql_type()
        ));
    }
    conn.execute_batch(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        columns.join(", ")
    ))?;

    store::register_relation(
        conn,
        tenant,
        table_name,
        RelationKind::Dimension,
        dim.main_column().map(|c| c.ident.as_str()),
    )?;
    Ok(())
}

/// Deduplicate by the raw main-column value, first occurrence wins, and
/// assign surrogate ids sequentially from 1 in first-seen row order. The
/// first occurrence's full row of sibling values is kept; later duplicates
/// are discarded even if their siblings differ.
fn load_dimension_rows(
    conn: &Connection,
    table_name: &str,
    dim: &crate::schema::DimensionSpec,
    main_index: usize,
    table: &RawTable,
) -> Result<HashMap<String, i64>> {
    let col_list: Vec<String> = std::iter::once("\"id\"".to_string())
        .chain(dim.columns.iter().map(|c| quote_ident(&c.ident)))
        .collect();
    let placeholders: Vec<String> = (1..=col_list.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        col_list.join(", "),
        placeholders.join(", ")
    ))?;

    let mut map: HashMap<String, i64> = HashMap::new();
    for row in 0..table.data_row_count() {
        let raw = table.data_cell(row, main_index).as_text();
        if map.contains_key(&raw) {
            continue;
        }
        let id = map.len() as i64 + 1;
        let mut values = vec![SqlValue::Integer(id)];
        for col in &dim.columns {
            values.push(table.data_cell(row, col.index).to_sql_value());
        }
        stmt.execute(params_from_iter(values.iter()))?;
        map.insert(raw, id);
    }
    Ok(map)
}

fn create_fact_table(
    conn: &Connection,
    tenant: &str,
    fact_table: &str,
    schema: &TableSchema,
) -> Result<()> {
    let mut columns = vec![
        "\"id\" INTEGER PRIMARY KEY".to_string(),
        format!("{} TIMESTAMP", quote_ident(&schema.date.ident)),
    ];
    for dim in &schema.dimensions {
        if dim.main_column().is_some() {
            columns.push(format!("{} INTEGER", quote_ident(&dim.ident)));
        }
    }
    for fact in &schema.facts {
        columns.push(format!("{} INTEGER", quote_ident(&fact.ident)));
    }
    conn.execute_batch(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(fact_table),
        columns.join(", ")
    ))?;

    store::register_relation(conn, tenant, fact_table, RelationKind::Fact, None)?;
    Ok(())
}

/// Load one fact row per data row, in source order. Measures are copied
/// verbatim; dimension keys come from the surrogate maps built during the
/// dimension load — a miss there is an invariant violation, not bad input.
fn load_fact_rows(
    conn: &Connection,
    fact_table: &str,
    schema: &TableSchema,
    table: &RawTable,
    key_maps: &HashMap<String, HashMap<String, i64>>,
) -> Result<usize> {
    // (dimension ident, main-column source index) in schema order, only
    // for dimensions actually wired into the fact table.
    let keyed_dims: Vec<(&str, usize)> = schema
        .dimensions
        .iter()
        .filter_map(|d| d.main_column().map(|m| (d.ident.as_str(), m.index)))
        .collect();

    let mut col_list = vec!["\"id\"".to_string(), quote_ident(&schema.date.ident)];
    col_list.extend(keyed_dims.iter().map(|(ident, _)| quote_ident(ident)));
    col_list.extend(schema.facts.iter().map(|f| quote_ident(&f.ident)));
    let placeholders: Vec<String> = (1..=col_list.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(fact_table),
        col_list.join(", "),
        placeholders.join(", ")
    ))?;

    for row in 0..table.data_row_count() {
        let date_text = table.data_cell(row, schema.date.index).as_text();
        let date = parse_date_cell(&date_text).ok_or_else(|| {
            crate::error::SchemaError::UnparseableDate {
                row: row + 1,
                value: date_text.clone(),
            }
        })?;

        let mut values = Vec::with_capacity(col_list.len());
        values.push(SqlValue::Integer(row as i64 + 1));
        values.push(SqlValue::Text(date.format(DATE_STORE_FORMAT).to_string()));
        for (dim_ident, main_index) in &keyed_dims {
            let raw = table.data_cell(row, *main_index).as_text();
            let id = key_maps
                .get(*dim_ident)
                .and_then(|m| m.get(&raw))
                .copied()
                .ok_or_else(|| ConvertError::Reference {
                    table: (*dim_ident).to_string(),
                    value: raw.clone(),
                })?;
            values.push(SqlValue::Integer(id));
        }
        for fact in &schema.facts {
            values.push(table.data_cell(row, fact.index).to_sql_value());
        }
        stmt.execute(params_from_iter(values.iter()))?;
    }

    Ok(table.data_row_count())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
