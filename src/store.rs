//! Relational store handle, per-tenant relation registry, and teardown.
//!
//! One [`Store`] wraps one SQLite connection and is constructed once at
//! process start, then passed by reference to every component. Tenant
//! isolation is name-prefix based: all of a tenant's relations start with
//! `{tenant}_`, and the `tenant_objects` registry records which names
//! belong to whom (used for teardown and dimension discovery).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::ident::quote_ident;

/// Name of the registry table. Never dropped by tenant teardown.
pub const REGISTRY_TABLE: &str = "tenant_objects";

/// Process-wide lock map serializing conversions per tenant. Two
/// conversions for the same tenant would race on the drop→create→populate
/// sequence; readers of a stable cube don't take this lock.
static TENANT_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// What a registered relation is, recorded so discovery doesn't have to
/// guess from name suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Dimension,
    Fact,
    View,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Dimension => "dimension",
            RelationKind::Fact => "fact",
            RelationKind::View => "view",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dimension" => Some(RelationKind::Dimension),
            "fact" => Some(RelationKind::Fact),
            "view" => Some(RelationKind::View),
            _ => None,
        }
    }
}

/// One registry row: a relation owned by a tenant.
#[derive(Debug, Clone)]
pub struct RelationEntry {
    pub name: String,
    pub kind: RelationKind,
    /// Normalized main-column identifier for dimensions that have one.
    pub main_column: Option<String>,
}

/// Owns the SQLite connection and the registry.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {REGISTRY_TABLE} (
                id INTEGER PRIMARY KEY,
                owner_tenant TEXT NOT NULL,
                relation_name TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                main_column TEXT
            );"
        ))?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Advisory lock for one tenant's conversion sequence.
    pub fn tenant_lock(tenant: &str) -> Arc<Mutex<()>> {
        TENANT_LOCKS
            .lock()
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Record a relation as owned by a tenant.
pub fn register_relation(
    conn: &Connection,
    tenant: &str,
    name: &str,
    kind: RelationKind,
    main_column: Option<&str>,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {REGISTRY_TABLE} (owner_tenant, relation_name, kind, main_column)
             VALUES (?1, ?2, ?3, ?4)"
        ),
        rusqlite::params![tenant, name, kind.as_str(), main_column],
    )?;
    Ok(())
}

/// All relations registered for a tenant, in registration order.
pub fn tenant_relations(conn: &Connection, tenant: &str) -> Result<Vec<RelationEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT relation_name, kind, main_column FROM {REGISTRY_TABLE}
         WHERE owner_tenant = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map([tenant], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (name, kind, main_column) = row?;
        if let Some(kind) = RelationKind::from_str(&kind) {
            out.push(RelationEntry {
                name,
                kind,
                main_column,
            });
        }
    }
    Ok(out)
}

/// Escape LIKE wildcards so a tenant id containing `_` or `%` only matches
/// itself.
fn like_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Drop every table and view whose name starts with `{tenant}_` and clear
/// the tenant's registry rows. Views go first so nothing is dropped out
/// from under them.
pub fn drop_tenant_relations(conn: &Connection, tenant: &str) -> Result<()> {
    let pattern = format!("{}\\_%", like_escape(tenant));
    let mut stmt = conn.prepare(
        "SELECT name, type FROM sqlite_master
         WHERE type IN ('table', 'view') AND name LIKE ?1 ESCAPE '\\'
         ORDER BY CASE type WHEN 'view' THEN 0 ELSE 1 END",
    )?;
    let relations: Vec<(String, String)> = stmt
        .query_map([&pattern], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;
    drop(stmt);

    for (name, ty) in relations {
        if name == REGISTRY_TABLE {
            continue;
        }
        debug!(relation = %name, kind = %ty, "dropping tenant relation");
        let stmt_kind = if ty == "view" { "VIEW" } else { "TABLE" };
        conn.execute_batch(&format!(
            "DROP {stmt_kind} IF EXISTS {}",
            quote_ident(&name)
        ))?;
    }

    conn.execute(
        &format!("DELETE FROM {REGISTRY_TABLE} WHERE owner_tenant = ?1"),
        [tenant],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trip_preserves_order() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        register_relation(conn, "t", "t_region", RelationKind::Dimension, Some("name")).unwrap();
        register_relation(conn, "t", "t_facts", RelationKind::Fact, None).unwrap();
        register_relation(conn, "t", "t_cube_amount", RelationKind::View, None).unwrap();

        let rels = tenant_relations(conn, "t").unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].name, "t_region");
        assert_eq!(rels[0].kind, RelationKind::Dimension);
        assert_eq!(rels[0].main_column.as_deref(), Some("name"));
        assert_eq!(rels[1].kind, RelationKind::Fact);
        assert_eq!(rels[2].kind, RelationKind::View);
    }

    #[test]
    fn drop_only_touches_the_tenant_prefix() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        conn.execute_batch(
            "CREATE TABLE t_one (id INTEGER);
             CREATE TABLE t_two (id INTEGER);
             CREATE VIEW t_v AS SELECT * FROM t_one;
             CREATE TABLE other_one (id INTEGER);",
        )
        .unwrap();
        register_relation(conn, "t", "t_one", RelationKind::Dimension, None).unwrap();
        register_relation(conn, "other", "other_one", RelationKind::Dimension, None).unwrap();

        drop_tenant_relations(conn, "t").unwrap();

        let count = |name: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                [name],
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("t_one"), 0);
        assert_eq!(count("t_two"), 0);
        assert_eq!(count("t_v"), 0);
        assert_eq!(count("other_one"), 1);
        assert!(tenant_relations(conn, "t").unwrap().is_empty());
        assert_eq!(tenant_relations(conn, "other").unwrap().len(), 1);
    }

    #[test]
    fn tenant_underscore_does_not_wildcard() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        conn.execute_batch(
            "CREATE TABLE ab_dim (id INTEGER);
             CREATE TABLE axb_dim (id INTEGER);",
        )
        .unwrap();
        // Tenant "a" must not match "ab_dim" or "axb_dim" through the
        // LIKE underscore wildcard.
        drop_tenant_relations(conn, "a").unwrap();
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type='table'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(left, 3); // both tables plus the registry survive
    }

    #[test]
    fn registry_table_never_dropped() {
        let store = Store::open_in_memory().unwrap();
        drop_tenant_relations(store.conn(), "tenant").unwrap();
        assert!(store
            .conn()
            .prepare(&format!("SELECT 1 FROM {REGISTRY_TABLE}"))
            .is_ok());
    }

    #[test]
    fn tenant_lock_is_shared_per_tenant() {
        let a = Store::tenant_lock("lock-test-tenant");
        let b = Store::tenant_lock("lock-test-tenant");
        assert!(Arc::ptr_eq(&a, &b));
        let other = Store::tenant_lock("lock-test-other");
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
