//! Generic single-table key-value storage over SQLite.
//!
//! Both list stores are a text key mapped to a text value; this module owns
//! the SQL for that shape so the typed stores only deal with encoding.
//!
//! # Invariants
//! - Table and column names come from `'static` specs, never from input.
//! - Keys are unique (`PRIMARY KEY`); `upsert` replaces the whole value.

use super::{StoreError, StoreResult};
use crate::db::schema::{current_version, latest_version};
use rusqlite::{params, Connection, OptionalExtension};

/// Static description of one key-value table.
#[derive(Debug)]
pub struct TableSpec {
    pub table: &'static str,
    pub key_column: &'static str,
    pub value_column: &'static str,
}

/// Borrowed handle over one key-value table.
pub struct KvTable<'conn> {
    conn: &'conn Connection,
    spec: &'static TableSpec,
}

impl<'conn> KvTable<'conn> {
    /// Creates a handle after checking the connection was bootstrapped.
    pub fn try_new(conn: &'conn Connection, spec: &'static TableSpec) -> StoreResult<Self> {
        ensure_table_ready(conn, spec)?;
        Ok(Self { conn, spec })
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let TableSpec {
            table,
            key_column,
            value_column,
        } = self.spec;
        let value = self
            .conn
            .query_row(
                &format!("SELECT {value_column} FROM {table} WHERE {key_column} = ?1;"),
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Inserts or replaces the value under `key`.
    pub fn upsert(&self, key: &str, value: &str) -> StoreResult<()> {
        let TableSpec {
            table,
            key_column,
            value_column,
        } = self.spec;
        self.conn.execute(
            &format!(
                "INSERT INTO {table} ({key_column}, {value_column}) VALUES (?1, ?2)
                 ON CONFLICT({key_column}) DO UPDATE SET {value_column} = excluded.{value_column};"
            ),
            params![key, value],
        )?;
        Ok(())
    }

    /// Replaces the value of an existing key. Returns `false` if `key` is absent.
    pub fn update(&self, key: &str, value: &str) -> StoreResult<bool> {
        let TableSpec {
            table,
            key_column,
            value_column,
        } = self.spec;
        let changed = self.conn.execute(
            &format!("UPDATE {table} SET {value_column} = ?2 WHERE {key_column} = ?1;"),
            params![key, value],
        )?;
        Ok(changed > 0)
    }

    /// Removes `key`. Returns whether a row existed.
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        let TableSpec {
            table, key_column, ..
        } = self.spec;
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE {key_column} = ?1;"), [key])?;
        Ok(changed > 0)
    }

    /// Removes every row. Returns the number of rows removed.
    pub fn clear(&self) -> StoreResult<usize> {
        let table = self.spec.table;
        Ok(self.conn.execute(&format!("DELETE FROM {table};"), [])?)
    }

    /// Lists all keys in ascending key order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let TableSpec {
            table, key_column, ..
        } = self.spec;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {key_column} FROM {table} ORDER BY {key_column} ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

fn ensure_table_ready(conn: &Connection, spec: &'static TableSpec) -> StoreResult<()> {
    let actual_version = current_version(conn)?;
    if actual_version != latest_version() {
        return Err(StoreError::uninitialized(actual_version));
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [spec.table],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(StoreError::MissingRequiredTable(spec.table));
    }
    Ok(())
}
