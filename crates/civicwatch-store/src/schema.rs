// SPDX-License-Identifier: Apache-2.0

use crate::StoreError;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

/// Idempotent schema setup. `issues.seq` is the integer rowid the R*Tree
/// entries are keyed on; `issues.id` is the external identifier.
pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        PRAGMA temp_store=MEMORY;
        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          email TEXT NOT NULL UNIQUE,
          phone TEXT NOT NULL,
          role TEXT NOT NULL,
          password_hash TEXT NOT NULL,
          created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS issues (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          id TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          category TEXT NOT NULL,
          longitude REAL NOT NULL,
          latitude REAL NOT NULL,
          address TEXT NOT NULL,
          image TEXT NOT NULL,
          status TEXT NOT NULL,
          priority TEXT NOT NULL,
          reported_by TEXT NOT NULL REFERENCES users(id),
          admin_notes TEXT NOT NULL DEFAULT '',
          resolved_at TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE VIRTUAL TABLE IF NOT EXISTS issue_geo USING rtree(
          issue_rowid,
          min_lon, max_lon,
          min_lat, max_lat
        );
        CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
        CREATE INDEX IF NOT EXISTS idx_issues_category ON issues(category);
        CREATE INDEX IF NOT EXISTS idx_issues_priority ON issues(priority);
        CREATE INDEX IF NOT EXISTS idx_issues_reported_by ON issues(reported_by);
        CREATE INDEX IF NOT EXISTS idx_issues_created_at ON issues(created_at);
        ",
    )?;
    conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))?;
    Ok(())
}
