// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed persistence for CivicWatch.
//!
//! One [`Store`] owns the connection; issue and user operations hang off
//! it in `issues` and `users`. Radius search goes through an R*Tree
//! index kept in lockstep with the `issues` table and is refined with an
//! exact great-circle cut in [`geo`].

#![forbid(unsafe_code)]

use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

pub mod geo;
mod issues;
mod schema;
mod users;

pub use issues::{IssueFilter, IssueRow, IssueStats, NearbyIssue};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    Sql,
    Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Constraint, message)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::new(StoreErrorCode::Constraint, value.to_string())
            }
            _ => Self::new(StoreErrorCode::Sql, value.to_string()),
        }
    }
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if necessary) the database at `path` and applies
    /// the schema. The parent directory must already exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::apply(&conn)?;
        debug!(path = %path.display(), "issue store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
