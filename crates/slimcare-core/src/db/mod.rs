//! SQLite persistence for patients, doses, evolutions, vials and cash flow.
//!
//! Each table's queries live in their own file as `impl Database` blocks.
//! Multi-write operations run inside [`Database::begin`] so a failure
//! leaves the stored state untouched.

mod cash_flow;
mod doses;
mod evolutions;
mod patients;
mod schema;
mod settings;
mod vials;

pub use cash_flow::Period;
pub use doses::{AdministrationStamp, PatientDose};
pub use schema::SCHEMA;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction};
use thiserror::Error;

/// How long a write waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Stale write for {id}: expected version {expected}, stored version is newer")]
    Conflict { id: String, expected: i64 },
}

pub type DbResult<T> = Result<T, DbError>;

/// Clinic database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the clinic database file.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Opening database");
        Self::with_connection(Connection::open(path)?)
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction on the shared connection.
    ///
    /// Dropping the returned guard without `commit` rolls back. Methods that
    /// open their own transaction must not be called while one is open.
    pub fn begin(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}
