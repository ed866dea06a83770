//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for CRM records.
//! - Keep SQL, soft-delete filtering and constraint mapping inside this
//!   boundary.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Default reads exclude soft-deleted rows; callers opt in explicitly.
//! - Storage constraint violations surface as semantic errors
//!   (`DuplicateName`, `NotFound`) rather than raw SQLite codes.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::account::AccountValidationError;
use crate::model::asset::{AssetKind, AssetRef};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account_repo;
pub mod association_repo;
pub mod lead_repo;
pub mod permission_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every CRM repository.
#[derive(Debug)]
pub enum RepoError {
    /// Write rejected by column-level validation.
    Validation(AccountValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist (or is soft-deleted where that matters).
    NotFound { entity: &'static str, id: i64 },
    /// Live account name collides with the storage unique index.
    DuplicateName,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::DuplicateName => write!(f, "account name is already used by a live account"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccountValidationError> for RepoError {
    fn from(value: AccountValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Runs a unit of work atomically.
///
/// Every repository sharing the implementor's connection participates in the
/// transaction. Returning `Err` from `work` rolls back all of its writes.
pub trait Transactional {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}

pub(crate) fn run_in_transaction<T, E, F>(conn: &Connection, work: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RepoError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(RepoError::from)?;
    let value = work()?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

/// `(table, columns)` pairs a repository needs before it can run.
pub(crate) type RequiredTables = &'static [(&'static str, &'static [&'static str])];

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: RequiredTables) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Builds an `AssetRef` from a `(*_type, *_id)` column pair.
pub(crate) fn parse_asset_ref(kind: &str, id: i64, column: &'static str) -> RepoResult<AssetRef> {
    AssetKind::parse(kind)
        .map(|parsed| AssetRef::new(parsed, id))
        .ok_or_else(|| RepoError::InvalidData(format!("invalid asset type `{kind}` in {column}")))
}

/// True when `err` is a UNIQUE violation naming `table.column`.
pub(crate) fn is_unique_violation(err: &rusqlite::Error, target: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains(target)
        }
        _ => false,
    }
}
