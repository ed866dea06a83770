//! Permission grants: which users may view/edit a shared record.
//!
//! # Invariants
//! - At most one grant per `(user, asset)`; repeated grants are no-ops.
//! - Grants reference existing users (foreign key enforced by storage).

use crate::model::asset::AssetRef;
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoResult, RequiredTables};
use rusqlite::{params, Connection};

const REQUIRED_TABLES: RequiredTables =
    &[("permissions", &["id", "user_id", "asset_type", "asset_id"])];

/// Join-table service for per-user sharing grants.
pub trait PermissionStore {
    /// Grants `user` access to `asset`.
    fn grant(&self, asset: AssetRef, user: UserId) -> RepoResult<()>;
    /// Copies every grant of `source` onto `target`; returns grants added.
    fn copy_grants(&self, source: AssetRef, target: AssetRef) -> RepoResult<usize>;
    /// Users holding a grant on `asset`, ascending by id.
    fn grants_for(&self, asset: AssetRef) -> RepoResult<Vec<UserId>>;
    /// Removes every grant on `asset`; returns grants removed.
    fn revoke_all(&self, asset: AssetRef) -> RepoResult<usize>;

    /// Makes `users` the exact grant set of `asset`.
    ///
    /// Not atomic on its own; run it inside a `Transactional` unit of work.
    fn replace_grants(&self, asset: AssetRef, users: &[UserId]) -> RepoResult<()> {
        self.revoke_all(asset)?;
        for user in users {
            self.grant(asset, *user)?;
        }
        Ok(())
    }
}

/// SQLite-backed permission store.
pub struct SqlitePermissionStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePermissionStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl PermissionStore for SqlitePermissionStore<'_> {
    fn grant(&self, asset: AssetRef, user: UserId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO permissions (user_id, asset_type, asset_id)
             VALUES (?1, ?2, ?3);",
            params![user, asset.kind.as_str(), asset.id],
        )?;
        Ok(())
    }

    fn copy_grants(&self, source: AssetRef, target: AssetRef) -> RepoResult<usize> {
        let copied = self.conn.execute(
            "INSERT OR IGNORE INTO permissions (user_id, asset_type, asset_id)
             SELECT user_id, ?3, ?4
             FROM permissions
             WHERE asset_type = ?1
               AND asset_id = ?2
             ORDER BY user_id ASC;",
            params![
                source.kind.as_str(),
                source.id,
                target.kind.as_str(),
                target.id
            ],
        )?;
        Ok(copied)
    }

    fn grants_for(&self, asset: AssetRef) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id
             FROM permissions
             WHERE asset_type = ?1
               AND asset_id = ?2
             ORDER BY user_id ASC;",
        )?;
        let users = stmt
            .query_map(params![asset.kind.as_str(), asset.id], |row| row.get(0))?
            .collect::<Result<Vec<UserId>, _>>()?;
        Ok(users)
    }

    fn revoke_all(&self, asset: AssetRef) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM permissions WHERE asset_type = ?1 AND asset_id = ?2;",
            params![asset.kind.as_str(), asset.id],
        )?;
        Ok(removed)
    }
}
