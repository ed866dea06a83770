//! Task repository.
//!
//! Tasks listed for an asset come newest first (`created_at DESC`).

use crate::model::asset::AssetRef;
use crate::model::task::{Task, TaskId};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, parse_asset_ref, RepoError, RepoResult, RequiredTables};
use rusqlite::{params, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    name,
    asset_type,
    asset_id,
    deleted_at,
    created_at
FROM tasks";

const REQUIRED_TABLES: RequiredTables = &[(
    "tasks",
    &["id", "user_id", "name", "asset_type", "asset_id", "deleted_at", "created_at"],
)];

pub trait TaskRepository {
    fn create_task(
        &self,
        owner: Option<UserId>,
        name: &str,
        asset: Option<AssetRef>,
    ) -> RepoResult<Task>;
    fn get_task(&self, id: TaskId, include_deleted: bool) -> RepoResult<Option<Task>>;
    /// Tasks attached to `asset`, newest first.
    fn tasks_for(&self, asset: AssetRef, include_deleted: bool) -> RepoResult<Vec<Task>>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(
        &self,
        owner: Option<UserId>,
        name: &str,
        asset: Option<AssetRef>,
    ) -> RepoResult<Task> {
        if name.trim().is_empty() {
            return Err(RepoError::InvalidData("task name cannot be empty".to_string()));
        }

        self.conn.execute(
            "INSERT INTO tasks (user_id, name, asset_type, asset_id) VALUES (?1, ?2, ?3, ?4);",
            params![
                owner,
                name,
                asset.map(|a| a.kind.as_str()),
                asset.map(|a| a.id)
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_task(id, false)?
            .ok_or(RepoError::NotFound { entity: "task", id })
    }

    fn get_task(&self, id: TaskId, include_deleted: bool) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id, include_deleted])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(row)?)),
            None => Ok(None),
        }
    }

    fn tasks_for(&self, asset: AssetRef, include_deleted: bool) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE asset_type = ?1
               AND asset_id = ?2
               AND (?3 = 1 OR deleted_at IS NULL)
             ORDER BY created_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query(params![asset.kind.as_str(), asset.id, include_deleted])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let asset = match (
        row.get::<_, Option<String>>("asset_type")?,
        row.get::<_, Option<i64>>("asset_id")?,
    ) {
        (Some(kind), Some(id)) => Some(parse_asset_ref(&kind, id, "tasks.asset_type")?),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(
                "tasks.asset_type and tasks.asset_id must be set together".to_string(),
            ));
        }
    };

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        asset,
        deleted_at: row.get("deleted_at")?,
        created_at: row.get("created_at")?,
    })
}
