//! Lead repository.

use crate::model::account::Access;
use crate::model::lead::{Lead, LeadId};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult, RequiredTables};
use rusqlite::{params, Connection, OptionalExtension};

const REQUIRED_TABLES: RequiredTables = &[(
    "leads",
    &["id", "user_id", "name", "access", "deleted_at", "created_at"],
)];

pub trait LeadRepository {
    fn create_lead(&self, owner: Option<UserId>, name: &str, access: Access) -> RepoResult<Lead>;
    /// Loads one live lead.
    fn get_lead(&self, id: LeadId) -> RepoResult<Option<Lead>>;
}

pub struct SqliteLeadRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLeadRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl LeadRepository for SqliteLeadRepository<'_> {
    fn create_lead(&self, owner: Option<UserId>, name: &str, access: Access) -> RepoResult<Lead> {
        self.conn.execute(
            "INSERT INTO leads (user_id, name, access) VALUES (?1, ?2, ?3);",
            params![owner, name, access.as_str()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_lead(id)?
            .ok_or(RepoError::NotFound { entity: "lead", id })
    }

    fn get_lead(&self, id: LeadId) -> RepoResult<Option<Lead>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, name, access, deleted_at, created_at
                 FROM leads
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, LeadId>("id")?,
                        row.get::<_, Option<UserId>>("user_id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, String>("access")?,
                        row.get::<_, Option<i64>>("deleted_at")?,
                        row.get::<_, i64>("created_at")?,
                    ))
                },
            )
            .optional()?;

        let Some((id, user_id, name, access_text, deleted_at, created_at)) = row else {
            return Ok(None);
        };
        let access = Access::parse(&access_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid access `{access_text}` in leads.access"))
        })?;

        Ok(Some(Lead {
            id,
            user_id,
            name,
            access,
            deleted_at,
            created_at,
        }))
    }
}
