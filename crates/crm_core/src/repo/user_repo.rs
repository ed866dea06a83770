//! User and avatar repository.
//!
//! A user has at most one current avatar depicting them (the newest avatar
//! whose entity is the user) and may own many avatars uploaded for others.

use crate::model::asset::{AssetKind, AssetRef};
use crate::model::association::Avatar;
use crate::model::user::{User, UserId};
use crate::repo::{ensure_connection_ready, parse_asset_ref, RepoError, RepoResult, RequiredTables};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUIRED_TABLES: RequiredTables = &[
    ("users", &["id", "username", "email", "created_at"]),
    (
        "avatars",
        &["id", "user_id", "entity_type", "entity_id", "image_file_name", "created_at"],
    ),
];

const AVATAR_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    entity_type,
    entity_id,
    image_file_name,
    created_at
FROM avatars";

pub trait UserRepository {
    fn create_user(&self, username: &str, email: Option<&str>) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Attaches an image to `entity`, uploaded by `owner`.
    fn create_avatar(
        &self,
        owner: Option<UserId>,
        entity: AssetRef,
        image_file_name: Option<&str>,
    ) -> RepoResult<Avatar>;
    /// Newest avatar depicting `entity`.
    fn avatar_for(&self, entity: AssetRef) -> RepoResult<Option<Avatar>>;
    /// Avatars uploaded by `owner`, oldest first.
    fn avatars_owned_by(&self, owner: UserId) -> RepoResult<Vec<Avatar>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, username: &str, email: Option<&str>) -> RepoResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(RepoError::InvalidData("username cannot be empty".to_string()));
        }

        self.conn.execute(
            "INSERT INTO users (username, email) VALUES (?1, ?2);",
            params![username, email],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?
            .ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, created_at FROM users WHERE id = ?1;",
                [id],
                |row| {
                    Ok(User {
                        id: row.get("id")?,
                        username: row.get("username")?,
                        email: row.get("email")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn create_avatar(
        &self,
        owner: Option<UserId>,
        entity: AssetRef,
        image_file_name: Option<&str>,
    ) -> RepoResult<Avatar> {
        self.conn.execute(
            "INSERT INTO avatars (user_id, entity_type, entity_id, image_file_name)
             VALUES (?1, ?2, ?3, ?4);",
            params![owner, entity.kind.as_str(), entity.id, image_file_name],
        )?;
        let id = self.conn.last_insert_rowid();
        let mut stmt = self
            .conn
            .prepare(&format!("{AVATAR_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_avatar_row(row),
            None => Err(RepoError::NotFound {
                entity: "avatar",
                id,
            }),
        }
    }

    fn avatar_for(&self, entity: AssetRef) -> RepoResult<Option<Avatar>> {
        let mut stmt = self.conn.prepare(&format!(
            "{AVATAR_SELECT_SQL}
             WHERE entity_type = ?1
               AND entity_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![entity.kind.as_str(), entity.id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_avatar_row(row)?)),
            None => Ok(None),
        }
    }

    fn avatars_owned_by(&self, owner: UserId) -> RepoResult<Vec<Avatar>> {
        let mut stmt = self.conn.prepare(&format!(
            "{AVATAR_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([owner])?;
        let mut avatars = Vec::new();
        while let Some(row) = rows.next()? {
            avatars.push(parse_avatar_row(row)?);
        }
        Ok(avatars)
    }
}

/// Convenience: the avatar depicting a user.
pub fn user_avatar<R: UserRepository>(repo: &R, user: &User) -> RepoResult<Option<Avatar>> {
    repo.avatar_for(AssetRef::new(AssetKind::User, user.id))
}

fn parse_avatar_row(row: &Row<'_>) -> RepoResult<Avatar> {
    let entity_type: String = row.get("entity_type")?;
    Ok(Avatar {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        entity: parse_asset_ref(&entity_type, row.get("entity_id")?, "avatars.entity_type")?,
        image_file_name: row.get("image_file_name")?,
        created_at: row.get("created_at")?,
    })
}
