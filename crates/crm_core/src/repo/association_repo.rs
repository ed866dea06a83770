//! Account associations: contacts, opportunities, activities and comments.
//!
//! # Invariants
//! - A contact/opportunity is linked to a given account at most once.
//! - Account contacts list in link order; opportunities list by id
//!   descending; activities and comments list newest first.
//! - Soft-deleted contacts/opportunities are hidden from account listings.

use crate::model::account::AccountId;
use crate::model::asset::AssetRef;
use crate::model::association::{Activity, Comment, Contact, ContactId, Opportunity, OpportunityId};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, parse_asset_ref, RepoError, RepoResult, RequiredTables};
use rusqlite::{params, Connection, Row};

const REQUIRED_TABLES: RequiredTables = &[
    ("contacts", &["id", "name", "deleted_at", "created_at"]),
    ("account_contacts", &["account_id", "contact_id"]),
    ("opportunities", &["id", "name", "deleted_at", "created_at"]),
    ("account_opportunities", &["account_id", "opportunity_id"]),
    (
        "activities",
        &["id", "user_id", "subject_type", "subject_id", "action", "created_at"],
    ),
    (
        "comments",
        &["id", "user_id", "commentable_type", "commentable_id", "comment", "created_at"],
    ),
];

pub trait AssociationRepository {
    fn create_contact(&self, name: &str) -> RepoResult<Contact>;
    fn create_opportunity(&self, name: &str) -> RepoResult<Opportunity>;
    /// Links a contact; returns `false` when the link already existed.
    fn link_contact(&self, account: AccountId, contact: ContactId) -> RepoResult<bool>;
    /// Links an opportunity; returns `false` when the link already existed.
    fn link_opportunity(&self, account: AccountId, opportunity: OpportunityId)
        -> RepoResult<bool>;
    /// Removes a contact link; returns `false` when there was none.
    fn unlink_contact(&self, account: AccountId, contact: ContactId) -> RepoResult<bool>;
    fn unlink_opportunity(
        &self,
        account: AccountId,
        opportunity: OpportunityId,
    ) -> RepoResult<bool>;
    fn contacts_for_account(&self, account: AccountId) -> RepoResult<Vec<Contact>>;
    fn opportunities_for_account(&self, account: AccountId) -> RepoResult<Vec<Opportunity>>;
    fn record_activity(
        &self,
        user: Option<UserId>,
        subject: AssetRef,
        action: &str,
    ) -> RepoResult<Activity>;
    fn activities_for(&self, subject: AssetRef) -> RepoResult<Vec<Activity>>;
    fn add_comment(
        &self,
        user: Option<UserId>,
        commentable: AssetRef,
        comment: &str,
    ) -> RepoResult<Comment>;
    fn comments_for(&self, commentable: AssetRef) -> RepoResult<Vec<Comment>>;
}

pub struct SqliteAssociationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssociationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn insert_named(&self, table: &'static str, name: &str) -> RepoResult<(i64, i64)> {
        if name.trim().is_empty() {
            return Err(RepoError::InvalidData(format!("{table}.name cannot be empty")));
        }
        self.conn.execute(
            &format!("INSERT INTO {table} (name) VALUES (?1);"),
            [name],
        )?;
        let id = self.conn.last_insert_rowid();
        let created_at = self.conn.query_row(
            &format!("SELECT created_at FROM {table} WHERE id = ?1;"),
            [id],
            |row| row.get(0),
        )?;
        Ok((id, created_at))
    }
}

impl AssociationRepository for SqliteAssociationRepository<'_> {
    fn create_contact(&self, name: &str) -> RepoResult<Contact> {
        let (id, created_at) = self.insert_named("contacts", name)?;
        Ok(Contact {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    fn create_opportunity(&self, name: &str) -> RepoResult<Opportunity> {
        let (id, created_at) = self.insert_named("opportunities", name)?;
        Ok(Opportunity {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    fn link_contact(&self, account: AccountId, contact: ContactId) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO account_contacts (account_id, contact_id) VALUES (?1, ?2);",
            params![account, contact],
        )?;
        Ok(inserted == 1)
    }

    fn link_opportunity(
        &self,
        account: AccountId,
        opportunity: OpportunityId,
    ) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO account_opportunities (account_id, opportunity_id)
             VALUES (?1, ?2);",
            params![account, opportunity],
        )?;
        Ok(inserted == 1)
    }

    fn unlink_contact(&self, account: AccountId, contact: ContactId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM account_contacts WHERE account_id = ?1 AND contact_id = ?2;",
            params![account, contact],
        )?;
        Ok(removed > 0)
    }

    fn unlink_opportunity(
        &self,
        account: AccountId,
        opportunity: OpportunityId,
    ) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM account_opportunities WHERE account_id = ?1 AND opportunity_id = ?2;",
            params![account, opportunity],
        )?;
        Ok(removed > 0)
    }

    fn contacts_for_account(&self, account: AccountId) -> RepoResult<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.created_at
             FROM account_contacts ac
             JOIN contacts c ON c.id = ac.contact_id
             WHERE ac.account_id = ?1
               AND c.deleted_at IS NULL
             ORDER BY ac.id ASC;",
        )?;
        let contacts = stmt
            .query_map([account], |row| {
                Ok(Contact {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn opportunities_for_account(&self, account: AccountId) -> RepoResult<Vec<Opportunity>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, o.name, o.created_at
             FROM account_opportunities ao
             JOIN opportunities o ON o.id = ao.opportunity_id
             WHERE ao.account_id = ?1
               AND o.deleted_at IS NULL
             ORDER BY o.id DESC;",
        )?;
        let opportunities = stmt
            .query_map([account], |row| {
                Ok(Opportunity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(opportunities)
    }

    fn record_activity(
        &self,
        user: Option<UserId>,
        subject: AssetRef,
        action: &str,
    ) -> RepoResult<Activity> {
        self.conn.execute(
            "INSERT INTO activities (user_id, subject_type, subject_id, action)
             VALUES (?1, ?2, ?3, ?4);",
            params![user, subject.kind.as_str(), subject.id, action],
        )?;
        let id = self.conn.last_insert_rowid();
        let created_at =
            self.conn
                .query_row("SELECT created_at FROM activities WHERE id = ?1;", [id], |row| {
                    row.get(0)
                })?;
        Ok(Activity {
            id,
            user_id: user,
            subject,
            action: action.to_string(),
            created_at,
        })
    }

    fn activities_for(&self, subject: AssetRef) -> RepoResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, subject_type, subject_id, action, created_at
             FROM activities
             WHERE subject_type = ?1
               AND subject_id = ?2
             ORDER BY created_at DESC, id DESC;",
        )?;
        let mut rows = stmt.query(params![subject.kind.as_str(), subject.id])?;
        let mut activities = Vec::new();
        while let Some(row) = rows.next()? {
            activities.push(parse_activity_row(row)?);
        }
        Ok(activities)
    }

    fn add_comment(
        &self,
        user: Option<UserId>,
        commentable: AssetRef,
        comment: &str,
    ) -> RepoResult<Comment> {
        if comment.trim().is_empty() {
            return Err(RepoError::InvalidData("comment cannot be empty".to_string()));
        }
        self.conn.execute(
            "INSERT INTO comments (user_id, commentable_type, commentable_id, comment)
             VALUES (?1, ?2, ?3, ?4);",
            params![user, commentable.kind.as_str(), commentable.id, comment],
        )?;
        let id = self.conn.last_insert_rowid();
        let created_at =
            self.conn
                .query_row("SELECT created_at FROM comments WHERE id = ?1;", [id], |row| {
                    row.get(0)
                })?;
        Ok(Comment {
            id,
            user_id: user,
            commentable,
            comment: comment.to_string(),
            created_at,
        })
    }

    fn comments_for(&self, commentable: AssetRef) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, commentable_type, commentable_id, comment, created_at
             FROM comments
             WHERE commentable_type = ?1
               AND commentable_id = ?2
             ORDER BY created_at DESC, id DESC;",
        )?;
        let mut rows = stmt.query(params![commentable.kind.as_str(), commentable.id])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get("commentable_type")?;
            comments.push(Comment {
                id: row.get("id")?,
                user_id: row.get("user_id")?,
                commentable: parse_asset_ref(
                    &kind,
                    row.get("commentable_id")?,
                    "comments.commentable_type",
                )?,
                comment: row.get("comment")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(comments)
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<Activity> {
    let kind: String = row.get("subject_type")?;
    Ok(Activity {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        subject: parse_asset_ref(&kind, row.get("subject_id")?, "activities.subject_type")?,
        action: row.get("action")?,
        created_at: row.get("created_at")?,
    })
}
