//! Account repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist and query `accounts` rows with soft-delete awareness.
//! - Provide name search, sort and pagination for account listings.
//! - Cascade soft deletes to dependent tasks and join rows.
//!
//! # Invariants
//! - Insert/update run column-level validation before any SQL.
//! - `find_active_by_id` never returns a soft-deleted account.
//! - Name uniqueness is enforced by the partial index
//!   `idx_accounts_live_name`; violations map to `RepoError::DuplicateName`.

use crate::model::account::{
    escape_search_query, Access, Account, AccountAttributes, AccountId, AccountSort,
    AccountValidationError, NewAccount,
};
use crate::model::asset::AssetKind;
use crate::model::user::UserId;
use crate::repo::{
    ensure_connection_ready, is_unique_violation, run_in_transaction, RepoError, RepoResult,
    RequiredTables, Transactional,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    uuid,
    user_id,
    assigned_to,
    name,
    access,
    website,
    toll_free_phone,
    phone,
    fax,
    billing_address,
    shipping_address,
    deleted_at,
    created_at,
    updated_at
FROM accounts";

const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";
const LIVE_NAME_CONSTRAINT: &str = "accounts.name";

const REQUIRED_TABLES: RequiredTables = &[
    (
        "accounts",
        &[
            "id",
            "uuid",
            "user_id",
            "assigned_to",
            "name",
            "access",
            "website",
            "toll_free_phone",
            "phone",
            "fax",
            "billing_address",
            "shipping_address",
            "deleted_at",
            "created_at",
            "updated_at",
        ],
    ),
    ("tasks", &["asset_type", "asset_id", "deleted_at"]),
    ("account_contacts", &["account_id"]),
    ("account_opportunities", &["account_id"]),
    ("permissions", &["user_id", "asset_type", "asset_id"]),
];

/// Query options for listing accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountListQuery {
    /// Middle-of-name match; escaped with `escape_search_query`.
    pub search: Option<String>,
    pub sort: AccountSort,
    /// Restrict to accounts this user may see: public, owned, assigned, or
    /// shared with them through a permission grant.
    pub visible_to: Option<UserId>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Dependent rows touched by an account soft delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftDeleteSummary {
    pub tasks_deleted: usize,
    pub contact_links_removed: usize,
    pub opportunity_links_removed: usize,
}

/// Repository interface for account persistence.
pub trait AccountRepository {
    /// Inserts a new account and returns the stored row.
    fn insert_account(&self, account: &NewAccount) -> RepoResult<Account>;
    /// Replaces the editable attributes of a live account.
    fn update_account(&self, id: AccountId, attributes: &AccountAttributes)
        -> RepoResult<Account>;
    /// Loads one account, optionally including soft-deleted rows.
    fn get_account(&self, id: AccountId, include_deleted: bool) -> RepoResult<Option<Account>>;
    /// Loads one live account.
    fn find_active_by_id(&self, id: AccountId) -> RepoResult<Option<Account>> {
        self.get_account(id, false)
    }
    fn list_accounts(&self, query: &AccountListQuery) -> RepoResult<Vec<Account>>;
    /// Whether a live account other than `excluding` already uses `name`.
    fn account_name_taken(&self, name: &str, excluding: Option<AccountId>) -> RepoResult<bool>;
    /// Tombstones the account, its tasks, and removes its join rows.
    ///
    /// Deleting an already deleted account is a no-op.
    fn soft_delete_account(&self, id: AccountId) -> RepoResult<SoftDeleteSummary>;
    /// Clears the tombstone of a soft-deleted account.
    fn restore_account(&self, id: AccountId) -> RepoResult<()>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn account_exists(&self, id: AccountId) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM accounts WHERE id = ?1;", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn load_required(&self, id: AccountId) -> RepoResult<Account> {
        self.get_account(id, true)?.ok_or(RepoError::NotFound {
            entity: "account",
            id,
        })
    }
}

impl Transactional for SqliteAccountRepository<'_> {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        run_in_transaction(self.conn, work)
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn insert_account(&self, account: &NewAccount) -> RepoResult<Account> {
        reject_column_errors(&account.attributes)?;
        let attrs = &account.attributes;

        self.conn
            .execute(
                "INSERT INTO accounts (
                    uuid,
                    user_id,
                    assigned_to,
                    name,
                    access,
                    website,
                    toll_free_phone,
                    phone,
                    fax,
                    billing_address,
                    shipping_address
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    account.uuid.to_string(),
                    attrs.user_id,
                    attrs.assigned_to,
                    attrs.name.as_str(),
                    attrs.access.as_str(),
                    attrs.website.as_deref(),
                    attrs.toll_free_phone.as_deref(),
                    attrs.phone.as_deref(),
                    attrs.fax.as_deref(),
                    attrs.billing_address.as_deref(),
                    attrs.shipping_address.as_deref(),
                ],
            )
            .map_err(map_name_conflict)?;

        self.load_required(self.conn.last_insert_rowid())
    }

    fn update_account(
        &self,
        id: AccountId,
        attributes: &AccountAttributes,
    ) -> RepoResult<Account> {
        reject_column_errors(attributes)?;

        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE accounts
                     SET
                        user_id = ?2,
                        assigned_to = ?3,
                        name = ?4,
                        access = ?5,
                        website = ?6,
                        toll_free_phone = ?7,
                        phone = ?8,
                        fax = ?9,
                        billing_address = ?10,
                        shipping_address = ?11,
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1
                       AND deleted_at IS NULL;"
                ),
                params![
                    id,
                    attributes.user_id,
                    attributes.assigned_to,
                    attributes.name.as_str(),
                    attributes.access.as_str(),
                    attributes.website.as_deref(),
                    attributes.toll_free_phone.as_deref(),
                    attributes.phone.as_deref(),
                    attributes.fax.as_deref(),
                    attributes.billing_address.as_deref(),
                    attributes.shipping_address.as_deref(),
                ],
            )
            .map_err(map_name_conflict)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "account",
                id,
            });
        }

        self.load_required(id)
    }

    fn get_account(&self, id: AccountId, include_deleted: bool) -> RepoResult<Option<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id, include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_account_row(row)?));
        }

        Ok(None)
    }

    fn list_accounts(&self, query: &AccountListQuery) -> RepoResult<Vec<Account>> {
        let mut sql = format!("{ACCOUNT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }

        if let Some(search) = query.search.as_deref() {
            let escaped = escape_search_query(search);
            if !escaped.is_empty() {
                sql.push_str(" AND name LIKE ? ESCAPE '\\'");
                bind_values.push(Value::Text(format!("%{}%", escaped.replace('_', "\\_"))));
            }
        }

        if let Some(user_id) = query.visible_to {
            sql.push_str(
                " AND (
                    access = ?
                    OR user_id = ?
                    OR assigned_to = ?
                    OR EXISTS (
                        SELECT 1
                        FROM permissions p
                        WHERE p.asset_type = ?
                          AND p.asset_id = accounts.id
                          AND p.user_id = ?
                    )
                )",
            );
            bind_values.push(Value::Text(Access::Public.as_str().to_string()));
            bind_values.push(Value::Integer(user_id));
            bind_values.push(Value::Integer(user_id));
            bind_values.push(Value::Text(AssetKind::Account.as_str().to_string()));
            bind_values.push(Value::Integer(user_id));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(sort_clause(query.sort));

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut accounts = Vec::new();

        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }

        Ok(accounts)
    }

    fn account_name_taken(&self, name: &str, excluding: Option<AccountId>) -> RepoResult<bool> {
        let taken: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM accounts
                WHERE name = ?1
                  AND deleted_at IS NULL
                  AND (?2 IS NULL OR id <> ?2)
            );",
            params![name, excluding],
            |row| row.get(0),
        )?;
        Ok(taken == 1)
    }

    fn soft_delete_account(&self, id: AccountId) -> RepoResult<SoftDeleteSummary> {
        run_in_transaction(self.conn, || {
            let changed = self.conn.execute(
                &format!(
                    "UPDATE accounts
                     SET
                        deleted_at = {NOW_MS_SQL},
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1
                       AND deleted_at IS NULL;"
                ),
                [id],
            )?;

            if changed == 0 {
                return if self.account_exists(id)? {
                    Ok(SoftDeleteSummary::default())
                } else {
                    Err(RepoError::NotFound {
                        entity: "account",
                        id,
                    })
                };
            }

            let tasks_deleted = self.conn.execute(
                &format!(
                    "UPDATE tasks
                     SET deleted_at = {NOW_MS_SQL}
                     WHERE asset_type = ?1
                       AND asset_id = ?2
                       AND deleted_at IS NULL;"
                ),
                params![AssetKind::Account.as_str(), id],
            )?;
            let contact_links_removed = self
                .conn
                .execute("DELETE FROM account_contacts WHERE account_id = ?1;", [id])?;
            let opportunity_links_removed = self.conn.execute(
                "DELETE FROM account_opportunities WHERE account_id = ?1;",
                [id],
            )?;

            Ok(SoftDeleteSummary {
                tasks_deleted,
                contact_links_removed,
                opportunity_links_removed,
            })
        })
    }

    fn restore_account(&self, id: AccountId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE accounts
                     SET
                        deleted_at = NULL,
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1
                       AND deleted_at IS NOT NULL;"
                ),
                [id],
            )
            .map_err(map_name_conflict)?;

        if changed == 0 && !self.account_exists(id)? {
            return Err(RepoError::NotFound {
                entity: "account",
                id,
            });
        }

        Ok(())
    }
}

fn reject_column_errors(attributes: &AccountAttributes) -> RepoResult<()> {
    let errors = attributes.column_errors();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RepoError::Validation(AccountValidationError { errors }))
    }
}

fn map_name_conflict(err: rusqlite::Error) -> RepoError {
    if is_unique_violation(&err, LIVE_NAME_CONSTRAINT) {
        RepoError::DuplicateName
    } else {
        err.into()
    }
}

fn sort_clause(sort: AccountSort) -> &'static str {
    match sort {
        AccountSort::Name => "name ASC, id ASC",
        AccountSort::DateCreated => "created_at DESC, id DESC",
        AccountSort::DateUpdated => "updated_at DESC, id DESC",
    }
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in accounts.uuid"))
    })?;

    let access_text: String = row.get("access")?;
    let access = Access::parse(&access_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid access `{access_text}` in accounts.access"))
    })?;

    Ok(Account {
        id: row.get("id")?,
        uuid,
        attributes: AccountAttributes {
            user_id: row.get("user_id")?,
            assigned_to: row.get("assigned_to")?,
            name: row.get("name")?,
            access,
            website: row.get("website")?,
            toll_free_phone: row.get("toll_free_phone")?,
            phone: row.get("phone")?,
            fax: row.get("fax")?,
            billing_address: row.get("billing_address")?,
            shipping_address: row.get("shipping_address")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}
