//! Account maintenance use-cases: edit, share, soft delete, restore, list.
//!
//! # Invariants
//! - Edits run the same validation pipeline as registration; the uniqueness
//!   check excludes the edited account itself.
//! - Edits with a new user list replace the grant set atomically.
//! - Listing defaults to `PER_PAGE` rows and `date created` ordering.

use crate::model::account::{
    Account, AccountAttributes, AccountId, AccountSort, AccountValidationError, ValidationContext,
    PER_PAGE,
};
use crate::model::user::UserId;
use crate::repo::account_repo::{AccountListQuery, AccountRepository, SoftDeleteSummary};
use crate::repo::permission_repo::PermissionStore;
use crate::repo::{RepoError, Transactional};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for account maintenance.
#[derive(Debug)]
pub enum AccountServiceError {
    /// Target account does not exist or is soft-deleted.
    AccountNotFound(AccountId),
    /// Field rules rejected the change.
    Validation(AccountValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for AccountServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AccountNotFound(_) => None,
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for AccountServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "account",
                id,
            } => Self::AccountNotFound(id),
            RepoError::DuplicateName => Self::Validation(AccountValidationError::name_taken()),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<AccountValidationError> for AccountServiceError {
    fn from(value: AccountValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One page of an account listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPage {
    pub items: Vec<Account>,
    /// 1-based page number that was served.
    pub page: u32,
    /// Effective page size.
    pub per_page: u32,
}

/// Account maintenance facade over repository implementations.
pub struct AccountService<A, P>
where
    A: AccountRepository + Transactional,
    P: PermissionStore,
{
    accounts: A,
    permissions: P,
    per_page: u32,
}

impl<A, P> AccountService<A, P>
where
    A: AccountRepository + Transactional,
    P: PermissionStore,
{
    pub fn new(accounts: A, permissions: P) -> Self {
        Self {
            accounts,
            permissions,
            per_page: PER_PAGE,
        }
    }

    /// Overrides the listing page size; zero falls back to `PER_PAGE`.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = if per_page == 0 { PER_PAGE } else { per_page };
        self
    }

    /// Loads one live account.
    pub fn get_account(&self, id: AccountId) -> Result<Account, AccountServiceError> {
        self.accounts
            .find_active_by_id(id)?
            .ok_or(AccountServiceError::AccountNotFound(id))
    }

    /// Users holding a grant on the account.
    pub fn shared_with(&self, id: AccountId) -> Result<Vec<UserId>, AccountServiceError> {
        let account = self.get_account(id)?;
        Ok(self.permissions.grants_for(account.asset())?)
    }

    /// Replaces the account's attributes, and its grants when `users` is set.
    ///
    /// With `users = None` the stored grants are kept and count towards the
    /// `Shared` access rule.
    pub fn update_account(
        &self,
        id: AccountId,
        attributes: &AccountAttributes,
        users: Option<&[UserId]>,
    ) -> Result<Account, AccountServiceError> {
        let users: Option<Vec<UserId>> =
            users.map(|list| list.iter().copied().collect::<BTreeSet<_>>().into_iter().collect());

        let result: Result<Account, AccountServiceError> = self.accounts.transaction(|| {
            let current = self.get_account(id)?;

            let grant_count = match &users {
                Some(list) => list.len(),
                None => self.permissions.grants_for(current.asset())?.len(),
            };
            let name = attributes.name.as_str();
            let name_taken =
                !name.trim().is_empty() && self.accounts.account_name_taken(name, Some(id))?;
            attributes.validate(&ValidationContext {
                name_taken,
                grant_count,
            })?;

            let updated = self.accounts.update_account(id, attributes)?;
            if let Some(list) = &users {
                self.permissions.replace_grants(updated.asset(), list)?;
            }
            Ok(updated)
        });

        match &result {
            Ok(account) => info!(
                "event=account_update module=account_service status=ok account_id={} grants_replaced={}",
                account.id,
                users.is_some()
            ),
            Err(err) => warn!(
                "event=account_update module=account_service status=error account_id={id} error={err}"
            ),
        }
        result
    }

    /// Soft-deletes the account and its tasks, and drops its join rows.
    pub fn soft_delete_account(
        &self,
        id: AccountId,
    ) -> Result<SoftDeleteSummary, AccountServiceError> {
        let summary = self.accounts.soft_delete_account(id)?;
        info!(
            "event=account_soft_delete module=account_service status=ok account_id={id} tasks={} contact_links={} opportunity_links={}",
            summary.tasks_deleted, summary.contact_links_removed, summary.opportunity_links_removed
        );
        Ok(summary)
    }

    /// Brings a soft-deleted account back, provided its name is still free.
    pub fn restore_account(&self, id: AccountId) -> Result<Account, AccountServiceError> {
        self.accounts.restore_account(id)?;
        info!("event=account_restore module=account_service status=ok account_id={id}");
        self.get_account(id)
    }

    /// Runs a listing query, applying the default page size when unset.
    pub fn list_accounts(
        &self,
        query: &AccountListQuery,
    ) -> Result<Vec<Account>, AccountServiceError> {
        let mut query = query.clone();
        if query.limit.is_none() {
            query.limit = Some(self.per_page);
        }
        Ok(self.accounts.list_accounts(&query)?)
    }

    /// Serves one 1-based page of live accounts.
    ///
    /// Page numbers below 1 are treated as the first page.
    pub fn list_page(
        &self,
        search: Option<&str>,
        sort: AccountSort,
        visible_to: Option<UserId>,
        page: u32,
    ) -> Result<AccountPage, AccountServiceError> {
        let page = page.max(1);
        let query = AccountListQuery {
            search: search.map(str::to_string),
            sort,
            visible_to,
            include_deleted: false,
            limit: Some(self.per_page),
            offset: (page - 1).saturating_mul(self.per_page),
        };
        let items = self.accounts.list_accounts(&query)?;
        Ok(AccountPage {
            items,
            page,
            per_page: self.per_page,
        })
    }
}
