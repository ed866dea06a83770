//! Account registration use-case.
//!
//! # Responsibility
//! - Resolve an account request into a persisted account: select an existing
//!   one by id, or create a new one with sharing permissions applied.
//!
//! # Invariants
//! - The lookup path performs no writes and ignores request attributes.
//! - The create path validates, inserts and grants inside one transaction;
//!   any failure leaves neither the account nor its grants behind.
//! - A storage-level duplicate name is reported exactly like the
//!   validation pre-check.

use crate::model::account::{
    Access, Account, AccountId, AccountParams, AccountValidationError, NewAccount,
    ValidationContext,
};
use crate::model::asset::{AssetRef, PermissionSource};
use crate::model::user::UserId;
use crate::repo::account_repo::AccountRepository;
use crate::repo::permission_repo::PermissionStore;
use crate::repo::{RepoError, Transactional};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure modes of [`AccountRegistrar::resolve`].
#[derive(Debug)]
pub enum RegistrarError {
    /// Requested id does not resolve to a live account.
    NotFound(AccountId),
    /// One or more field rules rejected the new account.
    Validation(AccountValidationError),
    /// Granting or copying permissions failed; the account was rolled back.
    PermissionGrant(RepoError),
    /// Storage failure outside the cases above.
    Repo(RepoError),
}

impl Display for RegistrarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "account not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::PermissionGrant(err) => write!(f, "failed to assign account permissions: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistrarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Validation(err) => Some(err),
            Self::PermissionGrant(err) | Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for RegistrarError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateName => Self::Validation(AccountValidationError::name_taken()),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound {
                entity: "account",
                id,
            } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl RegistrarError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::PermissionGrant(_) => "permission_grant",
            Self::Repo(_) => "repo",
        }
    }
}

/// Where a new account's grants come from.
enum GrantPlan {
    Users(Vec<UserId>),
    CopyFrom(AssetRef),
}

impl GrantPlan {
    fn label(&self) -> &'static str {
        match self {
            Self::Users(_) => "users",
            Self::CopyFrom(_) => "candidate",
        }
    }
}

/// Creates or selects accounts with sharing permissions applied.
pub struct AccountRegistrar<A, P>
where
    A: AccountRepository + Transactional,
    P: PermissionStore,
{
    accounts: A,
    permissions: P,
}

impl<A, P> AccountRegistrar<A, P>
where
    A: AccountRepository + Transactional,
    P: PermissionStore,
{
    /// `accounts` and `permissions` must share one connection so grants
    /// commit or roll back together with the account row.
    pub fn new(accounts: A, permissions: P) -> Self {
        Self {
            accounts,
            permissions,
        }
    }

    /// Resolves `params` into a persisted account.
    ///
    /// # Contract
    /// - `params.id` set: returns that live account unchanged.
    /// - Otherwise creates an account from `params.attributes`:
    ///   - access other than `Lead`, or no `candidate`: each user in `users`
    ///     is granted access;
    ///   - access `Lead` with a `candidate`: the account adopts the
    ///     candidate's access level and a copy of its grants.
    ///
    /// # Errors
    /// - [`RegistrarError::NotFound`] for an unknown or soft-deleted id.
    /// - [`RegistrarError::Validation`] for blank/long/duplicate names and
    ///   `Shared` access without any grant.
    /// - [`RegistrarError::PermissionGrant`] when grants cannot be written.
    pub fn resolve(
        &self,
        params: &AccountParams,
        candidate: Option<&dyn PermissionSource>,
        users: &[UserId],
    ) -> Result<Account, RegistrarError> {
        let started_at = Instant::now();

        if let Some(id) = params.id {
            let result = self
                .accounts
                .find_active_by_id(id)
                .map_err(RegistrarError::from)
                .and_then(|found| found.ok_or(RegistrarError::NotFound(id)));
            log_outcome("lookup", &result, started_at);
            return result;
        }

        let result = self.create(params, candidate, users);
        log_outcome("create", &result, started_at);
        result
    }

    fn create(
        &self,
        params: &AccountParams,
        candidate: Option<&dyn PermissionSource>,
        users: &[UserId],
    ) -> Result<Account, RegistrarError> {
        let mut draft = NewAccount::new(params.attributes.clone());

        let plan = match candidate {
            Some(source) if draft.attributes.access == Access::Lead => {
                draft.attributes.access = source.access();
                GrantPlan::CopyFrom(source.asset())
            }
            _ => GrantPlan::Users(unique_users(users)),
        };

        self.accounts.transaction(|| {
            let grant_count = match &plan {
                GrantPlan::Users(users) => users.len(),
                GrantPlan::CopyFrom(source) => self.permissions.grants_for(*source)?.len(),
            };
            let name = draft.attributes.name.as_str();
            let name_taken =
                !name.trim().is_empty() && self.accounts.account_name_taken(name, None)?;

            draft.attributes.validate(&ValidationContext {
                name_taken,
                grant_count,
            })?;

            let account = self.accounts.insert_account(&draft)?;
            self.apply_grants(&account, &plan)?;

            info!(
                "event=account_create module=registrar status=ok account_id={} access={} grant_source={} grants={}",
                account.id,
                account.attributes.access.as_str(),
                plan.label(),
                grant_count
            );
            Ok(account)
        })
    }

    fn apply_grants(&self, account: &Account, plan: &GrantPlan) -> Result<(), RegistrarError> {
        let target = account.asset();
        match plan {
            GrantPlan::Users(users) => {
                for user in users {
                    self.permissions
                        .grant(target, *user)
                        .map_err(RegistrarError::PermissionGrant)?;
                }
            }
            GrantPlan::CopyFrom(source) => {
                self.permissions
                    .copy_grants(*source, target)
                    .map_err(RegistrarError::PermissionGrant)?;
            }
        }
        Ok(())
    }
}

impl From<AccountValidationError> for RegistrarError {
    fn from(value: AccountValidationError) -> Self {
        Self::Validation(value)
    }
}

fn unique_users(users: &[UserId]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    users.iter().copied().filter(|user| seen.insert(*user)).collect()
}

fn log_outcome(path: &str, result: &Result<Account, RegistrarError>, started_at: Instant) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(account) => info!(
            "event=account_resolve module=registrar status=ok path={path} account_id={} duration_ms={duration_ms}",
            account.id
        ),
        Err(RegistrarError::Validation(err)) => {
            let fields = err
                .errors
                .iter()
                .map(|e| e.field.as_str())
                .collect::<Vec<_>>()
                .join(",");
            warn!(
                "event=account_resolve module=registrar status=error path={path} error_code=validation fields={fields} duration_ms={duration_ms}"
            );
        }
        Err(err) => warn!(
            "event=account_resolve module=registrar status=error path={path} error_code={} duration_ms={duration_ms} error={err}",
            err.code()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::unique_users;

    #[test]
    fn unique_users_keeps_first_occurrence_order() {
        assert_eq!(unique_users(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(unique_users(&[]).is_empty());
    }
}
