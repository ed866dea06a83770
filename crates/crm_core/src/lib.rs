//! Account domain core for the CRM.
//!
//! Owns the business invariants of accounts: validation, name uniqueness
//! among live rows, permission sharing, soft delete, and the registration
//! flow that ties them together.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CrmConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::account::{
    location_from_billing_address, Access, Account, AccountAttributes, AccountField, AccountId,
    AccountParams, AccountSort, AccountValidationError, FieldError, NewAccount, PER_PAGE,
};
pub use model::asset::{AssetKind, AssetRef, PermissionSource};
pub use model::association::{Activity, Avatar, Comment, Contact, Opportunity};
pub use model::lead::{Lead, LeadId};
pub use model::task::{Task, TaskId};
pub use model::user::{User, UserId};
pub use repo::account_repo::{
    AccountListQuery, AccountRepository, SoftDeleteSummary, SqliteAccountRepository,
};
pub use repo::association_repo::{AssociationRepository, SqliteAssociationRepository};
pub use repo::lead_repo::{LeadRepository, SqliteLeadRepository};
pub use repo::permission_repo::{PermissionStore, SqlitePermissionStore};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use repo::user_repo::{user_avatar, SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult, Transactional};
pub use service::account_registrar::{AccountRegistrar, RegistrarError};
pub use service::account_service::{AccountPage, AccountService, AccountServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
