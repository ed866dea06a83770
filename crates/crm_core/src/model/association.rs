//! Records linked to accounts: contacts, opportunities, activities,
//! comments and avatars.

use crate::model::asset::AssetRef;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type ContactId = i64;
pub type OpportunityId = i64;

/// Person attached to one or more accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub created_at: i64,
}

/// Sales opportunity attached to one or more accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub name: String,
    pub created_at: i64,
}

/// Audit trail entry: `user` performed `action` on `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub subject: AssetRef,
    pub action: String,
    pub created_at: i64,
}

/// Free-text comment on a commentable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub commentable: AssetRef,
    pub comment: String,
    pub created_at: i64,
}

/// Image attached to an entity (typically a user), owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: i64,
    /// Uploader.
    pub user_id: Option<UserId>,
    /// Record the image depicts.
    pub entity: AssetRef,
    pub image_file_name: Option<String>,
    pub created_at: i64,
}
