//! CRM user model.

use crate::model::asset::{AssetKind, AssetRef};
use serde::{Deserialize, Serialize};

/// Storage identifier of a user row.
pub type UserId = i64;

/// Application user who owns, is assigned, or is granted access to records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl User {
    pub fn asset(&self) -> AssetRef {
        AssetRef::new(AssetKind::User, self.id)
    }
}
