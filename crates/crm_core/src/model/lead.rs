//! Lead model, the usual source of an account conversion.

use crate::model::account::Access;
use crate::model::asset::{AssetKind, AssetRef, PermissionSource};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type LeadId = i64;

/// Prospect record whose sharing carries over when converted to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub access: Access,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
}

impl PermissionSource for Lead {
    fn asset(&self) -> AssetRef {
        AssetRef::new(AssetKind::Lead, self.id)
    }

    fn access(&self) -> Access {
        self.access
    }
}
