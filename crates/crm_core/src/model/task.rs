//! Task model.
//!
//! Tasks hang off any record through `asset`; soft-deleting that record
//! soft-deletes its tasks.

use crate::model::asset::AssetRef;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: Option<UserId>,
    pub name: String,
    /// Record this task is about, if any.
    pub asset: Option<AssetRef>,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
