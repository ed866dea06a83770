//! Polymorphic record references.
//!
//! Permissions, tasks, activities, comments and avatars point at "some
//! record" by `(type, id)`. `AssetRef` is the typed form of that pair.

use crate::model::account::Access;
use serde::{Deserialize, Serialize};

/// Kind of record an `AssetRef` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Account,
    Contact,
    Lead,
    Opportunity,
    User,
}

impl AssetKind {
    /// Value stored in `*_type` columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Contact => "Contact",
            Self::Lead => "Lead",
            Self::Opportunity => "Opportunity",
            Self::User => "User",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Account" => Some(Self::Account),
            "Contact" => Some(Self::Contact),
            "Lead" => Some(Self::Lead),
            "Opportunity" => Some(Self::Opportunity),
            "User" => Some(Self::User),
            _ => None,
        }
    }
}

/// Typed `(kind, id)` pointer to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub id: i64,
}

impl AssetRef {
    pub fn new(kind: AssetKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// A record whose sharing permissions can seed a new account.
///
/// Lead conversion uses this: the converted account inherits the lead's
/// access level and permission grants.
pub trait PermissionSource {
    /// Reference used to look up the source's grants.
    fn asset(&self) -> AssetRef;
    /// Access level the new account adopts.
    fn access(&self) -> Access;
}

#[cfg(test)]
mod tests {
    use super::AssetKind;

    #[test]
    fn asset_kind_roundtrips_through_column_value() {
        for kind in [
            AssetKind::Account,
            AssetKind::Contact,
            AssetKind::Lead,
            AssetKind::Opportunity,
            AssetKind::User,
        ] {
            assert_eq!(AssetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AssetKind::parse("account"), None);
    }
}
