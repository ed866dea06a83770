//! Account domain model.
//!
//! # Responsibility
//! - Define the CRM organization record and its request/insert shapes.
//! - Own the pre-persist validation pipeline for account attributes.
//! - Provide display helpers derived from stored attributes.
//!
//! # Invariants
//! - `name` is non-blank and at most 64 characters.
//! - `name` is unique among live (not soft-deleted) accounts.
//! - A `Shared` account carries at least one permission grant.
//! - `uuid` is generated once at construction and never reused.

use crate::model::asset::{AssetKind, AssetRef, PermissionSource};
use crate::model::user::UserId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage identifier of an account row.
pub type AccountId = i64;

/// Maximum account name length in characters.
pub const NAME_MAX_CHARS: usize = 64;
/// Default page size for account listings.
pub const PER_PAGE: u32 = 20;

const WEBSITE_MAX_CHARS: usize = 64;
const PHONE_MAX_CHARS: usize = 32;
const ADDRESS_MAX_CHARS: usize = 255;

pub const NAME_BLANK_MESSAGE: &str = "Please specify account name.";
pub const NAME_TAKEN_MESSAGE: &str = "has already been taken";
pub const SHARED_WITHOUT_USERS_MESSAGE: &str = "Please specify users to share the account with.";

static ZIP_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s+)\d+(:?\s+|$)").expect("valid zip code regex"));
static SEARCH_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\-]").expect("valid search noise regex"));

/// Visibility/sharing mode of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Visible to the owner and assignee only.
    #[default]
    Private,
    /// Visible to every user.
    Public,
    /// Visible to the users holding a permission grant.
    Shared,
    /// Inherits sharing from the lead it was converted from.
    Lead,
}

impl Access {
    /// Value stored in the `access` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "Private",
            Self::Public => "Public",
            Self::Shared => "Shared",
            Self::Lead => "Lead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Private" => Some(Self::Private),
            "Public" => Some(Self::Public),
            "Shared" => Some(Self::Shared),
            "Lead" => Some(Self::Lead),
            _ => None,
        }
    }
}

/// Editable account attributes, shared by requests, inserts and stored rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountAttributes {
    /// Owning user.
    pub user_id: Option<UserId>,
    /// User the account is assigned to.
    pub assigned_to: Option<UserId>,
    pub name: String,
    pub access: Access,
    pub website: Option<String>,
    pub toll_free_phone: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    /// Free text, one address line per `\n`.
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
}

impl AccountAttributes {
    /// Creates attributes with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Column-level checks that need no storage lookups.
    ///
    /// Returns every violation found, in field order.
    pub fn column_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new(AccountField::Name, NAME_BLANK_MESSAGE));
        } else if self.name.chars().count() > NAME_MAX_CHARS {
            errors.push(FieldError::too_long(AccountField::Name, NAME_MAX_CHARS));
        }

        let optional_columns = [
            (AccountField::Website, &self.website, WEBSITE_MAX_CHARS),
            (AccountField::TollFreePhone, &self.toll_free_phone, PHONE_MAX_CHARS),
            (AccountField::Phone, &self.phone, PHONE_MAX_CHARS),
            (AccountField::Fax, &self.fax, PHONE_MAX_CHARS),
            (AccountField::BillingAddress, &self.billing_address, ADDRESS_MAX_CHARS),
            (AccountField::ShippingAddress, &self.shipping_address, ADDRESS_MAX_CHARS),
        ];
        for (field, value, max) in optional_columns {
            if value.as_deref().is_some_and(|v| v.chars().count() > max) {
                errors.push(FieldError::too_long(field, max));
            }
        }

        errors
    }

    /// Full pre-persist validation pipeline.
    ///
    /// `context` carries the facts only storage can answer: whether the name
    /// is already used by another live account, and how many permission
    /// grants the account will hold once persisted.
    pub fn validate(&self, context: &ValidationContext) -> Result<(), AccountValidationError> {
        let mut errors = self.column_errors();

        if context.name_taken && !errors.iter().any(|e| e.field == AccountField::Name) {
            errors.push(FieldError::new(AccountField::Name, NAME_TAKEN_MESSAGE));
        }
        if self.access == Access::Shared && context.grant_count == 0 {
            errors.push(FieldError::new(
                AccountField::Access,
                SHARED_WITHOUT_USERS_MESSAGE,
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AccountValidationError { errors })
        }
    }
}

/// Incoming account request: either an `id` to look up or new attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AccountId>,
    #[serde(flatten)]
    pub attributes: AccountAttributes,
}

impl AccountParams {
    /// Request that selects an existing account.
    pub fn existing(id: AccountId) -> Self {
        Self {
            id: Some(id),
            attributes: AccountAttributes::default(),
        }
    }

    /// Request that creates a new account.
    pub fn new_account(attributes: AccountAttributes) -> Self {
        Self {
            id: None,
            attributes,
        }
    }
}

/// Account not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub uuid: Uuid,
    pub attributes: AccountAttributes,
}

impl NewAccount {
    /// Creates an insertable account with a fresh stable uuid.
    pub fn new(attributes: AccountAttributes) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            attributes,
        }
    }
}

/// Persisted account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub uuid: Uuid,
    #[serde(flatten)]
    pub attributes: AccountAttributes,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
    /// Soft-delete tombstone, epoch milliseconds.
    pub deleted_at: Option<i64>,
}

impl Account {
    /// Reference used by permissions, tasks and comments.
    pub fn asset(&self) -> AssetRef {
        AssetRef::new(AssetKind::Account, self.id)
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// City/region line for list displays.
    pub fn location(&self) -> String {
        location_from_billing_address(self.attributes.billing_address.as_deref())
    }
}

impl PermissionSource for Account {
    fn asset(&self) -> AssetRef {
        Account::asset(self)
    }

    fn access(&self) -> Access {
        self.attributes.access
    }
}

/// Extracts the last billing address line with numeric zip codes removed.
///
/// Digit runs at the start of the line or after whitespace, and followed by
/// whitespace or the end of the line, collapse to a single space.
pub fn location_from_billing_address(address: Option<&str>) -> String {
    let last_line = address.and_then(|text| {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    });

    match last_line {
        Some(line) => ZIP_CODE_RE.replace_all(line, " ").into_owned(),
        None => String::new(),
    }
}

/// Normalizes free-text name search input.
///
/// Drops every character other than word characters, whitespace and `-`,
/// then trims the result.
pub fn escape_search_query(query: &str) -> String {
    SEARCH_NOISE_RE.replace_all(query, "").trim().to_string()
}

/// Account list ordering options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountSort {
    /// `name ASC`.
    Name,
    /// `created_at DESC`.
    #[default]
    DateCreated,
    /// `updated_at DESC`.
    DateUpdated,
}

impl AccountSort {
    /// Every option, in menu order.
    pub const ALL: [AccountSort; 3] = [Self::Name, Self::DateCreated, Self::DateUpdated];

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::DateCreated => "date created",
            Self::DateUpdated => "date updated",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.label() == label.trim())
    }
}

/// Account attribute addressed by a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountField {
    Name,
    Access,
    Website,
    TollFreePhone,
    Phone,
    Fax,
    BillingAddress,
    ShippingAddress,
}

impl AccountField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Access => "access",
            Self::Website => "website",
            Self::TollFreePhone => "toll_free_phone",
            Self::Phone => "phone",
            Self::Fax => "fax",
            Self::BillingAddress => "billing_address",
            Self::ShippingAddress => "shipping_address",
        }
    }
}

/// One field-level rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: AccountField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: AccountField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    fn too_long(field: AccountField, max: usize) -> Self {
        Self::new(field, format!("is too long (maximum is {max} characters)"))
    }
}

/// Rejected account write with every violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountValidationError {
    pub errors: Vec<FieldError>,
}

impl AccountValidationError {
    pub fn single(field: AccountField, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Duplicate-name failure, as reported by the uniqueness check.
    pub fn name_taken() -> Self {
        Self::single(AccountField::Name, NAME_TAKEN_MESSAGE)
    }

    pub fn has_error_on(&self, field: AccountField) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn messages_for(&self, field: AccountField) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid account:")?;
        for (index, error) in self.errors.iter().enumerate() {
            let sep = if index == 0 { " " } else { "; " };
            write!(f, "{sep}{} {}", error.field.as_str(), error.message)?;
        }
        Ok(())
    }
}

impl Error for AccountValidationError {}

/// Storage-derived facts consumed by [`AccountAttributes::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Another live account already uses this name.
    pub name_taken: bool,
    /// Permission grants the account will hold after persisting.
    pub grant_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_strips_trailing_zip_from_last_line() {
        assert_eq!(
            location_from_billing_address(Some("123 Main St\nSpringfield 62704")),
            "Springfield "
        );
    }

    #[test]
    fn location_of_missing_or_blank_address_is_empty() {
        assert_eq!(location_from_billing_address(None), "");
        assert_eq!(location_from_billing_address(Some("")), "");
        assert_eq!(location_from_billing_address(Some(" \n \n")), "");
    }

    #[test]
    fn location_strips_leading_digits_on_single_line() {
        assert_eq!(location_from_billing_address(Some("99 Oak Ave")), " Oak Ave");
    }

    #[test]
    fn location_skips_trailing_blank_lines_and_keeps_embedded_digits() {
        let address = "1 Infinite Loop\r\nCupertino CA 95014\n\n";
        assert_eq!(location_from_billing_address(Some(address)), "Cupertino CA ");
        assert_eq!(
            location_from_billing_address(Some("Route66 Diner")),
            "Route66 Diner"
        );
    }

    #[test]
    fn escape_search_query_drops_punctuation() {
        assert_eq!(escape_search_query("  Acme, Inc. (west)  "), "Acme Inc west");
        assert_eq!(escape_search_query("co-op"), "co-op");
        assert_eq!(escape_search_query("%%"), "");
    }

    #[test]
    fn validate_reports_blank_name() {
        let err = AccountAttributes::named("   ")
            .validate(&ValidationContext::default())
            .unwrap_err();
        assert_eq!(err.messages_for(AccountField::Name), vec![NAME_BLANK_MESSAGE]);
    }

    #[test]
    fn validate_reports_overlong_name_once_even_when_taken() {
        let attrs = AccountAttributes::named("x".repeat(NAME_MAX_CHARS + 1));
        let context = ValidationContext {
            name_taken: true,
            grant_count: 0,
        };
        let err = attrs.validate(&context).unwrap_err();
        assert_eq!(
            err.messages_for(AccountField::Name),
            vec!["is too long (maximum is 64 characters)"]
        );
    }

    #[test]
    fn validate_requires_grants_for_shared_access() {
        let mut attrs = AccountAttributes::named("Acme");
        attrs.access = Access::Shared;

        let err = attrs.validate(&ValidationContext::default()).unwrap_err();
        assert!(err.has_error_on(AccountField::Access));
        assert!(!err.has_error_on(AccountField::Name));

        let shared_with_one = ValidationContext {
            name_taken: false,
            grant_count: 1,
        };
        assert!(attrs.validate(&shared_with_one).is_ok());
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut attrs = AccountAttributes::named("");
        attrs.access = Access::Shared;
        attrs.phone = Some("5".repeat(40));

        let err = attrs.validate(&ValidationContext::default()).unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.to_string().starts_with("invalid account: name "));
    }

    #[test]
    fn sort_labels_roundtrip() {
        for sort in AccountSort::ALL {
            assert_eq!(AccountSort::from_label(sort.label()), Some(sort));
        }
        assert_eq!(AccountSort::from_label("popularity"), None);
        assert_eq!(AccountSort::default(), AccountSort::DateCreated);
    }
}
