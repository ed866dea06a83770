use crm_core::{
    location_from_billing_address, Access, Account, AccountAttributes, AccountField,
    AccountParams, AccountValidationError, FieldError, PermissionSource,
};
use serde_json::json;
use uuid::Uuid;

fn stored_account(billing_address: Option<&str>) -> Account {
    let mut attributes = AccountAttributes::named("Acme");
    attributes.access = Access::Shared;
    attributes.billing_address = billing_address.map(str::to_string);
    Account {
        id: 3,
        uuid: Uuid::nil(),
        attributes,
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
        deleted_at: None,
    }
}

#[test]
fn request_without_id_carries_flat_attributes() {
    let params: AccountParams = serde_json::from_value(json!({
        "name": "Acme",
        "access": "Shared",
        "website": "https://acme.example"
    }))
    .unwrap();

    assert_eq!(params.id, None);
    assert_eq!(params.attributes.name, "Acme");
    assert_eq!(params.attributes.access, Access::Shared);
    assert_eq!(
        params.attributes.website.as_deref(),
        Some("https://acme.example")
    );
    assert_eq!(params.attributes.phone, None);
}

#[test]
fn request_with_id_selects_existing_account() {
    let params: AccountParams = serde_json::from_value(json!({ "id": 7 })).unwrap();

    assert_eq!(params, AccountParams::existing(7));
    assert_eq!(params.attributes.access, Access::Private);
}

#[test]
fn stored_account_serializes_attributes_inline() {
    let value = serde_json::to_value(stored_account(None)).unwrap();

    assert_eq!(value["id"], 3);
    assert_eq!(value["uuid"], Uuid::nil().to_string());
    assert_eq!(value["name"], "Acme");
    assert_eq!(value["access"], "Shared");
    assert!(value["deleted_at"].is_null());
    assert!(value.get("attributes").is_none());
}

#[test]
fn account_exposes_location_and_permission_source() {
    let account = stored_account(Some("500 Oracle Pkwy\nRedwood City CA 94065"));

    assert_eq!(account.location(), "Redwood City CA ");
    assert_eq!(
        account.location(),
        location_from_billing_address(account.attributes.billing_address.as_deref())
    );
    assert_eq!(PermissionSource::access(&account), Access::Shared);
    assert_eq!(PermissionSource::asset(&account), account.asset());
    assert_eq!(stored_account(None).location(), "");
}

#[test]
fn validation_error_lists_every_field_message() {
    let err = AccountValidationError {
        errors: vec![
            FieldError::new(AccountField::Name, "Please specify account name."),
            FieldError::new(
                AccountField::Access,
                "Please specify users to share the account with.",
            ),
        ],
    };

    assert_eq!(
        err.to_string(),
        "invalid account: name Please specify account name.; access Please specify users to share the account with."
    );
    assert_eq!(
        AccountValidationError::name_taken().messages_for(AccountField::Name),
        vec!["has already been taken"]
    );
}
