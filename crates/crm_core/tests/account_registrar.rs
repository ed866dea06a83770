use crm_core::db::open_db_in_memory;
use crm_core::{
    Access, AccountAttributes, AccountField, AccountParams, AccountRegistrar, LeadRepository,
    PermissionSource, PermissionStore, RegistrarError, RepoError, SqliteAccountRepository,
    SqliteLeadRepository, SqlitePermissionStore, SqliteUserRepository, UserId, UserRepository,
};
use rusqlite::Connection;

type Registrar<'conn> =
    AccountRegistrar<SqliteAccountRepository<'conn>, SqlitePermissionStore<'conn>>;

fn registrar(conn: &Connection) -> Registrar<'_> {
    AccountRegistrar::new(
        SqliteAccountRepository::try_new(conn).unwrap(),
        SqlitePermissionStore::try_new(conn).unwrap(),
    )
}

fn create_users(conn: &Connection, names: &[&str]) -> Vec<UserId> {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    names
        .iter()
        .map(|name| repo.create_user(name, None).unwrap().id)
        .collect()
}

fn new_params(name: &str, access: Access) -> AccountParams {
    let mut attributes = AccountAttributes::named(name);
    attributes.access = access;
    AccountParams::new_account(attributes)
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn grants(conn: &Connection, account: &crm_core::Account) -> Vec<UserId> {
    SqlitePermissionStore::try_new(conn)
        .unwrap()
        .grants_for(account.asset())
        .unwrap()
}

#[test]
fn lookup_returns_existing_account_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann", "bob"]);
    let registrar = registrar(&conn);

    let existing = registrar
        .resolve(&new_params("Acme", Access::Private), None, &users[..1])
        .unwrap();
    let accounts_before = count(&conn, "accounts");
    let grants_before = count(&conn, "permissions");

    let mut request = new_params("Renamed Acme", Access::Shared);
    request.id = Some(existing.id);
    let resolved = registrar.resolve(&request, None, &users).unwrap();

    assert_eq!(resolved, existing);
    assert_eq!(count(&conn, "accounts"), accounts_before);
    assert_eq!(count(&conn, "permissions"), grants_before);
    assert_eq!(grants(&conn, &resolved), vec![users[0]]);
}

#[test]
fn lookup_of_unknown_or_soft_deleted_id_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    let err = registrar
        .resolve(&AccountParams::existing(4242), None, &[])
        .unwrap_err();
    assert!(matches!(err, RegistrarError::NotFound(4242)));

    let account = registrar
        .resolve(&new_params("Gone Inc", Access::Public), None, &[])
        .unwrap();
    conn.execute(
        "UPDATE accounts SET deleted_at = 1 WHERE id = ?1;",
        [account.id],
    )
    .unwrap();

    let err = registrar
        .resolve(&AccountParams::existing(account.id), None, &[])
        .unwrap_err();
    assert!(matches!(err, RegistrarError::NotFound(id) if id == account.id));
}

#[test]
fn new_account_gets_uuid_defaults_and_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    let account = registrar
        .resolve(
            &AccountParams::new_account(AccountAttributes::named("Defaults Ltd")),
            None,
            &[],
        )
        .unwrap();

    assert!(!account.uuid.is_nil());
    assert_eq!(account.attributes.access, Access::Private);
    assert!(account.is_active());
    assert!(account.created_at > 0);
    assert!(grants(&conn, &account).is_empty());
}

#[test]
fn shared_access_without_users_fails_on_access_field() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    let err = registrar
        .resolve(&new_params("Lonely Shared", Access::Shared), None, &[])
        .unwrap_err();

    match err {
        RegistrarError::Validation(validation) => {
            assert!(validation.has_error_on(AccountField::Access));
            assert_eq!(
                validation.messages_for(AccountField::Access),
                vec!["Please specify users to share the account with."]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "accounts"), 0);
}

#[test]
fn non_lead_access_grants_exactly_the_user_list() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann", "bob", "cy", "dee"]);
    let leads = SqliteLeadRepository::try_new(&conn).unwrap();
    let lead = leads
        .create_lead(Some(users[0]), "Prospect", Access::Shared)
        .unwrap();
    SqlitePermissionStore::try_new(&conn)
        .unwrap()
        .grant(lead.asset(), users[3])
        .unwrap();
    let registrar = registrar(&conn);

    for (index, access) in [Access::Private, Access::Public, Access::Shared]
        .into_iter()
        .enumerate()
    {
        let name = format!("Account {index}");
        let account = registrar
            .resolve(
                &new_params(&name, access),
                Some(&lead),
                &[users[2], users[1], users[2]],
            )
            .unwrap();

        assert_eq!(account.attributes.access, access);
        assert_eq!(grants(&conn, &account), vec![users[1], users[2]]);
    }
}

#[test]
fn lead_access_with_candidate_copies_candidate_grants() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann", "bob", "cy"]);
    let lead = SqliteLeadRepository::try_new(&conn)
        .unwrap()
        .create_lead(Some(users[0]), "Converted Co", Access::Shared)
        .unwrap();
    let store = SqlitePermissionStore::try_new(&conn).unwrap();
    store.grant(lead.asset(), users[0]).unwrap();
    store.grant(lead.asset(), users[1]).unwrap();
    let registrar = registrar(&conn);

    let account = registrar
        .resolve(
            &new_params("Converted Co", Access::Lead),
            Some(&lead),
            &[users[2]],
        )
        .unwrap();

    assert_eq!(account.attributes.access, lead.access());
    assert_eq!(grants(&conn, &account), vec![users[0], users[1]]);
    assert_eq!(store.grants_for(lead.asset()).unwrap(), vec![users[0], users[1]]);
}

#[test]
fn lead_access_copying_shared_candidate_without_grants_fails() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann"]);
    let lead = SqliteLeadRepository::try_new(&conn)
        .unwrap()
        .create_lead(None, "Unshared", Access::Shared)
        .unwrap();
    let registrar = registrar(&conn);

    let err = registrar
        .resolve(&new_params("Unshared", Access::Lead), Some(&lead), &users)
        .unwrap_err();
    assert!(
        matches!(err, RegistrarError::Validation(ref v) if v.has_error_on(AccountField::Access))
    );
    assert_eq!(count(&conn, "accounts"), 0);
}

#[test]
fn lead_access_without_candidate_uses_user_list() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann", "bob"]);
    let registrar = registrar(&conn);

    let account = registrar
        .resolve(&new_params("Walk-in", Access::Lead), None, &[users[1]])
        .unwrap();

    assert_eq!(account.attributes.access, Access::Lead);
    assert_eq!(grants(&conn, &account), vec![users[1]]);
}

#[test]
fn duplicate_live_name_fails_until_original_is_soft_deleted() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    let original = registrar
        .resolve(&new_params("Acme", Access::Public), None, &[])
        .unwrap();

    let err = registrar
        .resolve(&new_params("Acme", Access::Public), None, &[])
        .unwrap_err();
    match err {
        RegistrarError::Validation(validation) => {
            assert_eq!(
                validation.messages_for(AccountField::Name),
                vec!["has already been taken"]
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    conn.execute(
        "UPDATE accounts SET deleted_at = 1 WHERE id = ?1;",
        [original.id],
    )
    .unwrap();
    let replacement = registrar
        .resolve(&new_params("Acme", Access::Public), None, &[])
        .unwrap();
    assert_ne!(replacement.id, original.id);
}

#[test]
fn name_uniqueness_is_case_sensitive() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    registrar
        .resolve(&new_params("Acme", Access::Private), None, &[])
        .unwrap();
    registrar
        .resolve(&new_params("acme", Access::Private), None, &[])
        .unwrap();

    assert_eq!(count(&conn, "accounts"), 2);
}

#[test]
fn storage_level_duplicate_is_reported_as_name_validation() {
    let err = RegistrarError::from(RepoError::DuplicateName);
    assert!(
        matches!(err, RegistrarError::Validation(ref v) if v.has_error_on(AccountField::Name))
    );
}

#[test]
fn blank_and_overlong_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let registrar = registrar(&conn);

    let err = registrar
        .resolve(&new_params("   ", Access::Private), None, &[])
        .unwrap_err();
    assert!(matches!(err, RegistrarError::Validation(ref v)
        if v.messages_for(AccountField::Name) == vec!["Please specify account name."]));

    let err = registrar
        .resolve(&new_params(&"n".repeat(65), Access::Private), None, &[])
        .unwrap_err();
    assert!(
        matches!(err, RegistrarError::Validation(ref v) if v.has_error_on(AccountField::Name))
    );
    assert_eq!(count(&conn, "accounts"), 0);
}

#[test]
fn grant_failure_rolls_back_the_account() {
    let conn = open_db_in_memory().unwrap();
    let users = create_users(&conn, &["ann"]);
    let registrar = registrar(&conn);

    let err = registrar
        .resolve(
            &new_params("Half Written", Access::Shared),
            None,
            &[users[0], 9_999],
        )
        .unwrap_err();

    assert!(matches!(err, RegistrarError::PermissionGrant(_)));
    assert_eq!(count(&conn, "accounts"), 0);
    assert_eq!(count(&conn, "permissions"), 0);

    let account = registrar
        .resolve(&new_params("Half Written", Access::Shared), None, &users)
        .unwrap();
    assert_eq!(grants(&conn, &account), users);
}
