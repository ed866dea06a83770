//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured account store and print a one-page summary.
//! - Keep output deterministic for quick local sanity checks.

use crm_core::db::open_db;
use crm_core::{
    init_logging, AccountService, AccountSort, CrmConfig, SqliteAccountRepository,
    SqlitePermissionStore,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("crm_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CrmConfig::from_env()?;

    if let Some(dir) = &config.logging.dir {
        init_logging(&config.logging.level, &dir.to_string_lossy())?;
    }

    let conn = open_db(&config.database.path)?;
    let service = AccountService::new(
        SqliteAccountRepository::try_new(&conn)?,
        SqlitePermissionStore::try_new(&conn)?,
    )
    .with_per_page(config.accounts.per_page);

    let page = service.list_page(None, AccountSort::default(), None, 1)?;
    info!(
        "event=cli_probe module=cli status=ok accounts={} per_page={}",
        page.items.len(),
        page.per_page
    );

    println!("crm_core version={}", crm_core::core_version());
    println!("database={}", config.database.path.display());
    println!(
        "accounts page={} per_page={} sort=\"{}\"",
        page.page,
        page.per_page,
        AccountSort::default().label()
    );
    for account in &page.items {
        println!(
            "{}\t{}\t{}\t{}",
            account.id,
            account.attributes.name,
            account.attributes.access.as_str(),
            account.location()
        );
    }
    Ok(())
}
