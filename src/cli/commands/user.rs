//! Account administration command handlers

use anyhow::Context;

use crate::config::Config;
use crate::domain::{AccountId, AccountRecord, NewAccount, Password, Role};
use crate::state::SharedState;

async fn open(config: &Config) -> anyhow::Result<SharedState> {
    SharedState::new(config.clone()).await
}

async fn find(state: &SharedState, username: &str) -> anyhow::Result<AccountRecord> {
    state
        .accounts
        .find_by_username(username)
        .await?
        .with_context(|| format!("No account named '{username}'"))
}

fn read_password(given: Option<String>) -> anyhow::Result<Password> {
    if let Some(password) = given {
        return Ok(Password::new(password));
    }

    println!("Enter password:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(Password::new(input.trim_end_matches(['\r', '\n'])))
}

fn print_account(account: &AccountRecord) {
    let status = if !account.is_active() {
        " [INACTIVE]"
    } else if account.first_login() {
        " [PASSWORD CHANGE PENDING]"
    } else {
        ""
    };

    println!(
        "{:>4}  {:<20} {:<9} {}{}",
        account.id(),
        account.username(),
        account.role(),
        account.full_name(),
        status
    );
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_user_create(
    config: &Config,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    role: &str,
    manager: Option<i32>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let role: Role = role.parse()?;
    let password = read_password(password)?;
    let state = open(config).await?;

    let account = state
        .accounts
        .create(NewAccount {
            username,
            email,
            first_name,
            last_name,
            mobile_no: None,
            address: None,
            role,
            password,
            manager_id: manager.map(AccountId::new),
        })
        .await?;

    println!(
        "✓ Created {} (ID: {}) as {}",
        account.username(),
        account.id(),
        account.role()
    );
    println!("  The password must be changed at first login.");
    Ok(())
}

pub async fn cmd_user_list(config: &Config) -> anyhow::Result<()> {
    let state = open(config).await?;
    let accounts = state.accounts.list().await?;

    if accounts.is_empty() {
        println!("No accounts yet.");
        println!();
        println!("Create one with: rms-directory user create <username> <email> ...");
        return Ok(());
    }

    println!("Accounts ({} total)", accounts.len());
    println!("{:-<70}", "");
    for account in &accounts {
        print_account(account);
    }

    Ok(())
}

pub async fn cmd_user_reset_password(
    config: &Config,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let state = open(config).await?;
    let account = find(&state, username).await?;
    let password = read_password(password)?;

    state.accounts.reset_password(account.id(), password).await?;

    println!("✓ Password reset for {}", account.username());
    println!("  A new password must be chosen at next login.");
    Ok(())
}

pub async fn cmd_user_deactivate(config: &Config, username: &str) -> anyhow::Result<()> {
    let state = open(config).await?;
    let account = find(&state, username).await?;

    if !account.is_active() {
        println!("{} is already inactive.", account.username());
        return Ok(());
    }

    println!(
        "Deactivate '{}' (ID: {})?",
        account.username(),
        account.id()
    );
    println!("Enter 'y' to confirm, anything else to cancel:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim().eq_ignore_ascii_case("y") {
        state.accounts.deactivate(account.id()).await?;
        println!("✓ Deactivated: {}", account.username());
    } else {
        println!("Cancelled.");
    }

    Ok(())
}

pub async fn cmd_user_tree(config: &Config, username: &str) -> anyhow::Result<()> {
    let state = open(config).await?;
    let account = find(&state, username).await?;
    let graph = state.store.accounts().manager_edges().await?;

    println!("{} ({})", account.full_name(), account.role());
    println!("{:-<70}", "");

    let chain = graph.chain_of(account.id());
    if chain.is_empty() {
        println!("Reports to: nobody");
    } else {
        for (depth, manager_id) in chain.into_iter().enumerate() {
            let manager = state.accounts.get(manager_id).await?;
            println!(
                "{}↑ {} ({})",
                "  ".repeat(depth),
                manager.username(),
                manager.role()
            );
        }
    }

    let reports = state.accounts.reports_of(account.id()).await?;
    println!();
    println!("Direct reports ({}):", reports.len());
    for report in &reports {
        print_account(report);
    }

    Ok(())
}
