//! Account management commands

use crate::config::Config;
use crate::db::Store;
use crate::db::repositories::user::generate_password;
use crate::domain::{AccountStatus, Role};

pub async fn cmd_create_user(
    config: &Config,
    username: &str,
    role: &str,
    password: Option<&str>,
) -> anyhow::Result<()> {
    let role: Role = role.parse()?;
    let username = username.trim();
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }

    let store = Store::new(&config.general.database_path).await?;
    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("User '{username}' already exists");
    }

    let (password, generated) = match password {
        Some(p) => (p.to_string(), false),
        None => (generate_password(), true),
    };
    if password.chars().count() < config.security.min_password_length {
        anyhow::bail!(
            "Password must be at least {} characters",
            config.security.min_password_length
        );
    }

    let user = store
        .user_repo()
        .create(username, &password, role, &config.security)
        .await?;

    println!("Created {} '{}' (id {})", user.role, user.username, user.id);
    if generated {
        println!("Password: {password}");
    }
    Ok(())
}

pub async fn cmd_set_status(config: &Config, username: &str, status: &str) -> anyhow::Result<()> {
    let status: AccountStatus = status.parse()?;
    let store = Store::new(&config.general.database_path).await?;

    if store.set_user_status(username, status).await? {
        println!("User '{username}' is now {status}");
    } else {
        println!("No user named '{username}'");
    }
    Ok(())
}
