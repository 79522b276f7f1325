//! Login and logout commands.

use anyhow::{Result, bail};

use sqlsight::auth::AuthContext;
use sqlsight::client::InsightClient;

pub async fn run(config_path: &str, server: Option<&str>, username: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let base_url = super::base_url(&config, server);

    let username = match username {
        Some(name) => name.to_string(),
        None => super::prompt("Username: ").await?,
    };
    if username.is_empty() {
        bail!("username must not be empty");
    }
    let password = super::prompt("Password: ").await?;

    let auth = InsightClient::login(base_url, &username, &password).await?;
    auth.save(&AuthContext::default_path())?;

    println!(
        "Logged in as {} ({})",
        auth.user.username,
        auth.role().unwrap_or("no role")
    );
    Ok(())
}

pub async fn logout(config_path: &str, server: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let path = AuthContext::default_path();

    if let Some(auth) = AuthContext::load(&path)? {
        let client = InsightClient::new(super::base_url(&config, server), auth);
        // Best effort: the local credentials are discarded either way.
        if let Err(e) = client.logout().await {
            tracing::warn!(error = %e, "server-side logout failed");
        }
    }

    AuthContext::clear(&path)?;
    println!("Logged out.");
    Ok(())
}
