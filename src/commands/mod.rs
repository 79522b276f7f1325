//! CLI command implementations.

pub mod chat;
pub mod datasources;
pub mod login;
pub mod sessions;

use anyhow::{Context, Result};

use sqlsight::auth::AuthContext;
use sqlsight::client::InsightClient;
use sqlsight::config::Config;

/// Load configuration, falling back to defaults when the file is absent.
pub fn load_config(path: &str) -> Result<Config> {
    Config::load(path).with_context(|| format!("loading config from {path}"))
}

/// Resolve the backend base URL from the CLI override or the config file.
pub fn base_url<'a>(config: &'a Config, server_override: Option<&'a str>) -> &'a str {
    server_override.unwrap_or(&config.server.base_url)
}

/// Build a client from stored credentials.
pub fn authed_client(config: &Config, server_override: Option<&str>) -> Result<InsightClient> {
    let auth = AuthContext::load(&AuthContext::default_path())?
        .context("not logged in; run `sqlsight login` first")?;
    Ok(InsightClient::new(base_url(config, server_override), auth))
}

/// Print a prompt and read one trimmed line from stdin.
pub async fn prompt(label: &str) -> Result<String> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    Ok(line.trim().to_string())
}
