mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Types
// ============================================================================

/// Terminal client for the sql-insight conversational SQL assistant
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "sqlsight.yaml", global = true)]
    config: String,

    /// Backend base URL (overrides config file)
    #[arg(short, long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store credentials
    Login {
        /// Username (prompted for when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Invalidate the token and discard stored credentials
    Logout,

    /// Ask questions interactively
    Chat {
        /// Continue an existing session
        #[arg(long)]
        session: Option<i64>,

        /// Data source to query (required by the server for new sessions)
        #[arg(long)]
        data_source: Option<i64>,
    },

    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List data sources available to you
    Datasources,
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// List sessions
    List,

    /// Delete a session
    Delete {
        session_id: i64,
    },

    /// Rename a session
    Rename {
        session_id: i64,
        title: String,
    },

    /// Delete several sessions at once
    BatchDelete {
        session_ids: Vec<i64>,
    },

    /// Show the question/answer history of a session
    History {
        session_id: i64,
    },

    /// Re-execute the SQL of a history record whose cached result expired
    Rerun {
        record_id: i64,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_str();
    let server = cli.server.as_deref();

    match cli.command {
        Commands::Login { username } => {
            commands::login::run(config, server, username.as_deref()).await
        }
        Commands::Logout => commands::login::logout(config, server).await,
        Commands::Chat {
            session,
            data_source,
        } => commands::chat::run(config, server, session, data_source).await,
        Commands::Sessions { action } => match action {
            SessionAction::List => commands::sessions::list(config, server).await,
            SessionAction::Delete { session_id } => {
                commands::sessions::delete(config, server, session_id).await
            }
            SessionAction::Rename { session_id, title } => {
                commands::sessions::rename(config, server, session_id, &title).await
            }
            SessionAction::BatchDelete { session_ids } => {
                commands::sessions::batch_delete(config, server, &session_ids).await
            }
            SessionAction::History { session_id } => {
                commands::sessions::history(config, server, session_id).await
            }
            SessionAction::Rerun { record_id } => {
                commands::sessions::rerun(config, server, record_id).await
            }
        },
        Commands::Datasources => commands::datasources::list(config, server).await,
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
