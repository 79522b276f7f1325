//! Interactive chat command.

use std::io::{Write, stdout};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sqlsight::api::SqlChatRequest;
use sqlsight::client::{ChatStreamObserver, StreamOutcome};

const ROW_PREVIEW_LIMIT: usize = 10;

/// Renders stream events to the terminal and captures the session id the
/// server answered under.
struct TerminalObserver {
    session_id: Mutex<Option<i64>>,
}

impl ChatStreamObserver for TerminalObserver {
    fn on_stage(&self, message: &str) {
        println!("… {message}");
    }

    fn on_sql(&self, sql: &str, corrected: bool) {
        if corrected {
            println!("SQL (auto-corrected):");
        } else {
            println!("SQL:");
        }
        println!("{sql}");
    }

    fn on_data(&self, rows: &[Map<String, Value>], total: u64, session_id: i64) {
        *self.session_id.lock().unwrap() = Some(session_id);

        println!("{total} row(s)");
        for row in rows.iter().take(ROW_PREVIEW_LIMIT) {
            if let Ok(line) = serde_json::to_string(row) {
                println!("  {line}");
            }
        }
        if rows.len() > ROW_PREVIEW_LIMIT {
            println!("  … {} more", rows.len() - ROW_PREVIEW_LIMIT);
        }
    }

    fn on_summary_token(&self, token: &str) {
        print!("{token}");
        let _ = stdout().flush();
    }

    fn on_done(&self) {
        println!();
    }

    fn on_error(&self, message: &str) {
        eprintln!("\nError: {message}");
    }
}

pub async fn run(
    config_path: &str,
    server: Option<&str>,
    session: Option<i64>,
    data_source: Option<i64>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let mut session_id = session;
    println!("Ask questions in natural language (/exit to quit, Ctrl+C cancels a running answer)");
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut async_stdout = tokio::io::stdout();

    loop {
        async_stdout.write_all(b"> ").await?;
        async_stdout.flush().await?;

        let Some(input) = lines.next_line().await? else {
            println!();
            break;
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/exit" || input == "/quit" {
            break;
        }

        let mut request = SqlChatRequest::new(input);
        if let Some(id) = session_id {
            request = request.with_session(id);
        }
        if let Some(id) = data_source {
            request = request.with_data_source(id);
        }

        let observer = Arc::new(TerminalObserver {
            session_id: Mutex::new(None),
        });
        let handle = client.stream_chat(request, observer.clone());
        let cancel = handle.cancel_token();
        let mut join = Box::pin(handle.join());

        let outcome = tokio::select! {
            outcome = &mut join => outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                join.await
            }
        };

        if outcome == StreamOutcome::Cancelled {
            println!("\n[cancelled]");
        }
        println!();

        // Adopt the session the server answered under; it may have been
        // created for this question.
        if let Some(id) = *observer.session_id.lock().unwrap() {
            session_id = Some(id);
        }
    }

    if let Some(id) = session_id {
        println!("Resume this conversation with: sqlsight chat --session {id}");
    }
    Ok(())
}
