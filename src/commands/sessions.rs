//! Session management commands.

use std::sync::Arc;

use anyhow::Result;

use sqlsight::session::SessionRegistry;

pub async fn list(config_path: &str, server: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let registry = SessionRegistry::new(Arc::new(client));
    registry.refresh().await?;

    let sessions = registry.sessions().await;
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for session in sessions {
        let created = session
            .create_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>6}  {:16}  {}", session.id, created, session.title);
    }
    Ok(())
}

pub async fn delete(config_path: &str, server: Option<&str>, session_id: i64) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let registry = SessionRegistry::new(Arc::new(client));
    registry.refresh().await?;
    registry.delete(session_id).await?;

    println!("Session {session_id} deleted.");
    Ok(())
}

pub async fn rename(
    config_path: &str,
    server: Option<&str>,
    session_id: i64,
    title: &str,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    client.rename_session(session_id, title).await?;
    println!("Session {session_id} renamed.");
    Ok(())
}

pub async fn batch_delete(
    config_path: &str,
    server: Option<&str>,
    session_ids: &[i64],
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    client.batch_delete_sessions(session_ids).await?;
    println!("{} session(s) deleted.", session_ids.len());
    Ok(())
}

pub async fn rerun(config_path: &str, server: Option<&str>, record_id: i64) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let rows = client.rerun_record(record_id).await?;
    println!("{} row(s)", rows.len());
    for row in rows {
        if let Ok(line) = serde_json::to_string(&row) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub async fn history(config_path: &str, server: Option<&str>, session_id: i64) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let records = client.session_records(session_id).await?;
    if records.is_empty() {
        println!("No history for session {session_id}.");
        return Ok(());
    }

    for record in records {
        println!("Q: {}", record.question);
        println!("SQL: {}", record.sql_text);
        if record.corrected {
            println!("  (auto-corrected)");
        }
        if !record.summary.is_empty() {
            println!("A: {}", record.summary);
        }
        match record.result_data {
            Some(rows) => println!("  {} row(s) cached", rows.len()),
            None if record.result_expired => println!(
                "  result expired; rerun with: sqlsight sessions rerun {}",
                record.id
            ),
            None => {}
        }
        println!();
    }
    Ok(())
}
