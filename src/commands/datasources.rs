//! Data source listing command.

use anyhow::Result;

pub async fn list(config_path: &str, server: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::authed_client(&config, server)?;

    let data_sources = client.my_data_sources().await?;
    if data_sources.is_empty() {
        println!("No data sources assigned to you.");
        return Ok(());
    }

    for ds in data_sources {
        println!(
            "{:>6}  {:12}  {}  ({}:{}/{})",
            ds.id, ds.db_type, ds.conn_name, ds.host, ds.port, ds.database_name
        );
    }
    Ok(())
}
