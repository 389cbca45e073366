use anyhow::Result;
use std::fs;

use crate::core::AppConfig;
use crate::core::db::Database;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing db...");
    fs::create_dir_all(&config.storage_path)
        .unwrap_or_else(|err| println!("Ignoring storage directory create failed: {}", err));

    Database::new(&config.db_path).initialize().await?;
    println!("Finished initializing db at {}", config.db_path);

    Ok(())
}
