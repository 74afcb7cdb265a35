use crate::config::Config;
use crate::db::Store;
use crate::services::{ContentService, SeaOrmContentService};

pub async fn cmd_seed(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let service = SeaOrmContentService::new(store, config.content.clone());

    match service.seed_default().await? {
        Some(content) => println!("Seeded default content (id {})", content.id),
        None => println!("Active content already exists; nothing to do."),
    }
    Ok(())
}
