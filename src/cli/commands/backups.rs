//! Backup history and retention commands

use crate::config::Config;
use crate::db::Store;
use crate::services::{BackupRetention, ContentService, SeaOrmContentService};

pub async fn cmd_list_backups(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let service = SeaOrmContentService::new(store.clone(), config.content.clone());

    let Some(content) = service.get_active().await? else {
        println!("No active content.");
        println!();
        println!("Create it with: folio seed");
        return Ok(());
    };

    let total = store.count_backups_for_content(content.id).await?;
    let backups = service.list_for_content(content.id, limit).await?;

    println!(
        "Content v{} (updated {}), {} backup(s)",
        content.version,
        content.updated_at.format("%Y-%m-%d %H:%M"),
        total
    );
    println!("{:-<70}", "");

    for backup in backups {
        let by = backup
            .created_by
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "#{:<6} v{:<4} {}  by {}",
            backup.id,
            backup.version,
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            by
        );
    }

    Ok(())
}

pub async fn cmd_prune_backups(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let retention = BackupRetention::new(store, config.content.backup_retention_days);

    let deleted = retention.purge_expired().await?;
    println!(
        "Deleted {deleted} backup(s) older than {} days",
        config.content.backup_retention_days
    );
    Ok(())
}
