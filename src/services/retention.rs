use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::db::Store;

/// Enforces the backup retention window.
#[derive(Clone)]
pub struct BackupRetention {
    store: Store,
    retention_days: u32,
}

impl BackupRetention {
    #[must_use]
    pub const fn new(store: Store, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.retention_days))
    }

    /// Deletes backups older than the window measured from `now`.
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = self.cutoff(now);
        let deleted = self.store.purge_backups_older_than(cutoff).await?;

        if deleted > 0 {
            info!(
                event = "backups.purged",
                deleted,
                retention_days = self.retention_days,
                "Purged expired content backups"
            );
            metrics::counter!("content_backups_purged_total").increment(deleted);
        }
        Ok(deleted)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.purge_expired_at(Utc::now()).await
    }
}
