use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::services::retention::BackupRetention;

/// Runs the periodic backup retention sweep.
pub struct Scheduler {
    retention: BackupRetention,
    cron_expression: String,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(retention: BackupRetention, cron_expression: impl Into<String>) -> Self {
        Self {
            retention,
            cron_expression: cron_expression.into(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Sweeps once immediately, then on every cron tick until [`Scheduler::stop`].
    pub async fn start(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Starting background scheduler");

        run_sweep(&self.retention).await;

        let mut sched = JobScheduler::new().await?;

        let retention = self.retention.clone();
        let running = Arc::clone(&self.running);
        let job = Job::new_async(self.cron_expression.as_str(), move |_uuid, _lock| {
            let retention = retention.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_sweep(&retention).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Backup retention scheduled: {}", self.cron_expression);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }
}

async fn run_sweep(retention: &BackupRetention) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "purge_backups", "Starting backup retention sweep");

    match retention.purge_expired().await {
        Ok(deleted) => info!(
            event = "job_finished",
            job_name = "purge_backups",
            deleted,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Backup retention sweep finished"
        ),
        Err(e) => {
            error!(event = "job_failed", job_name = "purge_backups", error = %e, "Backup retention sweep failed");
        }
    }
}
