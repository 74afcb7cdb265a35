use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{
    AccountStatus, Content, ContentBackup, ContentFields, Role, User, UserId,
};

pub mod migrator;
pub mod repositories;

pub use repositories::content::{ContentMutation, MutationOutcome};

/// Outcome of making sure at least one administrator exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Users already exist; nothing was created.
    Skipped,
    Created {
        username: String,
        /// Set when no password was configured and one was generated.
        generated_password: Option<String>,
    },
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    /// Held across every content write. `SQLite` fails a deferred transaction
    /// that loses the lock upgrade with `SQLITE_BUSY`, so writers queue here
    /// and a stale one sees a version conflict instead.
    content_writes: Arc<Mutex<()>>,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self {
            conn,
            content_writes: Arc::new(Mutex::new(())),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn content_repo(&self) -> repositories::content::ContentRepository {
        repositories::content::ContentRepository::new(self.conn.clone())
    }

    fn backup_repo(&self) -> repositories::backup::BackupRepository {
        repositories::backup::BackupRepository::new(self.conn.clone())
    }

    // ========== Content ==========

    pub async fn get_active_content(&self) -> Result<Option<Content>> {
        self.content_repo().get_active().await
    }

    pub async fn count_active_content(&self) -> Result<u64> {
        self.content_repo().count_active().await
    }

    pub async fn create_content_if_missing(
        &self,
        fields: &ContentFields,
        actor: Option<UserId>,
    ) -> Result<Option<Content>> {
        let _guard = self.content_writes.lock().await;
        self.content_repo().create_if_missing(fields, actor).await
    }

    pub async fn mutate_active_content(
        &self,
        mutation: ContentMutation,
        actor: Option<UserId>,
        expected_version: Option<i32>,
    ) -> Result<MutationOutcome> {
        let _guard = self.content_writes.lock().await;
        self.content_repo()
            .mutate_active(mutation, actor, expected_version)
            .await
    }

    // ========== Backups ==========

    pub async fn get_backup(&self, id: i32) -> Result<Option<ContentBackup>> {
        self.backup_repo().get(id).await
    }

    pub async fn list_backups_for_content(
        &self,
        content_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ContentBackup>> {
        self.backup_repo()
            .list_for_content(content_id, limit, offset)
            .await
    }

    pub async fn count_backups_for_content(&self, content_id: i32) -> Result<u64> {
        self.backup_repo().count_for_content(content_id).await
    }

    pub async fn purge_backups_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.backup_repo().purge_older_than(cutoff).await
    }

    // ========== Users ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn set_user_status(&self, username: &str, status: AccountStatus) -> Result<bool> {
        self.user_repo().set_status(username, status).await
    }

    /// Creates the configured administrator when the users table is empty.
    pub async fn ensure_bootstrap_admin(&self, config: &Config) -> Result<BootstrapOutcome> {
        let repo = self.user_repo();
        if repo.count().await? > 0 {
            return Ok(BootstrapOutcome::Skipped);
        }

        let username = config.auth.bootstrap_username.clone();
        let (password, generated_password) = match &config.auth.bootstrap_password {
            Some(password) => (password.clone(), None),
            None => {
                let password = repositories::user::generate_password();
                (password.clone(), Some(password))
            }
        };

        repo.create(&username, &password, Role::Admin, &config.security)
            .await?;

        if generated_password.is_some() {
            warn!(
                username = %username,
                "Created bootstrap administrator with a generated password; change it after first login"
            );
        } else {
            info!(username = %username, "Created bootstrap administrator");
        }

        Ok(BootstrapOutcome::Created {
            username,
            generated_password,
        })
    }
}
