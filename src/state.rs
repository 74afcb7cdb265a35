use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{BootstrapOutcome, Store};
use crate::services::{
    AuthService, BackupRetention, ContactService, ContentService, FixedWindowRateLimiter,
    HttpMailer, MailTransport, RateLimiter, SeaOrmAuthService, SeaOrmContentService,
    UploadService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub content_service: Arc<dyn ContentService>,

    pub upload_service: Arc<UploadService>,

    pub contact_service: Arc<ContactService>,

    pub retention: BackupRetention,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let transport = match config.contact.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                Some(Arc::new(HttpMailer::new(&config.contact, key)?) as Arc<dyn MailTransport>)
            }
            _ => {
                warn!("No mail API key configured; the contact form will report delivery errors");
                None
            }
        };
        Self::with_transport(config, transport).await
    }

    /// Builds the state with an explicit mail transport (tests pass a fake).
    pub async fn with_transport(
        config: Config,
        transport: Option<Arc<dyn MailTransport>>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        if let BootstrapOutcome::Created {
            username,
            generated_password: Some(password),
        } = store.ensure_bootstrap_admin(&config).await?
        {
            // Printed once so a fresh install is usable.
            println!("Created administrator '{username}' with password: {password}");
        }

        let content_service = Arc::new(SeaOrmContentService::new(
            store.clone(),
            config.content.clone(),
        ));
        if config.content.seed_default {
            content_service.seed_default().await?;
        }

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.auth.clone(),
            config.security.clone(),
        ));

        let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowRateLimiter::new(
            config.contact.max_messages,
            Duration::from_secs(config.contact.window_seconds),
        ));
        let contact_service = Arc::new(ContactService::new(
            config.contact.clone(),
            limiter,
            transport,
        ));

        let upload_service = Arc::new(UploadService::new(&config.uploads));
        tokio::fs::create_dir_all(upload_service.root()).await?;

        let retention = BackupRetention::new(store.clone(), config.content.backup_retention_days);

        info!("Application state initialized");

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
            content_service,
            upload_service,
            contact_service,
            retention,
        })
    }
}
