use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub auth: AuthConfig,

    pub content: ContentConfig,

    pub uploads: UploadConfig,

    pub contact: ContactConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/folio.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored for rate-limiting identity and
    /// the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,

    /// Include internal error detail in 500 responses. Development only.
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            trusted_proxy_ips: Vec::new(),
            expose_error_details: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access tokens. Overridden by `FOLIO_ACCESS_TOKEN_SECRET`.
    #[serde(skip_serializing)]
    pub access_token_secret: String,

    /// HMAC secret for refresh tokens. Must differ from the access secret.
    /// Overridden by `FOLIO_REFRESH_TOKEN_SECRET`.
    #[serde(skip_serializing)]
    pub refresh_token_secret: String,

    pub access_token_ttl_seconds: u64,

    pub refresh_token_ttl_seconds: u64,

    pub issuer: String,

    pub audience: String,

    /// Newest refresh tokens kept per user; older ones are dropped on login.
    pub max_refresh_tokens: usize,

    pub bootstrap_username: String,

    /// Password for the bootstrap admin created when no user exists.
    /// Overridden by `FOLIO_ADMIN_PASSWORD`.
    #[serde(skip_serializing)]
    pub bootstrap_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_token_ttl_seconds: 24 * 60 * 60,
            refresh_token_ttl_seconds: 7 * 24 * 60 * 60,
            issuer: "folio-api".to_string(),
            audience: "folio-admin".to_string(),
            max_refresh_tokens: 10,
            bootstrap_username: "admin".to_string(),
            bootstrap_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub backup_retention_days: u32,

    /// Six-field cron expression for the retention sweep (default: daily 03:00).
    pub retention_cron: String,

    pub default_backup_page_size: u64,

    pub max_backup_page_size: u64,

    /// Create the default content record on startup when none exists.
    pub seed_default: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backup_retention_days: 90,
            retention_cron: "0 0 3 * * *".to_string(),
            default_backup_page_size: 20,
            max_backup_page_size: 100,
            seed_default: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub directory: String,

    /// URL prefix the upload directory is served under.
    pub public_prefix: String,

    pub max_image_bytes: usize,

    pub max_cv_bytes: usize,

    /// Fixed name the CV is stored under; re-uploads overwrite it.
    pub cv_file_name: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: "uploads".to_string(),
            public_prefix: "/uploads".to_string(),
            max_image_bytes: 5 * 1024 * 1024,
            max_cv_bytes: 10 * 1024 * 1024,
            cv_file_name: "cv.pdf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub max_messages: u32,

    pub window_seconds: u64,

    /// Transactional mail API endpoint (Resend-compatible JSON API).
    pub provider_url: String,

    /// Overridden by `FOLIO_MAIL_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub from_address: String,

    pub to_address: String,

    pub subject_prefix: String,

    pub request_timeout_seconds: u64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_messages: 3,
            window_seconds: 10 * 60,
            provider_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from_address: "Portfolio <noreply@example.com>".to_string(),
            to_address: "owner@example.com".to_string(),
            subject_prefix: "[Portfolio]".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

const MIN_SECRET_LEN: usize = 32;

impl Config {
    pub fn load() -> Result<Self> {
        // A missing .env is the normal case outside development.
        let _ = dotenvy::dotenv();

        let paths = Self::config_paths();

        let mut config = match paths.iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                Self::load_from_path(path)?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FOLIO_DATABASE_URL") {
            self.general.database_path = v;
        }
        if let Ok(v) = std::env::var("FOLIO_ACCESS_TOKEN_SECRET") {
            self.auth.access_token_secret = v;
        }
        if let Ok(v) = std::env::var("FOLIO_REFRESH_TOKEN_SECRET") {
            self.auth.refresh_token_secret = v;
        }
        if let Ok(v) = std::env::var("FOLIO_ADMIN_PASSWORD") {
            self.auth.bootstrap_password = Some(v);
        }
        if let Ok(v) = std::env::var("FOLIO_MAIL_API_KEY") {
            self.contact.api_key = Some(v);
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("folio").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".folio").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;

        if auth.access_token_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "Access token secret must be at least {MIN_SECRET_LEN} bytes (set FOLIO_ACCESS_TOKEN_SECRET)"
            );
        }
        if auth.refresh_token_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "Refresh token secret must be at least {MIN_SECRET_LEN} bytes (set FOLIO_REFRESH_TOKEN_SECRET)"
            );
        }
        if auth.access_token_secret == auth.refresh_token_secret {
            anyhow::bail!("Access and refresh token secrets must differ");
        }
        if auth.access_token_ttl_seconds == 0 || auth.refresh_token_ttl_seconds == 0 {
            anyhow::bail!("Token lifetimes must be > 0");
        }
        if auth.max_refresh_tokens == 0 {
            anyhow::bail!("auth.max_refresh_tokens must be > 0");
        }

        if self.content.backup_retention_days == 0 {
            anyhow::bail!("content.backup_retention_days must be > 0");
        }
        if self.content.default_backup_page_size == 0
            || self.content.default_backup_page_size > self.content.max_backup_page_size
        {
            anyhow::bail!("content.default_backup_page_size must be in 1..=max_backup_page_size");
        }

        if self.uploads.max_image_bytes == 0 || self.uploads.max_cv_bytes == 0 {
            anyhow::bail!("Upload size limits must be > 0");
        }
        if self.uploads.cv_file_name.contains(['/', '\\']) {
            anyhow::bail!("uploads.cv_file_name must be a bare file name");
        }

        if self.contact.max_messages == 0 || self.contact.window_seconds == 0 {
            anyhow::bail!("Contact rate limit must allow at least one message per window");
        }

        Ok(())
    }
}
