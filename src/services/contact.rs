//! Contact form: validation, per-client rate limiting and mail delivery.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ContactConfig;
use crate::domain::FieldIssue;
use crate::services::rate_limit::{RateDecision, RateLimiter};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const MESSAGE_MIN: usize = 10;
const MESSAGE_MAX: usize = 5000;
const COMPANY_MAX: usize = 100;
const EMAIL_MAX: usize = 254;

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Too many messages; retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Invalid contact form")]
    InvalidInput(Vec<FieldIssue>),

    #[error("Mail delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Mail delivery is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub message: String,
}

/// What actually goes to the mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Transactional-mail provider speaking a Resend-style JSON API.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(config: &ContactConfig, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("Folio/1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build mail HTTP client: {e}"))?;

        Ok(Self {
            client,
            endpoint: config.provider_url.clone(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(mail)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mail provider returned {status}: {body}");
        }
        Ok(())
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("Invalid regex")
    })
}

impl ContactMessage {
    /// Trims every field and checks the length and format bounds.
    pub fn normalized(&self) -> Result<Self, Vec<FieldIssue>> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_string();
        let message = self.message.trim().to_string();
        let company = self
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut issues = Vec::new();

        let name_len = name.chars().count();
        if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
            issues.push(FieldIssue::new(
                "name",
                format!("must be between {NAME_MIN} and {NAME_MAX} characters"),
            ));
        }

        if email.len() > EMAIL_MAX || !email_regex().is_match(&email) {
            issues.push(FieldIssue::new("email", "must be a valid email address"));
        }

        if let Some(company) = &company
            && company.chars().count() > COMPANY_MAX
        {
            issues.push(FieldIssue::new(
                "company",
                format!("must be at most {COMPANY_MAX} characters"),
            ));
        }

        let message_len = message.chars().count();
        if !(MESSAGE_MIN..=MESSAGE_MAX).contains(&message_len) {
            issues.push(FieldIssue::new(
                "message",
                format!("must be between {MESSAGE_MIN} and {MESSAGE_MAX} characters"),
            ));
        }

        if issues.is_empty() {
            Ok(Self {
                name,
                email,
                company,
                message,
            })
        } else {
            Err(issues)
        }
    }
}

pub struct ContactService {
    config: ContactConfig,
    limiter: Arc<dyn RateLimiter>,
    transport: Option<Arc<dyn MailTransport>>,
}

impl ContactService {
    #[must_use]
    pub fn new(
        config: ContactConfig,
        limiter: Arc<dyn RateLimiter>,
        transport: Option<Arc<dyn MailTransport>>,
    ) -> Self {
        Self {
            config,
            limiter,
            transport,
        }
    }

    /// Every call counts against `client_key`, valid or not.
    pub async fn send(&self, client_key: &str, input: &ContactMessage) -> Result<(), ContactError> {
        if let RateDecision::Limited { retry_after } = self.limiter.check(client_key) {
            warn!(event = "contact.rate_limited", client = %client_key, "Contact form rate limit hit");
            return Err(ContactError::RateLimited {
                retry_after: retry_after.as_secs().max(1),
            });
        }

        let message = input.normalized().map_err(ContactError::InvalidInput)?;

        let Some(transport) = &self.transport else {
            error!(event = "contact.not_configured", "Contact form used but no mail API key is set");
            return Err(ContactError::NotConfigured);
        };

        let mail = self.compose(&message);
        if let Err(e) = transport.send(&mail).await {
            error!(event = "contact.delivery_failed", error = %e, "Failed to deliver contact message");
            return Err(ContactError::DeliveryFailed(e.to_string()));
        }

        info!(event = "contact.sent", client = %client_key, "Contact message delivered");
        Ok(())
    }

    fn compose(&self, message: &ContactMessage) -> OutgoingMail {
        let mut text = format!("Name: {}\nEmail: {}\n", message.name, message.email);
        if let Some(company) = &message.company {
            text.push_str(&format!("Company: {company}\n"));
        }
        text.push('\n');
        text.push_str(&message.message);

        OutgoingMail {
            from: self.config.from_address.clone(),
            to: vec![self.config.to_address.clone()],
            reply_to: message.email.clone(),
            subject: format!("{} {}", self.config.subject_prefix, message.name)
                .trim()
                .to_string(),
            text,
        }
    }
}
