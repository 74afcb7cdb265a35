//! Back-office users and their outstanding refresh tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            other => Err(anyhow::anyhow!("Unknown role: {other}")),
        }
    }
}

/// Whether an account may authenticate at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Disabled,
}

impl AccountStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            other => Err(anyhow::anyhow!("Unknown account status: {other}")),
        }
    }
}

/// User data handed out by the repository (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub password_changed_at: Option<DateTime<Utc>>,
    /// Bumped on password or status change; access tokens must match it.
    #[serde(skip)]
    pub token_generation: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// A refresh token as persisted: only its digest is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRefreshToken {
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// State of a presented refresh token relative to the stored list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Outstanding,
    Expired,
    /// Rotated away, logged out, or never issued to this user.
    Revoked,
}

/// The per-user list of outstanding refresh tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshTokenSet(Vec<StoredRefreshToken>);

impl RefreshTokenSet {
    #[must_use]
    pub fn new(tokens: Vec<StoredRefreshToken>) -> Self {
        Self(tokens)
    }

    #[must_use]
    pub fn state_of(&self, token_hash: &str, now: DateTime<Utc>) -> RefreshTokenState {
        match self.0.iter().find(|t| t.token_hash == token_hash) {
            Some(t) if t.expires_at > now => RefreshTokenState::Outstanding,
            Some(_) => RefreshTokenState::Expired,
            None => RefreshTokenState::Revoked,
        }
    }

    /// Appends a token, dropping expired entries and the oldest ones past `cap`.
    pub fn push(&mut self, token: StoredRefreshToken, cap: usize, now: DateTime<Utc>) {
        self.prune_expired(now);
        self.0.push(token);
        if self.0.len() > cap {
            self.0.sort_by_key(|t| t.issued_at);
            let excess = self.0.len() - cap;
            self.0.drain(..excess);
        }
    }

    /// Removes one token. Returns whether it was present.
    pub fn remove(&mut self, token_hash: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t.token_hash != token_hash);
        self.0.len() != before
    }

    pub fn prune_expired(&mut self, now: DateTime<Utc>) {
        self.0.retain(|t| t.expires_at > now);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredRefreshToken> {
        self.0.iter()
    }
}
