//! Domain service for back-office authentication.
//!
//! Handles login, refresh-token rotation, logout, password changes and
//! access-token authentication for the middleware.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Role, User, UserId};
use crate::services::token_service::TokenError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password both map here.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid access token: {0}")]
    InvalidAccessToken(#[from] TokenError),

    /// Access token predates a password change or belongs to a disabled or
    /// deleted account.
    #[error("Session revoked")]
    SessionRevoked,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("New password must be different from current password")]
    SamePassword,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Token pair handed to the client after login or refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Identity attached to a request once its bearer token checks out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    /// Role as currently stored, not as claimed in the token.
    pub role: Role,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a
    /// wrong password, and [`AuthError::AccountDisabled`] when the password
    /// is right but the account is disabled.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Exchanges an outstanding refresh token for a new pair. The presented
    /// token stops working.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Revokes one refresh token, or all of them when `refresh_token` is `None`.
    async fn logout(&self, user_id: UserId, refresh_token: Option<&str>) -> Result<(), AuthError>;

    /// Changes a user's password and revokes every session.
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    async fn get_user(&self, user_id: UserId) -> Result<User, AuthError>;

    /// Validates an access token against the signing key and the stored account.
    async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError>;
}
