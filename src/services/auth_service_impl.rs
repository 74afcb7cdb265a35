//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{AuthConfig, SecurityConfig};
use crate::db::Store;
use crate::domain::{RefreshTokenState, StoredRefreshToken, User, UserId};
use crate::services::auth_service::{
    AuthError, AuthService, AuthenticatedUser, LoginResult, TokenPair,
};
use crate::services::token_service::{IssuedToken, TokenKind, TokenService, token_digest};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenService,
    auth: AuthConfig,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, auth: AuthConfig, security: SecurityConfig) -> Self {
        Self {
            tokens: TokenService::new(&auth),
            store,
            auth,
            security,
        }
    }

    fn issue_pair(&self, user: &User) -> Result<(TokenPair, IssuedToken), AuthError> {
        let access = self
            .tokens
            .issue_access_token(user)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let refresh = self
            .tokens
            .issue_refresh_token(user.id)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let pair = TokenPair {
            access_token: access.token,
            refresh_token: refresh.token.clone(),
            token_type: "Bearer",
            expires_in: access.claims.exp - access.claims.iat,
        };
        Ok((pair, refresh))
    }
}

fn stored(issued: &IssuedToken) -> StoredRefreshToken {
    StoredRefreshToken {
        token_hash: token_digest(&issued.token),
        issued_at: issued.claims.issued_at(),
        expires_at: issued.claims.expires_at(),
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self
            .store
            .user_repo()
            .verify_credentials(username, password, &self.security)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active() {
            warn!(event = "auth.login_disabled", user_id = %user.id, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let (tokens, refresh) = self.issue_pair(&user)?;
        self.store
            .user_repo()
            .record_login(user.id, stored(&refresh), self.auth.max_refresh_tokens)
            .await?;

        let user = self.store.get_user(user.id).await?.unwrap_or(user);

        info!(event = "auth.login", user_id = %user.id, "User logged in");

        Ok(LoginResult { user, tokens })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !user.is_active() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let (tokens, next) = self.issue_pair(&user)?;
        let presented = token_digest(refresh_token);
        let next = stored(&next);
        let cap = self.auth.max_refresh_tokens;
        let now = Utc::now();

        let rotated = self
            .store
            .user_repo()
            .update_refresh_tokens(user.id, move |set| {
                if set.state_of(&presented, now) != RefreshTokenState::Outstanding {
                    return false;
                }
                set.remove(&presented);
                set.push(next, cap, now);
                true
            })
            .await?;

        if rotated != Some(true) {
            warn!(event = "auth.refresh_rejected", user_id = %user.id, "Refresh token not outstanding");
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(tokens)
    }

    async fn logout(&self, user_id: UserId, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let digest = refresh_token.map(token_digest);
        let all = digest.is_none();

        self.store
            .user_repo()
            .update_refresh_tokens(user_id, move |set| match digest {
                Some(digest) => {
                    set.remove(&digest);
                }
                None => set.clear(),
            })
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(event = "auth.logout", user_id = %user_id, all_devices = all, "User logged out");
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.chars().count() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "New password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        if current_password == new_password {
            return Err(AuthError::SamePassword);
        }

        if self.store.get_user(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let is_valid = self
            .store
            .user_repo()
            .verify_password(user_id, current_password)
            .await?;

        if !is_valid {
            return Err(AuthError::WrongCurrentPassword);
        }

        self.store
            .user_repo()
            .update_password(user_id, new_password, &self.security)
            .await?;

        info!(event = "auth.password_changed", user_id = %user_id, "Password changed; sessions revoked");
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;

        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .ok_or(AuthError::SessionRevoked)?;

        if !user.is_active() {
            return Err(AuthError::SessionRevoked);
        }

        if claims.generation != Some(user.token_generation) {
            return Err(AuthError::SessionRevoked);
        }

        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}
