//! Signed bearer tokens (compact JWS, HS256).
//!
//! Access and refresh tokens are signed with different secrets and carry a
//! `kind` claim, so a token of one class never verifies as the other.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::domain::{Role, User, UserId};

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    /// Present on access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Account token generation at issue time; a mismatch means revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i32>,
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Makes two tokens minted in the same second distinct.
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    SignatureInvalid,

    /// Signature is fine but issuer, audience or kind is not ours.
    #[error("Token not valid for this service: {0}")]
    InvalidClaims(&'static str),
}

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct TokenService {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.as_bytes().to_vec(),
            refresh_secret: config.refresh_token_secret.as_bytes().to_vec(),
            access_ttl_seconds: i64::try_from(config.access_token_ttl_seconds).unwrap_or(i64::MAX),
            refresh_ttl_seconds: i64::try_from(config.refresh_token_ttl_seconds)
                .unwrap_or(i64::MAX),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_access_token_at(user, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let mut claims = self.base_claims(user.id, TokenKind::Access, now);
        claims.username = Some(user.username.clone());
        claims.role = Some(user.role);
        claims.generation = Some(user.token_generation);
        self.sign(claims)
    }

    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        self.issue_refresh_token_at(user_id, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(self.base_claims(user_id, TokenKind::Refresh, now))
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    /// Checks structure, then signature, then claims, then expiry.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac_for(expected)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::SignatureInvalid)?;

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::Malformed)?;
        let header: serde_json::Value =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.get("alg").and_then(serde_json::Value::as_str) != Some("HS256") {
            return Err(TokenError::Malformed);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;

        if claims.kind != expected {
            return Err(TokenError::InvalidClaims("kind"));
        }
        if claims.iss != self.issuer {
            return Err(TokenError::InvalidClaims("issuer"));
        }
        if claims.aud != self.audience {
            return Err(TokenError::InvalidClaims("audience"));
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn base_claims(&self, user_id: UserId, kind: TokenKind, now: DateTime<Utc>) -> Claims {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        };
        let iat = now.timestamp();

        Claims {
            sub: user_id,
            username: None,
            role: None,
            generation: None,
            kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat.saturating_add(ttl),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, TokenError> {
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let mut mac = self.mac_for(claims.kind)?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{signing_input}.{signature}"),
            claims,
        })
    }

    fn mac_for(&self, kind: TokenKind) -> Result<HmacSha256, TokenError> {
        let secret = match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        };
        HmacSha256::new_from_slice(secret).map_err(|_| TokenError::SignatureInvalid)
    }
}

/// Digest stored in place of a raw refresh token.
#[must_use]
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountStatus;
    use chrono::Duration;

    fn config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "a".repeat(32),
            refresh_token_secret: "r".repeat(32),
            ..AuthConfig::default()
        }
    }

    fn service() -> TokenService {
        TokenService::new(&config())
    }

    fn user(id: i32, username: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(id),
            username: username.to_string(),
            role,
            status: AccountStatus::Active,
            last_login_at: None,
            password_changed_at: None,
            token_generation: 4,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_round_trip() {
        let tokens = service();
        let issued = tokens
            .issue_access_token(&user(3, "admin", Role::Admin))
            .unwrap();

        let claims = tokens.verify(&issued.token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, UserId::new(3));
        assert_eq!(claims.username.as_deref(), Some("admin"));
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.generation, Some(4));
        assert_eq!(claims.iss, "folio-api");
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_refresh_carries_only_user_id() {
        let tokens = service();
        let issued = tokens.issue_refresh_token(UserId::new(9)).unwrap();
        let claims = tokens.verify(&issued.token, TokenKind::Refresh).unwrap();

        assert_eq!(claims.sub, UserId::new(9));
        assert!(claims.username.is_none());
        assert!(claims.role.is_none());
        assert!(claims.generation.is_none());
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let tokens = service();
        let access = tokens
            .issue_access_token(&user(1, "admin", Role::Admin))
            .unwrap();
        let refresh = tokens.issue_refresh_token(UserId::new(1)).unwrap();

        assert_eq!(
            tokens.verify(&access.token, TokenKind::Refresh),
            Err(TokenError::SignatureInvalid)
        );
        assert_eq!(
            tokens.verify(&refresh.token, TokenKind::Access),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_expired() {
        let tokens = service();
        let issued_at = Utc::now() - Duration::days(2);
        let issued = tokens
            .issue_access_token_at(&user(1, "admin", Role::Admin), issued_at)
            .unwrap();

        assert_eq!(
            tokens.verify(&issued.token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_issuer_and_audience_mismatch() {
        let issuer = service();
        let other = TokenService::new(&AuthConfig {
            issuer: "someone-else".to_string(),
            ..config()
        });
        let other_aud = TokenService::new(&AuthConfig {
            audience: "public-site".to_string(),
            ..config()
        });

        let token = issuer.issue_refresh_token(UserId::new(1)).unwrap().token;
        assert_eq!(
            other.verify(&token, TokenKind::Refresh),
            Err(TokenError::InvalidClaims("issuer"))
        );
        assert_eq!(
            other_aud.verify(&token, TokenKind::Refresh),
            Err(TokenError::InvalidClaims("audience"))
        );
    }

    #[test]
    fn test_tampered_and_malformed() {
        let tokens = service();
        let issued = tokens
            .issue_access_token(&user(1, "editor", Role::Editor))
            .unwrap();

        let forged_claims = Claims {
            role: Some(Role::Admin),
            ..issued.claims.clone()
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[1] = &forged_payload;
        let forged = parts.join(".");

        assert_eq!(
            tokens.verify(&forged, TokenKind::Access),
            Err(TokenError::SignatureInvalid)
        );
        assert_eq!(
            tokens.verify("not-a-token", TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            tokens.verify("a.b.c.d", TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let tokens = service();
        let now = Utc::now();
        let a = tokens.issue_refresh_token_at(UserId::new(1), now).unwrap();
        let b = tokens.issue_refresh_token_at(UserId::new(1), now).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(token_digest(&a.token), token_digest(&b.token));
    }
}
