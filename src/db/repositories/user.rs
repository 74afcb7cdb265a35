use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::{AccountStatus, RefreshTokenSet, Role, StoredRefreshToken, User, UserId};
use crate::entities::users;

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        Ok(Self {
            id: UserId::new(model.id),
            role: model.role.parse()?,
            status: model.status.parse()?,
            username: model.username,
            last_login_at: model.last_login_at,
            password_changed_at: model.password_changed_at,
            token_generation: model.token_generation,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

fn decode_tokens(model: &users::Model) -> Result<RefreshTokenSet> {
    serde_json::from_value(model.refresh_tokens.clone())
        .with_context(|| format!("Corrupt refresh token list for user {}", model.id))
}

fn encode_tokens(tokens: &RefreshTokenSet) -> Result<serde_json::Value> {
    serde_json::to_value(tokens).context("Failed to encode refresh token list")
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn count(&self) -> Result<u64> {
        users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn create(
        &self,
        username: &str,
        password: &str,
        role: Role,
        security: &SecurityConfig,
    ) -> Result<User> {
        let password = password.to_string();
        let security = security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let now = Utc::now();
        let model = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            role: Set(role.as_str().to_string()),
            status: Set(AccountStatus::Active.as_str().to_string()),
            refresh_tokens: Set(encode_tokens(&RefreshTokenSet::default())?),
            last_login_at: Set(None),
            password_changed_at: Set(None),
            token_generation: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .with_context(|| format!("Failed to create user {username}"))?;

        User::try_from(model)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(User::try_from).transpose()
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(User::try_from).transpose()
    }

    /// Returns the user when `password` matches, `None` otherwise.
    ///
    /// An unknown username still pays for one hash so both failure paths take
    /// comparable time.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(model) = model else {
            let password = password.to_string();
            let security = security.clone();
            task::spawn_blocking(move || hash_password(&password, Some(&security)))
                .await
                .context("Password hashing task panicked")??;
            return Ok(None);
        };

        if verify_hash(&model.password_hash, password).await? {
            Ok(Some(User::try_from(model)?))
        } else {
            Ok(None)
        }
    }

    pub async fn verify_password(&self, id: UserId, password: &str) -> Result<bool> {
        let model = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        verify_hash(&model.password_hash, password).await
    }

    /// Rehashes the password, bumps the token generation and drops every
    /// refresh token.
    pub async fn update_password(
        &self,
        id: UserId,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        let model = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let password = new_password.to_string();
        let security = security.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let now = Utc::now();
        let generation = model.token_generation.wrapping_add(1);

        let mut active: users::ActiveModel = model.into();
        active.password_hash = Set(new_hash);
        active.token_generation = Set(generation);
        active.password_changed_at = Set(Some(now));
        active.refresh_tokens = Set(encode_tokens(&RefreshTokenSet::default())?);
        active.updated_at = Set(now);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_status(&self, username: &str, status: AccountStatus) -> Result<bool> {
        let Some(model) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for status update")?
        else {
            return Ok(false);
        };

        let generation = model.token_generation.wrapping_add(1);

        let mut active: users::ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        active.token_generation = Set(generation);
        if status == AccountStatus::Disabled {
            active.refresh_tokens = Set(encode_tokens(&RefreshTokenSet::default())?);
        }
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(true)
    }

    /// Read-modify-write of the refresh token list in one transaction.
    ///
    /// Returns `None` when the user does not exist.
    pub async fn update_refresh_tokens<F, T>(&self, id: UserId, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut RefreshTokenSet) -> T + Send,
        T: Send,
    {
        let txn = self.conn.begin().await?;

        let Some(model) = users::Entity::find_by_id(id.value()).one(&txn).await? else {
            return Ok(None);
        };

        let mut tokens = decode_tokens(&model)?;
        let result = f(&mut tokens);

        let mut active: users::ActiveModel = model.into();
        active.refresh_tokens = Set(encode_tokens(&tokens)?);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(Some(result))
    }

    /// Stores the newly issued refresh token and stamps the login time.
    pub async fn record_login(
        &self,
        id: UserId,
        token: StoredRefreshToken,
        max_tokens: usize,
    ) -> Result<()> {
        let txn = self.conn.begin().await?;

        let model = users::Entity::find_by_id(id.value())
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let now = Utc::now();
        let mut tokens = decode_tokens(&model)?;
        tokens.push(token, max_tokens, now);

        let mut active: users::ActiveModel = model.into();
        active.refresh_tokens = Set(encode_tokens(&tokens)?);
        active.last_login_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }
}

/// Verifies a password against an Argon2 PHC string.
/// Runs on the blocking pool: Argon2 is CPU-intensive.
async fn verify_hash(password_hash: &str, password: &str) -> Result<bool> {
    let password_hash = password_hash.to_string();
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the crate's default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Generate a random password for accounts created without one.
#[must_use]
pub fn generate_password() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 12] = rng.random();

    bytes.iter().fold(String::with_capacity(24), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
