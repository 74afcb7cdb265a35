use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// `admin` or `editor`
    pub role: String,

    /// `active` or `disabled`
    pub status: String,

    /// Outstanding refresh tokens (JSON array of digests with issue/expiry times)
    #[sea_orm(column_type = "Json")]
    pub refresh_tokens: Json,

    pub last_login_at: Option<DateTimeUtc>,

    pub password_changed_at: Option<DateTimeUtc>,

    /// Incremented whenever outstanding access tokens must stop working.
    #[sea_orm(default_value = 0)]
    pub token_generation: i32,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
