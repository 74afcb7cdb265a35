use sea_orm::entity::prelude::*;

/// One row per page; only the row with `is_active = true` is served.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "contents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub hero_title: String,
    pub hero_subtitle: String,
    #[sea_orm(column_type = "Text")]
    pub hero_description: String,
    pub hero_image: String,

    pub about_title: String,
    #[sea_orm(column_type = "Text")]
    pub about_description: String,
    /// JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub about_highlights: Json,

    pub experience_title: String,
    /// JSON array of experience entries
    #[sea_orm(column_type = "Json")]
    pub experiences: Json,

    pub skills_title: String,
    /// JSON array of skill categories, each with its skills
    #[sea_orm(column_type = "Json")]
    pub skill_categories: Json,

    pub achievements_title: String,
    #[sea_orm(column_type = "Json")]
    pub achievements: Json,

    pub contact_title: String,
    #[sea_orm(column_type = "Text")]
    pub contact_description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_location: String,
    #[sea_orm(column_type = "Json")]
    pub social_links: Json,
    pub cv_url: String,

    pub version: i32,

    pub is_active: bool,

    pub last_modified_by: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::content_backups::Entity")]
    ContentBackups,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::LastModifiedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Users,
}

impl Related<super::content_backups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentBackups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
