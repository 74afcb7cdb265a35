//! Active content row plus the backup-before-mutate write path.

use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use tracing::debug;

use super::backup;
use crate::domain::{Content, ContentFields, ContentPatch, UserId};
use crate::entities::{contents, prelude::*};

/// What a write does to the active record's fields.
#[derive(Debug, Clone)]
pub enum ContentMutation {
    /// Shallow-merge onto the current fields.
    Patch(ContentPatch),
    /// Overwrite every field (restore from a snapshot).
    Replace(ContentFields),
}

#[derive(Debug, Clone)]
pub enum MutationOutcome {
    Applied {
        content: Content,
        /// Snapshot written before the change; `None` when the record was created.
        backup_id: Option<i32>,
    },
    VersionConflict {
        expected: i32,
        actual: i32,
    },
}

fn decode<T: serde::de::DeserializeOwned>(value: &serde_json::Value, column: &str) -> Result<T> {
    serde_json::from_value(value.clone())
        .with_context(|| format!("Corrupt JSON in contents.{column}"))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("Failed to encode content field")
}

pub(super) fn fields_from_model(model: &contents::Model) -> Result<ContentFields> {
    Ok(ContentFields {
        hero_title: model.hero_title.clone(),
        hero_subtitle: model.hero_subtitle.clone(),
        hero_description: model.hero_description.clone(),
        hero_image: model.hero_image.clone(),
        about_title: model.about_title.clone(),
        about_description: model.about_description.clone(),
        about_highlights: decode(&model.about_highlights, "about_highlights")?,
        experience_title: model.experience_title.clone(),
        experiences: decode(&model.experiences, "experiences")?,
        skills_title: model.skills_title.clone(),
        skill_categories: decode(&model.skill_categories, "skill_categories")?,
        achievements_title: model.achievements_title.clone(),
        achievements: decode(&model.achievements, "achievements")?,
        contact_title: model.contact_title.clone(),
        contact_description: model.contact_description.clone(),
        contact_email: model.contact_email.clone(),
        contact_phone: model.contact_phone.clone(),
        contact_location: model.contact_location.clone(),
        social_links: decode(&model.social_links, "social_links")?,
        cv_url: model.cv_url.clone(),
    })
}

fn set_fields(active: &mut contents::ActiveModel, fields: &ContentFields) -> Result<()> {
    active.hero_title = Set(fields.hero_title.clone());
    active.hero_subtitle = Set(fields.hero_subtitle.clone());
    active.hero_description = Set(fields.hero_description.clone());
    active.hero_image = Set(fields.hero_image.clone());
    active.about_title = Set(fields.about_title.clone());
    active.about_description = Set(fields.about_description.clone());
    active.about_highlights = Set(encode(&fields.about_highlights)?);
    active.experience_title = Set(fields.experience_title.clone());
    active.experiences = Set(encode(&fields.experiences)?);
    active.skills_title = Set(fields.skills_title.clone());
    active.skill_categories = Set(encode(&fields.skill_categories)?);
    active.achievements_title = Set(fields.achievements_title.clone());
    active.achievements = Set(encode(&fields.achievements)?);
    active.contact_title = Set(fields.contact_title.clone());
    active.contact_description = Set(fields.contact_description.clone());
    active.contact_email = Set(fields.contact_email.clone());
    active.contact_phone = Set(fields.contact_phone.clone());
    active.contact_location = Set(fields.contact_location.clone());
    active.social_links = Set(encode(&fields.social_links)?);
    active.cv_url = Set(fields.cv_url.clone());
    Ok(())
}

fn map_model(model: contents::Model) -> Result<Content> {
    Ok(Content {
        fields: fields_from_model(&model)?,
        id: model.id,
        version: model.version,
        is_active: model.is_active,
        last_modified_by: model.last_modified_by.map(UserId::new),
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub struct ContentRepository {
    conn: DatabaseConnection,
}

impl ContentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_active(&self) -> Result<Option<Content>> {
        let model = Contents::find()
            .filter(contents::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query active content")?;

        model.map(map_model).transpose()
    }

    /// Number of active rows; anything above 1 is a broken invariant.
    pub async fn count_active(&self) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        Contents::find()
            .filter(contents::Column::IsActive.eq(true))
            .count(&self.conn)
            .await
            .context("Failed to count active content")
    }

    /// Creates the active record from `fields` unless one already exists.
    pub async fn create_if_missing(
        &self,
        fields: &ContentFields,
        actor: Option<UserId>,
    ) -> Result<Option<Content>> {
        let txn = self.conn.begin().await?;

        let existing = Contents::find()
            .filter(contents::Column::IsActive.eq(true))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Ok(None);
        }

        let content = insert_active(&txn, fields, actor).await?;
        txn.commit().await?;
        Ok(Some(content))
    }

    /// Applies `mutation` to the active record.
    ///
    /// When a record exists its current state is written to `content_backups`
    /// first, inside the same transaction; a failed snapshot aborts the write.
    /// With no active record a new one is created at version 1 and no
    /// snapshot is taken.
    pub async fn mutate_active(
        &self,
        mutation: ContentMutation,
        actor: Option<UserId>,
        expected_version: Option<i32>,
    ) -> Result<MutationOutcome> {
        let txn = self.conn.begin().await?;

        let current = Contents::find()
            .filter(contents::Column::IsActive.eq(true))
            .one(&txn)
            .await
            .context("Failed to load active content")?;

        let Some(current) = current else {
            if let Some(expected) = expected_version
                && expected != 0
            {
                return Ok(MutationOutcome::VersionConflict {
                    expected,
                    actual: 0,
                });
            }

            let fields = match mutation {
                ContentMutation::Patch(patch) => {
                    let mut fields = ContentFields::default();
                    fields.apply(patch);
                    fields
                }
                ContentMutation::Replace(fields) => fields,
            };

            let content = insert_active(&txn, &fields, actor).await?;
            txn.commit().await?;
            return Ok(MutationOutcome::Applied {
                content,
                backup_id: None,
            });
        };

        if let Some(expected) = expected_version
            && expected != current.version
        {
            return Ok(MutationOutcome::VersionConflict {
                expected,
                actual: current.version,
            });
        }

        let previous_fields = fields_from_model(&current)?;
        let backup_id = backup::insert_snapshot(
            &txn,
            current.id,
            current.version,
            &previous_fields,
            actor,
        )
        .await
        .context("Failed to write content backup; update aborted")?;

        let next_fields = match mutation {
            ContentMutation::Patch(patch) => {
                let mut fields = previous_fields;
                fields.apply(patch);
                fields
            }
            ContentMutation::Replace(fields) => fields,
        };

        let current_id = current.id;
        let current_version = current.version;

        let mut active: contents::ActiveModel = current.into();
        set_fields(&mut active, &next_fields)?;
        active.version = Set(current_version + 1);
        active.last_modified_by = Set(actor.map(i32::from));
        active.updated_at = Set(Utc::now());

        // Conditional on the version read above, so a concurrent writer that
        // got in first turns this into a conflict instead of a lost update.
        let result = Contents::update_many()
            .set(active)
            .filter(contents::Column::Id.eq(current_id))
            .filter(contents::Column::Version.eq(current_version))
            .exec(&txn)
            .await
            .context("Failed to update active content")?;

        if result.rows_affected == 0 {
            let actual = Contents::find_by_id(current_id)
                .one(&txn)
                .await?
                .map_or(0, |m| m.version);
            return Ok(MutationOutcome::VersionConflict {
                expected: current_version,
                actual,
            });
        }

        let updated = Contents::find_by_id(current_id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Active content {current_id} vanished mid-update"))?;

        txn.commit().await?;

        debug!(
            content_id = current_id,
            backup_id,
            version = updated.version,
            "Content mutation committed"
        );

        Ok(MutationOutcome::Applied {
            content: map_model(updated)?,
            backup_id: Some(backup_id),
        })
    }
}

async fn insert_active(
    txn: &DatabaseTransaction,
    fields: &ContentFields,
    actor: Option<UserId>,
) -> Result<Content> {
    let now = Utc::now();

    let mut active = contents::ActiveModel {
        version: Set(1),
        is_active: Set(true),
        last_modified_by: Set(actor.map(i32::from)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    set_fields(&mut active, fields)?;

    let model = active
        .insert(txn)
        .await
        .context("Failed to create content record")?;

    map_model(model)
}
