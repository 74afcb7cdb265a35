//! `SeaORM` implementation of the `ContentService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ContentConfig;
use crate::db::{ContentMutation, MutationOutcome, Store};
use crate::domain::{Content, ContentBackup, ContentFields, ContentPatch, Section, UserId};
use crate::services::content_service::{
    BackupPage, ContentError, ContentService, SectionInfo,
};

pub struct SeaOrmContentService {
    store: Store,
    config: ContentConfig,
}

impl SeaOrmContentService {
    #[must_use]
    pub const fn new(store: Store, config: ContentConfig) -> Self {
        Self { store, config }
    }

    async fn apply(
        &self,
        op: &'static str,
        mutation: ContentMutation,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError> {
        let outcome = self
            .store
            .mutate_active_content(mutation, Some(actor), expected_version)
            .await?;

        match outcome {
            MutationOutcome::Applied { content, backup_id } => {
                metrics::counter!("content_mutations_total", "op" => op).increment(1);
                info!(
                    event = "content.mutated",
                    op,
                    user_id = %actor,
                    version = content.version,
                    backup_id,
                    "Content updated"
                );
                Ok(content)
            }
            MutationOutcome::VersionConflict { expected, actual } => {
                warn!(
                    event = "content.conflict",
                    op,
                    user_id = %actor,
                    expected,
                    actual,
                    "Rejected stale content write"
                );
                Err(ContentError::Conflict { expected, actual })
            }
        }
    }

    fn clamp_limit(&self, limit: Option<u64>) -> u64 {
        limit
            .unwrap_or(self.config.default_backup_page_size)
            .clamp(1, self.config.max_backup_page_size.max(1))
    }
}

#[async_trait]
impl ContentService for SeaOrmContentService {
    async fn get_active(&self) -> Result<Option<Content>, ContentError> {
        Ok(self.store.get_active_content().await?)
    }

    async fn update(
        &self,
        patch: ContentPatch,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError> {
        patch.validate().map_err(ContentError::Validation)?;

        self.apply(
            "update",
            ContentMutation::Patch(patch),
            actor,
            expected_version,
        )
        .await
    }

    async fn update_section(
        &self,
        section: &str,
        patch: ContentPatch,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError> {
        let section: Section = section
            .parse()
            .map_err(|e: crate::domain::content::UnknownSection| {
                ContentError::UnknownSection(e.0)
            })?;

        let patch = patch.restrict_to(section);
        patch.validate().map_err(ContentError::Validation)?;

        self.apply(
            "update_section",
            ContentMutation::Patch(patch),
            actor,
            expected_version,
        )
        .await
    }

    async fn restore(
        &self,
        backup_id: i32,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError> {
        let backup = self
            .store
            .get_backup(backup_id)
            .await?
            .ok_or(ContentError::BackupNotFound(backup_id))?;

        let content = self
            .apply(
                "restore",
                ContentMutation::Replace(backup.fields),
                actor,
                expected_version,
            )
            .await?;

        info!(
            event = "content.restored",
            backup_id,
            from_version = backup.version,
            version = content.version,
            "Content restored from backup"
        );
        Ok(content)
    }

    async fn list_backups(
        &self,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<BackupPage, ContentError> {
        let limit = self.clamp_limit(limit);

        let Some(active) = self.store.get_active_content().await? else {
            return Ok(BackupPage {
                items: Vec::new(),
                total: 0,
                limit,
                offset,
            });
        };

        let items = self
            .store
            .list_backups_for_content(active.id, limit, offset)
            .await?;
        let total = self.store.count_backups_for_content(active.id).await?;

        Ok(BackupPage {
            items,
            total,
            limit,
            offset,
        })
    }

    async fn list_for_content(
        &self,
        content_id: i32,
        limit: u64,
    ) -> Result<Vec<ContentBackup>, ContentError> {
        Ok(self
            .store
            .list_backups_for_content(content_id, limit, 0)
            .await?)
    }

    async fn get_backup(&self, backup_id: i32) -> Result<ContentBackup, ContentError> {
        self.store
            .get_backup(backup_id)
            .await?
            .ok_or(ContentError::BackupNotFound(backup_id))
    }

    fn sections(&self) -> Vec<SectionInfo> {
        Section::ALL
            .iter()
            .map(|section| SectionInfo {
                name: section.as_str(),
                fields: section.fields(),
            })
            .collect()
    }

    async fn seed_default(&self) -> Result<Option<Content>, ContentError> {
        let created = self
            .store
            .create_content_if_missing(&ContentFields::seed(), None)
            .await?;

        if let Some(content) = &created {
            info!(event = "content.seeded", content_id = content.id, "Seeded default content");
        }
        Ok(created)
    }
}
