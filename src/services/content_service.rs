//! Domain service for the versioned page content.
//!
//! Every mutation of an existing record snapshots it first; see
//! [`crate::db::Store::mutate_active_content`] for the write path.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Content, ContentBackup, ContentPatch, FieldIssue, UserId};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("No active content")]
    NotFound,

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(i32),

    #[error("Version conflict: expected {expected}, found {actual}")]
    Conflict { expected: i32, actual: i32 },

    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ContentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ContentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// One page of backups, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPage {
    pub items: Vec<ContentBackup>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Section name with the wire names of the fields it may change.
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

#[async_trait::async_trait]
pub trait ContentService: Send + Sync {
    /// The active record, if one exists.
    async fn get_active(&self) -> Result<Option<Content>, ContentError>;

    /// Shallow-merges `patch` onto the active record, creating it at
    /// version 1 when none exists.
    ///
    /// # Errors
    ///
    /// [`ContentError::Conflict`] when `expected_version` is given and stale;
    /// [`ContentError::Validation`] before anything is written.
    async fn update(
        &self,
        patch: ContentPatch,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError>;

    /// Like [`ContentService::update`], but fields outside the section's
    /// allow-list are dropped from `patch` first.
    async fn update_section(
        &self,
        section: &str,
        patch: ContentPatch,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError>;

    /// Overwrites the active record with a snapshot's fields. The pre-restore
    /// state is itself backed up.
    async fn restore(
        &self,
        backup_id: i32,
        actor: UserId,
        expected_version: Option<i32>,
    ) -> Result<Content, ContentError>;

    /// Backups of the active record.
    async fn list_backups(&self, limit: Option<u64>, offset: u64)
    -> Result<BackupPage, ContentError>;

    /// Up to `limit` backups of one record, newest first.
    async fn list_for_content(
        &self,
        content_id: i32,
        limit: u64,
    ) -> Result<Vec<ContentBackup>, ContentError>;

    async fn get_backup(&self, backup_id: i32) -> Result<ContentBackup, ContentError>;

    fn sections(&self) -> Vec<SectionInfo>;

    /// Creates the default record when none exists. Returns it if created.
    async fn seed_default(&self) -> Result<Option<Content>, ContentError>;
}
