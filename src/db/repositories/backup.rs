use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::domain::{ContentBackup, ContentFields, UserId};
use crate::entities::{content_backups, prelude::*};

fn map_model(model: content_backups::Model) -> Result<ContentBackup> {
    let fields: ContentFields = serde_json::from_value(model.snapshot)
        .with_context(|| format!("Corrupt snapshot in content backup {}", model.id))?;

    Ok(ContentBackup {
        id: model.id,
        content_id: model.content_id,
        version: model.version,
        fields,
        created_by: model.created_by.map(UserId::new),
        created_at: model.created_at,
    })
}

/// Writes one snapshot row. Generic over the connection so the content
/// write path can call it inside its transaction.
pub async fn insert_snapshot<C: ConnectionTrait>(
    conn: &C,
    content_id: i32,
    version: i32,
    fields: &ContentFields,
    created_by: Option<UserId>,
) -> Result<i32> {
    let snapshot = serde_json::to_value(fields).context("Failed to encode content snapshot")?;

    let model = content_backups::ActiveModel {
        content_id: Set(content_id),
        version: Set(version),
        snapshot: Set(snapshot),
        created_by: Set(created_by.map(i32::from)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(model.id)
}

pub struct BackupRepository {
    conn: DatabaseConnection,
}

impl BackupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<ContentBackup>> {
        let model = ContentBackups::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query content backup")?;

        model.map(map_model).transpose()
    }

    /// Newest first; rows sharing a timestamp fall back to id order.
    pub async fn list_for_content(
        &self,
        content_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ContentBackup>> {
        let rows = ContentBackups::find()
            .filter(content_backups::Column::ContentId.eq(content_id))
            .order_by_desc(content_backups::Column::CreatedAt)
            .order_by_desc(content_backups::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.conn)
            .await
            .context("Failed to list content backups")?;

        rows.into_iter().map(map_model).collect()
    }

    pub async fn count_for_content(&self, content_id: i32) -> Result<u64> {
        ContentBackups::find()
            .filter(content_backups::Column::ContentId.eq(content_id))
            .count(&self.conn)
            .await
            .context("Failed to count content backups")
    }

    /// Deletes every backup created strictly before `cutoff`.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = ContentBackups::delete_many()
            .filter(content_backups::Column::CreatedAt.lt(cutoff))
            .exec(&self.conn)
            .await
            .context("Failed to purge content backups")?;

        Ok(result.rows_affected)
    }
}
