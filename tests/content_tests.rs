use chrono::{Duration, Utc};
use folio::config::{ContentConfig, SecurityConfig};
use folio::db::Store;
use folio::domain::{ContentPatch, Role, SocialLink, UserId};
use folio::services::{BackupRetention, ContentError, ContentService, SeaOrmContentService};
use sea_orm::ConnectionTrait;
use std::sync::Arc;

fn temp_db_url() -> String {
    let path = std::env::temp_dir().join(format!("folio-test-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite:{}", path.display())
}

fn cheap_security() -> SecurityConfig {
    SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 8,
    }
}

async fn setup() -> (Store, SeaOrmContentService, UserId) {
    let store = Store::new(&temp_db_url()).await.unwrap();
    let user = store
        .user_repo()
        .create("editor", "password123", Role::Editor, &cheap_security())
        .await
        .unwrap();
    let service = SeaOrmContentService::new(store.clone(), ContentConfig::default());
    (store, service, user.id)
}

fn hero_title(title: &str) -> ContentPatch {
    ContentPatch {
        hero_title: Some(title.to_string()),
        ..ContentPatch::default()
    }
}

#[tokio::test]
async fn test_update_backup_restore_scenario() {
    let (_store, service, user) = setup().await;

    assert!(service.get_active().await.unwrap().is_none());

    let v1 = service.update(hero_title("Hello"), user, None).await.unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v1.fields.hero_title, "Hello");
    assert_eq!(v1.last_modified_by, Some(user));
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 0);

    let v2 = service.update(hero_title("World"), user, None).await.unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.id, v1.id);
    assert_eq!(v2.fields.hero_title, "World");

    let page = service.list_backups(None, 0).await.unwrap();
    assert_eq!(page.total, 1);
    let backup = &page.items[0];
    assert_eq!(backup.version, 1);
    assert_eq!(backup.content_id, v1.id);
    assert_eq!(backup.fields.hero_title, "Hello");
    assert_eq!(backup.created_by, Some(user));

    let v3 = service.restore(backup.id, user, None).await.unwrap();
    assert_eq!(v3.version, 3);
    assert_eq!(v3.fields, v1.fields);

    // restoring snapshots the state it replaces
    let page = service.list_backups(None, 0).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].version, 2);
    assert_eq!(page.items[0].fields.hero_title, "World");
}

#[tokio::test]
async fn test_patch_is_shallow_merge() {
    let (_store, service, user) = setup().await;

    service
        .update(
            ContentPatch {
                hero_title: Some("Title".to_string()),
                about_title: Some("About".to_string()),
                ..ContentPatch::default()
            },
            user,
            None,
        )
        .await
        .unwrap();

    let content = service
        .update(hero_title("New title"), user, None)
        .await
        .unwrap();
    assert_eq!(content.fields.hero_title, "New title");
    assert_eq!(content.fields.about_title, "About");
}

#[tokio::test]
async fn test_versions_increase_by_one_per_write() {
    let (_store, service, user) = setup().await;

    let mut last = 0;
    for n in 0..5 {
        let content = service
            .update(hero_title(&format!("rev {n}")), user, None)
            .await
            .unwrap();
        assert_eq!(content.version, last + 1);
        last = content.version;
    }

    let page = service.list_backups(None, 0).await.unwrap();
    assert_eq!(page.total, 4);
    let versions: Vec<i32> = page.items.iter().map(|b| b.version).collect();
    assert_eq!(versions, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn test_section_update_ignores_other_fields() {
    let (_store, service, user) = setup().await;
    service.update(hero_title("Hero"), user, None).await.unwrap();

    let patch = ContentPatch {
        hero_title: Some("Hero 2".to_string()),
        about_title: Some("Sneaky".to_string()),
        ..ContentPatch::default()
    };
    let content = service
        .update_section("hero", patch, user, None)
        .await
        .unwrap();

    assert_eq!(content.fields.hero_title, "Hero 2");
    assert_eq!(content.fields.about_title, "");
    assert_eq!(content.version, 2);
}

#[tokio::test]
async fn test_unknown_section_is_rejected() {
    let (_store, service, user) = setup().await;

    let err = service
        .update_section("footer", hero_title("x"), user, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::UnknownSection(name) if name == "footer"));
    assert!(service.get_active().await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_expected_version_conflicts() {
    let (store, service, user) = setup().await;
    service.update(hero_title("one"), user, None).await.unwrap();
    service.update(hero_title("two"), user, Some(1)).await.unwrap();

    let err = service
        .update(hero_title("three"), user, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Conflict {
            expected: 1,
            actual: 2
        }
    ));

    let content = store.get_active_content().await.unwrap().unwrap();
    assert_eq!(content.version, 2);
    assert_eq!(content.fields.hero_title, "two");
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 1);
}

#[tokio::test]
async fn test_expected_version_without_content_conflicts() {
    let (_store, service, user) = setup().await;

    let err = service
        .update(hero_title("x"), user, Some(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Conflict {
            expected: 3,
            actual: 0
        }
    ));
}

#[tokio::test]
async fn test_invalid_patch_writes_nothing() {
    let (_store, service, user) = setup().await;
    service.update(hero_title("ok"), user, None).await.unwrap();

    let patch = ContentPatch {
        social_links: Some(vec![SocialLink {
            platform: "ftp".to_string(),
            url: "ftp://example.com".to_string(),
        }]),
        ..ContentPatch::default()
    };
    let err = service.update(patch, user, None).await.unwrap_err();
    match err {
        ContentError::Validation(issues) => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].field, "socialLinks[0].url");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let content = service.get_active().await.unwrap().unwrap();
    assert_eq!(content.version, 1);
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_failed_backup_aborts_update() {
    let (store, service, user) = setup().await;
    service.update(hero_title("safe"), user, None).await.unwrap();

    store
        .conn
        .execute_unprepared(
            "CREATE TRIGGER block_backups BEFORE INSERT ON content_backups \
             BEGIN SELECT RAISE(ABORT, 'backups unavailable'); END",
        )
        .await
        .unwrap();

    let result = service.update(hero_title("lost"), user, None).await;
    assert!(result.is_err());

    let content = store.get_active_content().await.unwrap().unwrap();
    assert_eq!(content.version, 1);
    assert_eq!(content.fields.hero_title, "safe");
}

#[tokio::test]
async fn test_single_active_record() {
    let (store, service, user) = setup().await;

    assert!(service.seed_default().await.unwrap().is_some());
    assert!(service.seed_default().await.unwrap().is_none());

    service.update(hero_title("a"), user, None).await.unwrap();
    let backup_id = service.list_backups(None, 0).await.unwrap().items[0].id;
    service.restore(backup_id, user, None).await.unwrap();

    assert_eq!(store.count_active_content().await.unwrap(), 1);
}

#[tokio::test]
async fn test_restore_missing_backup() {
    let (_store, service, user) = setup().await;
    service.update(hero_title("a"), user, None).await.unwrap();

    let err = service.restore(999, user, None).await.unwrap_err();
    assert!(matches!(err, ContentError::BackupNotFound(999)));

    let err = service.get_backup(999).await.unwrap_err();
    assert!(matches!(err, ContentError::BackupNotFound(999)));
}

#[tokio::test]
async fn test_backup_page_limits() {
    let (_store, service, user) = setup().await;
    for n in 0..4 {
        service
            .update(hero_title(&format!("{n}")), user, None)
            .await
            .unwrap();
    }

    let page = service.list_backups(Some(2), 1).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].version, 2);

    let page = service.list_backups(Some(10_000), 0).await.unwrap();
    assert_eq!(page.limit, ContentConfig::default().max_backup_page_size);
}

#[tokio::test]
async fn test_retention_purges_only_expired_backups() {
    let (store, service, user) = setup().await;
    for n in 0..3 {
        service
            .update(hero_title(&format!("{n}")), user, None)
            .await
            .unwrap();
    }

    let retention = BackupRetention::new(store.clone(), 90);

    assert_eq!(retention.purge_expired().await.unwrap(), 0);
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 2);

    let later = Utc::now() + Duration::days(91);
    assert_eq!(retention.purge_expired_at(later).await.unwrap(), 2);
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 0);

    // content itself is never purged
    assert_eq!(store.get_active_content().await.unwrap().unwrap().version, 3);
}

#[tokio::test]
async fn test_list_for_content_is_newest_first() {
    let (_store, service, user) = setup().await;
    let mut content_id = 0;
    for n in 0..4 {
        content_id = service
            .update(hero_title(&format!("take {n}")), user, None)
            .await
            .unwrap()
            .id;
    }

    let backups = service.list_for_content(content_id, 10).await.unwrap();
    let versions: Vec<i32> = backups.iter().map(|b| b.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
    assert_eq!(backups[0].fields.hero_title, "take 2");

    let newest = service.list_for_content(content_id, 1).await.unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].id, backups[0].id);

    assert!(service.list_for_content(content_id + 1, 10).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_get_conflicts_not_errors() {
    let (store, service, user) = setup().await;
    service.update(hero_title("base"), user, None).await.unwrap();
    let service = Arc::new(service);

    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .update(hero_title(&format!("writer {n}")), user, Some(1))
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(content) => {
                assert_eq!(content.version, 2);
                applied += 1;
            }
            Err(ContentError::Conflict { expected: 1, actual: 2 }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(store.get_active_content().await.unwrap().unwrap().version, 2);
    assert_eq!(service.list_backups(None, 0).await.unwrap().total, 1);
}
