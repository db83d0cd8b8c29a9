//! Repairs queued by one process are replayed by a later one
use std::path::Path;

use bytes::Bytes;
use common::builder::StorageStrategyConfig;
use common::event_bus::EventBus;
use object_store::{BlobId, BlobStoreDao, BucketName, ObjectStoreConfig, ObjectStoreDao};
use postblob_daemon::{AppConfig, AppState, ServiceState};

fn replicated_config(root: &Path) -> AppConfig {
    AppConfig {
        primary: ObjectStoreConfig::Local {
            path: root.join("primary"),
        },
        secondary: Some(ObjectStoreConfig::Local {
            path: root.join("secondary"),
        }),
        strategy: StorageStrategyConfig {
            secondary_enabled: true,
            secondary_bucket_suffix: "-eu".to_string(),
            single_save: true,
            ..StorageStrategyConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Make the local store rooted at `path` unusable.
fn break_store(path: &Path) {
    std::fs::remove_dir_all(path).unwrap();
    std::fs::write(path, b"not a directory").unwrap();
}

fn fix_store(path: &Path) {
    std::fs::remove_file(path).unwrap();
    std::fs::create_dir_all(path).unwrap();
}

#[tokio::test]
async fn test_queued_repair_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("postblob");
    let state = AppState::init(Some(root.clone()), Some(replicated_config(&root))).unwrap();

    let bucket = BucketName::new("messages").unwrap();
    let data = Bytes::from("Subject: hello");
    let id = BlobId::of(&data);

    {
        let service = ServiceState::from_app_state(&state).await.unwrap();
        break_store(&root.join("secondary"));

        service
            .store()
            .save(&bucket, &id, data.clone())
            .await
            .unwrap();
        assert_eq!(service.event_bus().pending_count().await.unwrap(), 1);
    }

    fix_store(&root.join("secondary"));

    let state = AppState::load(Some(root.clone())).unwrap();
    let service = ServiceState::from_app_state(&state).await.unwrap();
    let listener = service.repair_listener().unwrap();
    let report = service
        .event_bus()
        .dispatch_pending(&**listener)
        .await
        .unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(service.event_bus().pending_count().await.unwrap(), 0);

    let secondary = ObjectStoreDao::new(ObjectStoreConfig::Local {
        path: root.join("secondary"),
    })
    .await
    .unwrap();
    assert_eq!(
        secondary
            .read_bytes(&BucketName::new("messages-eu").unwrap(), &id)
            .await
            .unwrap(),
        data
    );
}

#[tokio::test]
async fn test_registry_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("postblob");
    let state = AppState::init(Some(root.clone()), Some(replicated_config(&root))).unwrap();

    let bucket = BucketName::default_bucket();
    let data = Bytes::from("attachment");
    let id = BlobId::of(&data);

    ServiceState::from_app_state(&state)
        .await
        .unwrap()
        .store()
        .save(&bucket, &id, data.clone())
        .await
        .unwrap();

    let service = ServiceState::from_app_state(&state).await.unwrap();
    let err = service.store().save(&bucket, &id, data).await.unwrap_err();
    assert!(matches!(
        err,
        object_store::BlobStoreError::DuplicateSave(_)
    ));
}

#[tokio::test]
async fn test_plain_config_has_no_repair_worker() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::init(Some(dir.path().join("postblob")), None).unwrap();

    let service = ServiceState::from_app_state(&state).await.unwrap();

    assert!(service.repair_listener().is_none());
    assert!(postblob_daemon::start_repair_worker(&service).is_err());
}
