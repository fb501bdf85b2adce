//! Integration tests for background sync.
//!
//! Services write through a real engine handle; the engine pushes to the
//! in-memory remote.

use super::fixtures::{test_app, test_app_with_store};
use std::time::Duration;
use tinysteps::storage::{EntityKind, SyncSettings};
use tinysteps::sync::{
    InMemoryMediaStore, InMemoryRemoteStore, SyncEngine, SyncEvent, SyncReport,
};
use tinysteps::{LocalStore, NewActivity};
use tokio::sync::broadcast;

type Engine = SyncEngine<InMemoryRemoteStore, InMemoryMediaStore>;

fn engine(store: &LocalStore) -> Engine {
    SyncEngine::new(
        store.clone(),
        InMemoryRemoteStore::new(),
        InMemoryMediaStore::new(),
        SyncSettings::default(),
    )
}

/// Wait for the next completed pass.
async fn next_pass(events: &mut broadcast::Receiver<SyncEvent>) -> SyncReport {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SyncEvent::PassCompleted(report)) => return report,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("engine dropped"),
            }
        }
    })
    .await
    .expect("no pass completed in time")
}

#[tokio::test]
async fn test_offline_writes_sync_when_connectivity_returns() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let handle = engine.handle();
    handle.set_online(false);

    let app = test_app_with_store(store.clone(), Some(handle.clone()));
    for minutes in [6, 6, 10] {
        app.services
            .activities
            .save_activity(NewActivity::minutes(app.owner, "reading", minutes))
            .unwrap();
    }

    let mut events = engine.subscribe();
    engine.start().unwrap();
    assert_eq!(store.count_unsynced(EntityKind::Activities).unwrap(), 3);

    handle.set_online(true);
    let report = next_pass(&mut events).await;
    assert_eq!(report.failed, 0);

    let status = engine.status().unwrap();
    assert_eq!(status.total_pending(), 0);
    assert_eq!(engine.remote().len("activities"), 3);
    assert_eq!(engine.remote().len("users"), 1);

    let user = engine
        .remote()
        .document("users", &app.owner.to_string())
        .unwrap();
    assert_eq!(user["points"], 15);

    engine.shutdown().await;
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_local_write_triggers_pass() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let mut events = engine.subscribe();

    let app = test_app_with_store(store.clone(), Some(engine.handle()));
    engine.start().unwrap();

    app.services
        .activities
        .save_activity(NewActivity::new(app.owner, "affection", 0))
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while engine.remote().len("activities") == 0 {
        assert!(tokio::time::Instant::now() < deadline, "activity never pushed");
        next_pass(&mut events).await;
    }

    assert!(engine.remote().len("achievements") >= 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_remote_failure_is_retried_next_pass() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let app = test_app_with_store(store.clone(), None);

    let record = app
        .services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    engine.remote().fail_ids([record.envelope.id.to_string()]);

    let first = engine.force_sync().await;
    assert_eq!(first.report().unwrap().failed, 1);
    assert_eq!(store.count_unsynced(EntityKind::Activities).unwrap(), 1);
    assert_eq!(engine.status().unwrap().recent_errors.len(), 1);

    engine.remote().clear_failures();
    let second = engine.force_sync().await;
    assert!(second.report().unwrap().is_clean());
    assert_eq!(engine.status().unwrap().total_pending(), 0);
}

#[tokio::test]
async fn test_restore_after_sign_out() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let app = test_app_with_store(store.clone(), None);

    app.services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    engine.force_sync().await;

    app.services.accounts.sign_out(app.owner).unwrap();
    assert!(app.services.accounts.user(app.owner).is_err());

    let restored = engine.restore_owner(app.owner).await.unwrap();
    assert_eq!(restored.get(&EntityKind::Users), Some(&1));
    assert_eq!(restored.get(&EntityKind::Activities), Some(&1));

    let user = app.services.accounts.user(app.owner).unwrap();
    assert_eq!(user.points, 10);
    assert_eq!(engine.status().unwrap().total_pending(), 0);
}

#[tokio::test]
async fn test_restore_keeps_remote_points_after_fresh_sign_in() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let app = test_app_with_store(store.clone(), None);

    app.services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    engine.force_sync().await;

    // Signing back in before restoring leaves an empty local aggregate.
    app.services.accounts.sign_out(app.owner).unwrap();
    let fresh = app.services.accounts.sign_in(app.owner, None).unwrap();
    assert_eq!(fresh.points, 0);

    let restored = engine.restore_owner(app.owner).await.unwrap();
    assert_eq!(restored.get(&EntityKind::Users), Some(&1));
    assert_eq!(app.services.accounts.user(app.owner).unwrap().points, 10);

    engine.force_sync().await;
    let user = engine
        .remote()
        .document("users", &app.owner.to_string())
        .unwrap();
    assert_eq!(user["points"], 10);
    assert_eq!(user["totalActivities"], 1);
}

#[tokio::test]
async fn test_restore_keeps_local_progress() {
    let store = LocalStore::open_in_memory().unwrap();
    let engine = engine(&store);
    let app = test_app_with_store(store.clone(), None);

    app.services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    engine.force_sync().await;
    app.services
        .activities
        .save_activity(NewActivity::new(app.owner, "affection", 0))
        .unwrap();
    let local = app.services.accounts.user(app.owner).unwrap();

    let restored = engine.restore_owner(app.owner).await.unwrap();
    assert_eq!(restored.get(&EntityKind::Users), Some(&0));
    assert_eq!(app.services.accounts.user(app.owner).unwrap(), local);
}

#[test]
fn test_services_work_without_engine() {
    let app = test_app(None);
    let record = app
        .services
        .activities
        .save_activity(NewActivity::minutes(app.owner, "reading", 10))
        .unwrap();
    assert!(!record.envelope.synced);
}
