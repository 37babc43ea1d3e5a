//! Repository integration tests against a live PostgreSQL instance.
//!
//! Run with `DATABASE_URL` pointing at a scratch database:
//! `cargo test -p dbpulse-db -- --ignored`

use chrono::Utc;

use dbpulse_core::action::{Action, ActionStatus};
use dbpulse_core::detection::{Detection, DetectionCategory, DetectionSeverity};
use dbpulse_db::repositories::{ActionRepo, DetectionRepo};
use dbpulse_db::DbPool;

async fn pool() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
    let pool = dbpulse_db::create_pool(&url).await.expect("connect");
    dbpulse_db::run_migrations(&pool).await.expect("migrate");
    pool
}

fn detection(database_id: &str) -> Detection {
    let mut d = Detection::new(
        "low_cache_hit_rate",
        DetectionCategory::Cache,
        DetectionSeverity::Warning,
        database_id,
        1_700_000_000,
    );
    d.title = "Low cache hit rate".into();
    d.description = "hit rate below floor".into();
    d.recommendation = "increase shared_buffers".into();
    d.assign_key();
    d
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn active_key_is_unique() {
    let pool = pool().await;
    let database_id = format!("it-{}", uuid_suffix());
    let now = Utc::now();

    let first = detection(&database_id);
    DetectionRepo::insert_active(&pool, &first, now)
        .await
        .expect("first insert");

    // Second active insert under the same key hits the partial unique index.
    let second = detection(&database_id);
    let err = DetectionRepo::insert_active(&pool, &second, now)
        .await
        .expect_err("duplicate active insert must fail");
    match err {
        sqlx::Error::Database(db) => assert_eq!(db.code().as_deref(), Some("23505")),
        other => panic!("expected a unique violation, got {other:?}"),
    }

    // After resolving, the key is free again.
    assert!(
        DetectionRepo::resolve(&pool, &first.id, "fixed", now + chrono::Duration::seconds(300))
            .await
            .unwrap()
    );
    DetectionRepo::insert_active(&pool, &second, now)
        .await
        .expect("insert after resolve");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn action_status_guard_rejects_regressions() {
    let pool = pool().await;
    let database_id = format!("it-{}", uuid_suffix());
    let now = Utc::now();

    let d = detection(&database_id);
    DetectionRepo::insert_active(&pool, &d, now).await.unwrap();

    let action = Action::queued(&d.id, &d.key, "cache_optimization_recommendation", &database_id);
    ActionRepo::insert(&pool, &action).await.unwrap();

    assert!(
        ActionRepo::update_status(&pool, &action.id, ActionStatus::Completed, "done", None, now)
            .await
            .unwrap()
    );
    // Terminal state cannot move back to executing.
    assert!(
        !ActionRepo::update_status(&pool, &action.id, ActionStatus::Executing, "late", None, now)
            .await
            .unwrap()
    );

    let row = ActionRepo::get_by_id(&pool, &action.id).await.unwrap().unwrap();
    assert_eq!(row.status, "completed");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance"]
async fn expired_terminal_records_are_purged() {
    let pool = pool().await;
    let database_id = format!("it-{}", uuid_suffix());
    let now = Utc::now();

    let d = detection(&database_id);
    DetectionRepo::insert_active(&pool, &d, now).await.unwrap();
    DetectionRepo::resolve(&pool, &d.id, "fixed", now - chrono::Duration::seconds(1))
        .await
        .unwrap();

    let purged = DetectionRepo::delete_expired(&pool, now).await.unwrap();
    assert!(purged >= 1);
    assert!(DetectionRepo::find_active_by_key(&pool, &d.key)
        .await
        .unwrap()
        .is_none());
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
