//! Concurrency E2E tests.
//!
//! Personal writes racing a sync pass are never lost, and readers only
//! ever see a fully published store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{KeywordEmbedder, TestHarness, DIMENSION};
use memory_scheduler::{
    create_sync_job, JobResult, SchedulerConfig, SchedulerService, SyncJobConfig, SYNC_JOB_NAME,
};
use memory_types::Origin;

const NOTES: usize = 6;

fn write_notes(harness: &TestHarness) {
    for i in 0..NOTES {
        harness.write_note(&format!("note{}.md", i), &format!("Note {} is about travel.", i));
    }
}

/// `add_personal` calls issued while a slow rebuild is in flight all land
/// in the final store alongside the rebuilt corpus segment.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_add_personal_during_sync_is_not_lost() {
    let harness =
        TestHarness::with_embedder(KeywordEmbedder::new().with_delay(Duration::from_millis(20)));
    write_notes(&harness);
    let service = harness.service();

    let syncing = {
        let service = service.clone();
        tokio::spawn(async move { service.sync().await })
    };

    let mut writers = Vec::new();
    for i in 0..5 {
        let service = service.clone();
        writers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10 * i)).await;
            service.add_personal(&format!("personal fact {}", i)).await
        }));
    }

    assert_eq!(syncing.await.unwrap().unwrap(), NOTES);
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let store = service.store().snapshot();
    assert_eq!(store.count_by_origin(Origin::Corpus), NOTES);
    assert_eq!(store.count_by_origin(Origin::Personal), 5);
    for i in 0..5 {
        assert!(store.contains_text(&format!("personal fact {}", i)));
    }

    // What is on disk matches what is in memory
    let on_disk = harness.persistence().load().loaded().unwrap();
    assert_eq!(on_disk.to_parts(), store.to_parts());
}

/// Readers running throughout a rebuild see either none or all of the
/// corpus segment, never a partial one.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_rebuild() {
    let harness =
        TestHarness::with_embedder(KeywordEmbedder::new().with_delay(Duration::from_millis(10)));
    write_notes(&harness);
    let service = harness.service();
    service.add_personal("I like tea").await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let service = service.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut observations = 0;
            while !done.load(Ordering::SeqCst) {
                let store = service.store().snapshot();
                let corpus = store.count_by_origin(Origin::Corpus);
                assert!(corpus == 0 || corpus == NOTES, "saw {} corpus records", corpus);
                assert_eq!(store.count_by_origin(Origin::Personal), 1);
                assert!(store.records().all(|r| r.vector.len() == DIMENSION));
                observations += 1;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            observations
        })
    };

    service.sync().await.unwrap();
    done.store(true, Ordering::SeqCst);
    assert!(reader.await.unwrap() > 0);
    assert_eq!(service.status().corpus, NOTES);
}

/// The periodic job picks up vault changes without any manual sync.
#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_sync_follows_vault() {
    let harness = TestHarness::new();
    harness.write_note("Alpha.md", "Alpha note.");
    let service = harness.service();

    let scheduler = SchedulerService::new(SchedulerConfig::default());
    create_sync_job(
        &scheduler,
        service.clone(),
        SyncJobConfig::default()
            .with_interval(1)
            .with_retry_backoff(1)
            .with_run_immediately(true),
    )
    .await
    .unwrap();
    scheduler.start().await.unwrap();

    wait_until(|| service.status().corpus == 1).await;
    harness.write_note("Beta.md", "Beta note.");
    wait_until(|| service.status().corpus == 2).await;

    scheduler.shutdown().await.unwrap();

    let status = scheduler.registry().get_status(SYNC_JOB_NAME).unwrap();
    assert!(status.run_count >= 2);
    assert_eq!(status.last_result, Some(JobResult::Success));
}

/// A failing pass inside the scheduler is contained and retried.
#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_sync_recovers_from_failure() {
    let harness = TestHarness::new();
    harness.write_note("Alpha.md", "Alpha note.");
    harness.embedder.set_failing(true);
    let service = harness.service();

    let scheduler = SchedulerService::new(SchedulerConfig::default());
    create_sync_job(
        &scheduler,
        service.clone(),
        SyncJobConfig::default()
            .with_interval(3600)
            .with_retry_backoff(1)
            .with_run_immediately(true),
    )
    .await
    .unwrap();
    scheduler.start().await.unwrap();

    let registry = scheduler.registry();
    wait_until(|| {
        registry
            .get_status(SYNC_JOB_NAME)
            .is_some_and(|s| s.error_count >= 1)
    })
    .await;
    harness.embedder.set_failing(false);
    wait_until(|| service.status().corpus == 1).await;

    scheduler.shutdown().await.unwrap();
    assert!(registry.get_status(SYNC_JOB_NAME).unwrap().error_count >= 1);
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 10s");
}
