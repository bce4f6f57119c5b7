//! Concurrency tests: competing processors over one database file.

use std::collections::HashSet;
use std::time::Duration;

use inbox_core::{Error, ItemError, ItemStatus, PipelineOutcome, StageKind};
use integration_tests::{fixtures, setup::TestContext};
use queue_store::{StatusUpdate, UpdateResult};
use tokio::sync::watch;
use uuid::Uuid;
use worker::{ClaimManager, Recovery, StatusResolver};

/// Two processors racing for a single pending item.
#[tokio::test]
async fn test_single_item_claimed_once() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let id = ctx.receive(&server, fixtures::text_message("only one")).await;

    let a = ctx.processor();
    let b = ctx.processor_on(ctx.second_store());
    let (_tx, rx) = watch::channel(false);

    let (first, second) = tokio::join!(a.run_once(&rx), b.run_once(&rx));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.claimed + second.claimed, 1);
    assert_eq!(first.completed + second.completed, 1);

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.attempt_count, 1);
    assert_eq!(ctx.mocks.notes.notes().len(), 1);
    assert_eq!(ctx.mocks.notifier.replies().len(), 1);
}

#[tokio::test]
async fn test_parallel_processors_split_the_queue() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut ids = Vec::new();
    for n in 0..12 {
        ids.push(
            ctx.receive(&server, fixtures::text_message(&format!("message {}", n)))
                .await,
        );
    }

    let a = ctx.processor();
    let b = ctx.processor_on(ctx.second_store());
    let (_tx, rx) = watch::channel(false);

    let (first, second) = tokio::join!(a.drain(&rx), b.drain(&rx));
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.completed + second.completed, 12);

    for id in &ids {
        let item = ctx.item(*id).await;
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.attempt_count, 1, "item {} processed twice", id);
    }

    let bodies: HashSet<String> = ctx
        .mocks
        .notes
        .notes()
        .into_iter()
        .map(|note| note.body)
        .collect();
    assert_eq!(bodies.len(), 12);
    assert_eq!(ctx.mocks.notes.notes().len(), 12);
}

/// A stale update for a claim already finalized is rejected.
#[tokio::test]
async fn test_finalize_is_idempotent() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let id = ctx.receive(&server, fixtures::text_message("once")).await;

    let claims = ClaimManager::new(ctx.store.clone(), Uuid::new_v4());
    let pending = ctx.item(id).await;
    let claimed = claims.claim(&pending).await.unwrap().expect("claim wins");

    let resolver = StatusResolver::new(ctx.store.clone(), ctx.mocks.notifier.clone(), true);
    let failure = ItemError::new(StageKind::ResolveContent, "404 Not Found");

    let first = resolver
        .finalize(&claimed, PipelineOutcome::Failed(failure.clone()))
        .await
        .unwrap();
    assert_eq!(first.status, ItemStatus::Failed);

    let second = resolver
        .finalize(&claimed, PipelineOutcome::Failed(failure))
        .await;
    assert!(matches!(second, Err(Error::InternalConsistency { .. })));

    let update = ctx
        .store
        .update_status(StatusUpdate::release(id, claimed.attempt_count))
        .await
        .unwrap();
    match update {
        UpdateResult::Conflict { current } => assert_eq!(current, Some(ItemStatus::Failed)),
        UpdateResult::Applied(_) => panic!("terminal item released"),
    }

    assert_eq!(ctx.mocks.notifier.replies().len(), 1, "one notice per item");
}

/// Claim recovered as stale and reclaimed: only the new holder finalizes.
#[tokio::test]
async fn test_lost_claim_cannot_finalize() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let id = ctx.receive(&server, fixtures::text_message("contested")).await;

    let slow = ClaimManager::new(ctx.store.clone(), Uuid::new_v4());
    let pending = ctx.item(id).await;
    let stale_claim = slow.claim(&pending).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let recovery = Recovery::new(ctx.second_store(), 3);
    let report = recovery.recover_stale(Duration::ZERO).await.unwrap();
    assert_eq!(report.released, 1);

    let (_tx, rx) = watch::channel(false);
    let summary = ctx.processor_on(ctx.second_store()).run_once(&rx).await.unwrap();
    assert_eq!(summary.completed, 1);

    let resolver = StatusResolver::new(ctx.store.clone(), ctx.mocks.notifier.clone(), true);
    let late = resolver
        .finalize(
            &stale_claim,
            PipelineOutcome::Failed(ItemError::new(StageKind::Analyze, "too late")),
        )
        .await;
    assert!(late.is_err());

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.attempt_count, 2);
    assert!(item.error.is_none());
}
