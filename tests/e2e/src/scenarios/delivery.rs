//! Normal delivery, resubmission, and receiver-side rejection.

use crate::assertions::assert_no_loss;
use crate::harness::{client_at, outbox_path, RelayHarness};
use std::collections::HashSet;
use sync_client::{DrainEvent, DrainReport};
use sync_relay::config::Config;
use sync_types::{ExpensePayload, QueuedRecord, RecordId};

const DAY: i64 = 1_700_000_000_000;

fn expense(amount: f64, category: &str) -> ExpensePayload {
    ExpensePayload::new(amount, category, DAY)
}

// ============================================================================
// Full drain
// ============================================================================

#[tokio::test]
async fn drain_delivers_every_record_and_empties_outbox() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();

    let mut captured = Vec::new();
    for (amount, category) in [(12.5, "Food"), (40.0, "Travel"), (3.2, "Coffee")] {
        captured.push(client.record_expense(expense(amount, category)).await.unwrap());
    }

    let report = client.sync_now().await;

    assert_eq!(
        report,
        DrainReport::Delivered {
            accepted: 3,
            rejected: 0,
            retained: 0
        }
    );
    assert_eq!(client.queue_size().await.unwrap(), 0);

    let stored = relay.stored_ids().await.unwrap();
    assert_eq!(stored, captured.iter().cloned().collect::<HashSet<_>>());
}

#[tokio::test]
async fn sync_complete_event_reaches_subscribers() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();
    let mut events = client.subscribe_events();

    client.record_expense(expense(1.0, "Misc")).await.unwrap();
    client.sync_now().await;

    assert_eq!(
        events.recv().await.unwrap(),
        DrainEvent::Drained {
            accepted: 1,
            rejected: 0
        }
    );
}

// ============================================================================
// Idempotent resubmission
// ============================================================================

#[tokio::test]
async fn resubmitted_record_is_stored_once() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();
    let record = QueuedRecord::new(RecordId::from("same-id"), expense(9.0, "Food"), DAY);

    // Delivered once, then captured again as if the first ack was lost.
    client.enqueue(record.clone()).await.unwrap();
    client.sync_now().await;
    client.enqueue(record).await.unwrap();
    let report = client.sync_now().await;

    assert!(matches!(report, DrainReport::Delivered { accepted: 1, .. }));
    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_eq!(relay.stored_count().await.unwrap(), 1);
}

// ============================================================================
// Rejection
// ============================================================================

#[tokio::test]
async fn invalid_record_is_rejected_and_leaves_outbox() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();
    let mut events = client.subscribe_events();

    let good = client.record_expense(expense(5.0, "Food")).await.unwrap();
    let bad = client.record_expense(expense(-5.0, "Food")).await.unwrap();

    let report = client.sync_now().await;

    assert_eq!(
        report,
        DrainReport::Delivered {
            accepted: 1,
            rejected: 1,
            retained: 0
        }
    );
    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_eq!(
        relay.stored_ids().await.unwrap(),
        HashSet::from([good])
    );
    match events.recv().await.unwrap() {
        DrainEvent::RecordsRejected { rejections } => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].id, bad);
        }
        other => panic!("expected rejection event, got {:?}", other),
    }
}

#[tokio::test]
async fn wrong_token_keeps_everything_queued() {
    let mut config = Config::default();
    config.server.auth_token = Some("relay-token".into());
    let relay = RelayHarness::start_with(config).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();

    let captured = vec![client.record_expense(expense(1.0, "Food")).await.unwrap()];
    let report = client.sync_now().await;

    assert!(matches!(report, DrainReport::Failed { .. }));
    let pending: HashSet<_> = client
        .pending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_no_loss(&captured, &HashSet::new(), &pending);
    assert_eq!(relay.stored_count().await.unwrap(), 0);
}
