//! Receiver outages and client restarts.

use crate::assertions::assert_no_loss;
use crate::harness::{client_at, outbox_path, RelayHarness};
use std::collections::HashSet;
use std::time::Duration;
use sync_client::{DrainReport, FailureReason};
use sync_types::{ExpensePayload, RecordId};

const DAY: i64 = 1_700_000_000_000;

async fn pending_ids(client: &crate::harness::TestClient) -> HashSet<RecordId> {
    client
        .pending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

// ============================================================================
// Receiver down
// ============================================================================

#[tokio::test]
async fn receiver_down_loses_nothing() {
    let relay = RelayHarness::down().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();

    let mut captured = Vec::new();
    for amount in [1.0, 2.0, 3.0] {
        captured.push(
            client
                .record_expense(ExpensePayload::new(amount, "Food", DAY))
                .await
                .unwrap(),
        );
    }

    let report = client.sync_now().await;

    assert!(matches!(
        report,
        DrainReport::Failed {
            reason: FailureReason::NetworkUnreachable(_),
            attempt: 1,
            ..
        }
    ));
    assert_eq!(pending_ids(&client).await.len(), 3);
    assert_no_loss(&captured, &HashSet::new(), &pending_ids(&client).await);
}

#[tokio::test]
async fn background_loop_delivers_after_receiver_recovers() {
    let mut relay = RelayHarness::down().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();

    let captured = vec![
        client
            .record_expense(ExpensePayload::new(8.0, "Travel", DAY))
            .await
            .unwrap(),
        client
            .record_expense(ExpensePayload::new(2.5, "Coffee", DAY))
            .await
            .unwrap(),
    ];
    let _running = client.start();

    // Let the loop fail at least once against the closed port.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.queue_size().await.unwrap(), 2);

    relay.bring_up().await.unwrap();

    let mut delivered = HashSet::new();
    for _ in 0..100 {
        delivered = relay.stored_ids().await.unwrap();
        if delivered.len() == captured.len() && client.queue_size().await.unwrap() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_no_loss(&captured, &delivered, &HashSet::new());
}

#[tokio::test]
async fn reconnect_edge_drains_immediately() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = client_at(&relay.base_url(), &outbox_path(&dir), false).unwrap();
    let _running = client.start();

    client
        .record_expense(ExpensePayload::new(4.0, "Food", DAY))
        .await
        .unwrap();
    assert!(matches!(client.sync_now().await, DrainReport::Skipped(_)));

    client.monitor().report(true);

    for _ in 0..100 {
        if client.queue_size().await.unwrap() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_eq!(relay.stored_count().await.unwrap(), 1);
}

// ============================================================================
// Client restart
// ============================================================================

#[tokio::test]
async fn outbox_survives_client_restart() {
    let relay = RelayHarness::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let captured = {
        let offline = client_at(&relay.base_url(), &outbox_path(&dir), false).unwrap();
        vec![
            offline
                .record_expense(ExpensePayload::new(1.0, "Food", DAY))
                .await
                .unwrap(),
            offline
                .record_expense(ExpensePayload::new(2.0, "Food", DAY))
                .await
                .unwrap(),
        ]
    };

    let restarted = client_at(&relay.base_url(), &outbox_path(&dir), true).unwrap();
    assert_eq!(restarted.queue_size().await.unwrap(), 2);

    let report = restarted.sync_now().await;

    assert!(matches!(report, DrainReport::Delivered { accepted: 2, .. }));
    assert_no_loss(
        &captured,
        &relay.stored_ids().await.unwrap(),
        &HashSet::new(),
    );
}
