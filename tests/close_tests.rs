mod common;

use common::{Harness, record, store};
use purchase_coordinator::domain::outcome::CloseResult;
use purchase_coordinator::domain::purchase::{PurchaseKind, PurchaseState};
use purchase_coordinator::infrastructure::channel_sink::BridgeEvent;

fn closed(events: &[BridgeEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::TransactionClosed { .. }))
        .count()
}

#[tokio::test]
async fn test_closing_unknown_transaction_still_emits_closed() {
    let mut harness = Harness::ready(store().build()).await;

    let result = harness
        .coordinator
        .close_transaction("sword", "GPA.4242")
        .await
        .unwrap();

    assert_eq!(result, CloseResult::NotPending);
    assert_eq!(
        harness.drain(),
        vec![BridgeEvent::TransactionClosed {
            product_id: "sword".into(),
            transaction_id: "GPA.4242".into(),
        }]
    );
    assert_eq!(harness.provider.consume_count(), 0);
}

#[tokio::test]
async fn test_closing_consumable_consumes_it() {
    let mut harness = Harness::ready(store().build()).await;
    let outcome = harness
        .coordinator
        .purchase("sword", PurchaseKind::Consumable)
        .await
        .unwrap();
    let transaction_id = outcome.transaction_id.unwrap();

    let result = harness
        .coordinator
        .close_transaction("sword", transaction_id.clone())
        .await
        .unwrap();

    assert_eq!(result, CloseResult::Consumed);
    assert_eq!(harness.provider.consume_count(), 1);
    assert!(harness.provider.purchase_history().await.is_empty());
    assert!(harness.coordinator.pending_transactions().await.unwrap().is_empty());
    assert_eq!(closed(&harness.drain()), 1);

    // Consumed, so it can be bought again.
    let again = harness
        .coordinator
        .purchase("sword", PurchaseKind::Consumable)
        .await
        .unwrap();
    assert_ne!(again.transaction_id, Some(transaction_id));
}

#[tokio::test]
async fn test_consume_failure_still_closes() {
    let provider = store().consume_failure("GPA.0001").build();
    let mut harness = Harness::ready(provider).await;
    harness
        .coordinator
        .purchase("shield", PurchaseKind::Consumable)
        .await
        .unwrap();

    let result = harness
        .coordinator
        .close_transaction("shield", "GPA.0001")
        .await
        .unwrap();

    assert_eq!(result, CloseResult::ConsumeFailed);
    assert_eq!(closed(&harness.drain()), 1);
    assert!(harness.coordinator.pending_transactions().await.unwrap().is_empty());
    // The provider still holds the purchase.
    assert_eq!(harness.provider.purchase_history().await.len(), 1);
}

#[tokio::test]
async fn test_closing_managed_skips_consume() {
    let mut harness = Harness::ready(store().build()).await;
    harness
        .coordinator
        .purchase("sword", PurchaseKind::Managed)
        .await
        .unwrap();

    let result = harness
        .coordinator
        .close_transaction("sword", "GPA.0001")
        .await
        .unwrap();

    assert_eq!(result, CloseResult::Released);
    assert_eq!(harness.provider.consume_count(), 0);
    assert_eq!(harness.provider.purchase_history().await.len(), 1);
    assert_eq!(closed(&harness.drain()), 1);
}

#[tokio::test]
async fn test_second_close_finds_nothing_pending() {
    let mut harness = Harness::ready(store().build()).await;
    harness
        .coordinator
        .purchase("sword", PurchaseKind::Consumable)
        .await
        .unwrap();

    let first = harness.coordinator.close_transaction("sword", "GPA.0001");
    let second = harness.coordinator.close_transaction("sword", "GPA.0001");

    assert_eq!(second.await.unwrap(), CloseResult::NotPending);
    assert_eq!(first.await.unwrap(), CloseResult::Consumed);
    assert_eq!(harness.provider.consume_count(), 1);
    assert_eq!(closed(&harness.drain()), 2);
}

#[tokio::test]
async fn test_replayed_purchase_is_registered_once() {
    let provider = store()
        .purchase(record("shield", "GPA.7000", PurchaseKind::Consumable, PurchaseState::Purchased))
        .build();
    let harness = Harness::ready(provider).await;
    harness.coordinator.refresh_purchase_history().await.unwrap();

    harness.coordinator.restore_all_consumables().await.unwrap();
    harness.coordinator.restore_all_consumables().await.unwrap();

    let pending = harness.coordinator.pending_transactions().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transaction_id.as_str(), "GPA.7000");
}

#[tokio::test]
async fn test_shutdown_returns_open_transactions() {
    let harness = Harness::ready(store().build()).await;
    harness
        .coordinator
        .purchase("sword", PurchaseKind::Managed)
        .await
        .unwrap();
    harness
        .coordinator
        .purchase("shield", PurchaseKind::Consumable)
        .await
        .unwrap();

    let open = harness.coordinator.shutdown().await.unwrap();

    let ids: Vec<&str> = open.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(ids, vec!["GPA.0001", "GPA.0002"]);
}
