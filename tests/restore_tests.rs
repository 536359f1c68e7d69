mod common;

use common::{Harness, record, store};
use purchase_coordinator::domain::outcome::TransactionStatus;
use purchase_coordinator::domain::purchase::{PurchaseKind, PurchaseState, TransactionId};
use purchase_coordinator::error::BillingError;
use purchase_coordinator::infrastructure::channel_sink::BridgeEvent;
use purchase_coordinator::infrastructure::in_memory::InMemoryBillingProvider;

fn provider_with_history() -> InMemoryBillingProvider {
    store()
        .purchase(record("sword", "GPA.1000", PurchaseKind::Managed, PurchaseState::Purchased))
        .purchase(record("shield", "GPA.1001", PurchaseKind::Managed, PurchaseState::Cancelled))
        .purchase(record("potion", "GPA.1002", PurchaseKind::Consumable, PurchaseState::Refunded))
        .purchase(record("potion", "GPA.1003", PurchaseKind::Consumable, PurchaseState::Purchased))
        .build()
}

#[tokio::test]
async fn test_restore_all_managed_requires_history() {
    let mut harness = Harness::ready(provider_with_history()).await;

    let result = harness.coordinator.restore_all_managed().await;

    assert!(matches!(result, Err(BillingError::PreconditionViolation(_))));
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn test_restore_all_managed_maps_states() {
    let mut harness = Harness::ready(provider_with_history()).await;
    harness.coordinator.request_catalog(["sword"]).await.unwrap();
    harness.drain();

    let outcomes = harness.coordinator.restore_all_managed().await.unwrap();

    let statuses: Vec<_> = outcomes
        .iter()
        .map(|o| (o.transaction_id.clone().unwrap(), o.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (TransactionId::new("GPA.1000"), TransactionStatus::Restored),
            (TransactionId::new("GPA.1001"), TransactionStatus::Cancelled),
        ]
    );
    assert_eq!(harness.drain().len(), 2);
}

#[tokio::test]
async fn test_refunded_consumable_carries_its_ids() {
    let mut harness = Harness::ready(provider_with_history()).await;
    harness.coordinator.refresh_purchase_history().await.unwrap();

    let outcomes = harness.coordinator.restore_all_consumables().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, TransactionStatus::Refunded);
    assert_eq!(outcomes[0].product_id.as_str(), "potion");
    assert_eq!(outcomes[0].transaction_id, Some(TransactionId::new("GPA.1002")));
    assert_eq!(outcomes[1].status, TransactionStatus::Resumed);

    let events = harness.drain();
    assert_eq!(
        events.first(),
        Some(&BridgeEvent::TransactionStatusUpdated(outcomes[0].clone()))
    );
}

#[tokio::test]
async fn test_restore_managed_skips_unmatched_ids() {
    let harness = Harness::ready(provider_with_history()).await;
    harness.coordinator.refresh_purchase_history().await.unwrap();

    let outcomes = harness
        .coordinator
        .restore_managed(["GPA.1001", "GPA.missing", "GPA.1003", "GPA.1000"])
        .await
        .unwrap();

    let replayed: Vec<_> = outcomes
        .iter()
        .map(|o| (o.transaction_id.clone().unwrap(), o.status))
        .collect();
    // GPA.1003 is a consumable and is not restored here.
    assert_eq!(
        replayed,
        vec![
            (TransactionId::new("GPA.1001"), TransactionStatus::Cancelled),
            (TransactionId::new("GPA.1000"), TransactionStatus::Resumed),
        ]
    );
}

#[tokio::test]
async fn test_restore_without_history_replays_nothing() {
    let harness = Harness::ready(provider_with_history()).await;

    assert!(harness.coordinator.restore_managed(["GPA.1000"]).await.unwrap().is_empty());
    assert!(harness.coordinator.restore_all_consumables().await.unwrap().is_empty());
    assert_eq!(harness.provider.history_fetch_count(), 0);
}

#[tokio::test]
async fn test_session_purchases_join_the_history() {
    let harness = Harness::ready(store().build()).await;
    harness.coordinator.request_catalog(["sword", "shield"]).await.unwrap();

    harness
        .coordinator
        .purchase("sword", PurchaseKind::Managed)
        .await
        .unwrap();
    let outcomes = harness.coordinator.restore_all_managed().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, TransactionStatus::Restored);
    assert_eq!(outcomes[0].product_id.as_str(), "sword");
}

#[tokio::test]
async fn test_consumed_purchase_leaves_the_history() {
    let harness = Harness::ready(store().build()).await;
    harness.coordinator.refresh_purchase_history().await.unwrap();
    harness
        .coordinator
        .purchase("shield", PurchaseKind::Consumable)
        .await
        .unwrap();
    harness
        .coordinator
        .close_transaction("shield", "GPA.0001")
        .await
        .unwrap();

    assert!(harness.coordinator.restore_all_consumables().await.unwrap().is_empty());
}
