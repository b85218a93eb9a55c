//! Order and item lifecycle rules

mod common;

use common::{espresso, ledger, order, tortilla};
use comanda_server::ledger::LedgerError;
use shared::models::{ItemState, OrderState};
use shared::sync::OrderPatch;

fn state_patch(state: OrderState) -> OrderPatch {
    OrderPatch {
        state: Some(state),
        ..Default::default()
    }
}

#[tokio::test]
async fn forward_transitions_and_skips() {
    let ledger = ledger().await;
    let (created, _) = ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    assert_eq!(created.state, OrderState::Pending);

    let updated = ledger
        .update_order("o1", &state_patch(OrderState::InProgress))
        .await
        .unwrap();
    assert_eq!(updated.state, OrderState::InProgress);

    // skipping ready is allowed
    let updated = ledger
        .update_order("o1", &state_patch(OrderState::Delivered))
        .await
        .unwrap();
    assert_eq!(updated.state, OrderState::Delivered);
}

#[tokio::test]
async fn regression_is_rejected() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    ledger
        .update_order("o1", &state_patch(OrderState::Ready))
        .await
        .unwrap();

    let err = ledger
        .update_order("o1", &state_patch(OrderState::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition(_)));

    // order unchanged after the rejected write
    let order = ledger.get_order("o1").await.unwrap();
    assert_eq!(order.state, OrderState::Ready);
}

#[tokio::test]
async fn terminal_states_are_final() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    ledger
        .update_order("o1", &state_patch(OrderState::Cancelled))
        .await
        .unwrap();

    let err = ledger
        .update_order("o1", &state_patch(OrderState::InProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition(_)));
}

#[tokio::test]
async fn delivered_cascades_to_items() {
    let ledger = ledger().await;
    let (created, _) = ledger
        .create_or_get_order(order("o1", vec![espresso(1), tortilla(1), espresso(2)]))
        .await
        .unwrap();

    // one item already moving
    ledger
        .update_item_state("o1", &created.items[0].id, ItemState::InProgress)
        .await
        .unwrap();

    let delivered = ledger
        .update_order("o1", &state_patch(OrderState::Delivered))
        .await
        .unwrap();
    assert!(
        delivered
            .items
            .iter()
            .all(|i| i.state == ItemState::Delivered)
    );
}

#[tokio::test]
async fn item_states_never_regress() {
    let ledger = ledger().await;
    let (created, _) = ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    let item_id = created.items[0].id.clone();

    ledger
        .update_item_state("o1", &item_id, ItemState::Ready)
        .await
        .unwrap();

    let err = ledger
        .update_item_state("o1", &item_id, ItemState::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidItemTransition { .. }));

    // replaying the current state is a no-op, not an error
    let order = ledger
        .update_item_state("o1", &item_id, ItemState::Ready)
        .await
        .unwrap();
    assert_eq!(order.items[0].state, ItemState::Ready);
}

#[tokio::test]
async fn item_update_leaves_siblings_alone() {
    let ledger = ledger().await;
    let (created, _) = ledger
        .create_or_get_order(order("o1", vec![espresso(1), tortilla(1)]))
        .await
        .unwrap();

    let first = created.items[0].id.clone();
    let order = ledger
        .update_item_state("o1", &first, ItemState::InProgress)
        .await
        .unwrap();

    let other = order.items.iter().find(|i| i.id != first).unwrap();
    assert_eq!(other.state, ItemState::Pending);
}

#[tokio::test]
async fn version_bumps_on_every_write() {
    let ledger = ledger().await;
    let (created, _) = ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();

    let updated = ledger
        .update_order(
            "o1",
            &OrderPatch {
                notes: Some("rush".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.version > created.version);
    assert_eq!(updated.notes.as_deref(), Some("rush"));
}
