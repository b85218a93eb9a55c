//! Whole-day close: aggregation, force-settling, atomicity

mod common;

use common::{TENANT, espresso, ledger, order, tortilla};
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
async fn close_aggregates_and_settles() {
    let ledger = ledger().await;

    // paid order: 2 espressos
    ledger
        .create_or_get_order(order("o1", vec![espresso(2)]))
        .await
        .unwrap();
    ledger
        .update_order("o1", &state_patch(OrderState::Paid))
        .await
        .unwrap();

    // still open at close time: 1 tortilla
    ledger
        .create_or_get_order(order("o2", vec![tortilla(1)]))
        .await
        .unwrap();

    // cancelled: must not count towards revenue
    ledger
        .create_or_get_order(order("o3", vec![espresso(10)]))
        .await
        .unwrap();
    ledger
        .update_order("o3", &state_patch(OrderState::Cancelled))
        .await
        .unwrap();

    let closed = ledger.close_day(TENANT).await.unwrap();

    assert_eq!(closed.tenant_id, TENANT);
    assert_eq!(closed.date, ledger.business_date_today());
    // 2 * 150 + 1 * 850, cancelled excluded
    assert_eq!(closed.total_revenue_cents, 1150);
    assert_eq!(closed.total_orders, 2);
    assert_eq!(closed.total_items, 3);
    // the snapshot archives everything, cancelled included
    assert_eq!(closed.snapshot.len(), 3);

    // the open order was force-settled
    let settled = ledger.get_order("o2").await.unwrap();
    assert_eq!(settled.state, OrderState::Paid);
    assert!(settled.items.iter().all(|i| i.state == ItemState::Delivered));

    // the cancelled order stays cancelled
    let cancelled = ledger.get_order("o3").await.unwrap();
    assert_eq!(cancelled.state, OrderState::Cancelled);

    // no active orders remain
    assert!(ledger.list_active_orders(TENANT).await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_carries_settled_states() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(2)]))
        .await
        .unwrap();
    ledger
        .create_or_get_order(order("o2", vec![tortilla(1)]))
        .await
        .unwrap();
    ledger
        .update_order("o2", &state_patch(OrderState::Cancelled))
        .await
        .unwrap();

    let closed = ledger.close_day(TENANT).await.unwrap();

    // the published snapshot shows the post-close truth, not the states
    // the orders had when the close began
    let settled = closed.snapshot.iter().find(|o| o.id == "o1").unwrap();
    assert_eq!(settled.state, OrderState::Paid);
    assert!(settled.items.iter().all(|i| i.state == ItemState::Delivered));

    let cancelled = closed.snapshot.iter().find(|o| o.id == "o2").unwrap();
    assert_eq!(cancelled.state, OrderState::Cancelled);

    // snapshot and ledger rows agree, version included
    let stored = ledger.get_order("o1").await.unwrap();
    assert_eq!(settled.state, stored.state);
    assert_eq!(settled.version, stored.version);
    assert_eq!(settled.updated_at, stored.updated_at);

    // and the archived record carries the same snapshot
    let archived = ledger
        .get_closed_day(TENANT, &closed.date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(archived.snapshot, closed.snapshot);
}

#[tokio::test]
async fn failed_close_rolls_back_force_settling() {
    let db = comanda_server::db::DbService::new_in_memory().await.unwrap();
    let ledger = comanda_server::ledger::LedgerService::new(
        db.pool.clone(),
        chrono_tz::Europe::Madrid,
    );
    ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();

    // make the closed-day insert fail after the force-settle updates ran
    sqlx::query(
        "CREATE TRIGGER reject_close BEFORE INSERT ON closed_days
         BEGIN SELECT RAISE(ABORT, 'storage failure'); END",
    )
    .execute(&db.pool)
    .await
    .unwrap();

    assert!(ledger.close_day(TENANT).await.is_err());

    // the whole transaction rolled back: nothing was settled
    let open = ledger.get_order("o1").await.unwrap();
    assert_eq!(open.state, OrderState::Pending);
    assert!(open.items.iter().all(|i| i.state == ItemState::Pending));
    assert_eq!(ledger.list_active_orders(TENANT).await.unwrap().len(), 1);

    // once the fault clears the day closes normally
    sqlx::query("DROP TRIGGER reject_close")
        .execute(&db.pool)
        .await
        .unwrap();
    let closed = ledger.close_day(TENANT).await.unwrap();
    assert_eq!(closed.total_orders, 1);
    assert!(ledger.list_active_orders(TENANT).await.unwrap().is_empty());
}

#[tokio::test]
async fn reclosing_a_day_changes_nothing() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    let closed = ledger.close_day(TENANT).await.unwrap();

    // a late order arrives after the close
    ledger
        .create_or_get_order(order("o2", vec![tortilla(1)]))
        .await
        .unwrap();

    let err = ledger.close_day(TENANT).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyClosed(_)));

    // the failed close mutated nothing: the late order is still open and
    // the stored summary is the original one
    let late = ledger.get_order("o2").await.unwrap();
    assert_eq!(late.state, OrderState::Pending);

    let stored = ledger
        .get_closed_day(TENANT, &closed.date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_orders, closed.total_orders);
    assert_eq!(stored.closed_at, closed.closed_at);
}

#[tokio::test]
async fn revenue_matches_snapshot_totals() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(3), tortilla(2)]))
        .await
        .unwrap();
    ledger
        .create_or_get_order(order("o2", vec![tortilla(1)]))
        .await
        .unwrap();

    let closed = ledger.close_day(TENANT).await.unwrap();

    let snapshot_revenue: i64 = closed
        .snapshot
        .iter()
        .filter(|o| o.state != OrderState::Cancelled)
        .map(|o| o.total_cents)
        .sum();
    assert_eq!(closed.total_revenue_cents, snapshot_revenue);
}

#[tokio::test]
async fn closed_days_list_newest_first() {
    let ledger = ledger().await;
    ledger
        .create_or_get_order(order("o1", vec![espresso(1)]))
        .await
        .unwrap();
    ledger.close_day(TENANT).await.unwrap();

    let days = ledger.list_closed_days(TENANT).await.unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, ledger.business_date_today());
}
