//! Adjustments, transfers and bin labels through the coordinator.

mod common;

use common::fixture;
use depot_core::{ErrorKind, LedgerError, MovementType};
use depot_engine::{AdjustRequest, EngineError, TransferRequest};

fn ledger_err(err: EngineError) -> LedgerError {
    match err {
        EngineError::Ledger(e) => e,
        other => panic!("expected a ledger error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_adjust_creates_balance_and_movement() {
    let f = fixture().await;

    let outcome = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, 10, "cycle count"))
        .await
        .unwrap();

    assert_eq!(outcome.balance.quantity, 10);
    assert_eq!(outcome.movement.movement_type, MovementType::Adjustment);
    assert_eq!(outcome.movement.balance_before, 0);
    assert_eq!(outcome.movement.balance_after, 10);
    assert_eq!(outcome.movement.actor_id, "tester");
    assert_eq!(outcome.movement.reason, "cycle count");
    assert!(outcome.movement.id > 0);

    let stored = f.ledger.balance(&f.p1, &f.w1).await.unwrap().unwrap();
    assert_eq!(outcome.balance.updated_at, stored.updated_at);
    assert_eq!(stored.updated_at, outcome.movement.occurred_at);
}

#[tokio::test]
async fn test_balance_equals_sum_of_deltas_after_every_step() {
    let f = fixture().await;

    for delta in [12, -3, 7, -16, 1] {
        f.ledger
            .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, delta, "count"))
            .await
            .unwrap();
        assert_eq!(f.quantity(&f.p1, &f.w1).await, f.log_sum(&f.p1, &f.w1).await);
    }

    let chain = f.ledger.verify_chain(&f.p1, &f.w1).await.unwrap();
    assert!(chain.is_consistent());
    assert_eq!(chain.entries, 5);
    assert_eq!(chain.chain_quantity, Some(1));
}

#[tokio::test]
async fn test_removing_one_more_than_on_hand_fails_and_changes_nothing() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 7).await;

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, -8, "shrinkage"))
        .await
        .unwrap_err();

    assert_eq!(
        ledger_err(err),
        LedgerError::InsufficientStock {
            product_id: f.p1.clone(),
            warehouse_id: f.w1.clone(),
            available: 7,
            requested: 8,
        }
    );
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 7);
    assert_eq!(f.ledger.history(&f.p1, &f.w1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_damage_scenario_reaches_low_stock_then_rejects() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 10).await;

    let first = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, -6, "damage"))
        .await
        .unwrap();
    assert_eq!(first.balance.quantity, 4);

    let status = f.ledger.evaluate_low_stock(&f.p1, &f.w1).await.unwrap();
    assert!(status.is_low_stock);
    assert!(!status.is_critical);
    assert_eq!(status.suggested_order_quantity, 16);

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, -5, "damage"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 4);
}

#[tokio::test]
async fn test_zero_delta_is_invalid_quantity() {
    let f = fixture().await;

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, 0, "count"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidQuantity);
    assert!(f.ledger.balance(&f.p1, &f.w1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reason_is_required_by_default() {
    let f = fixture().await;

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, 3, "   "))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let f = fixture().await;

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new("nope", &f.w1, 3, "count"))
        .await
        .unwrap_err();
    assert!(matches!(ledger_err(err), LedgerError::NotFound { ref entity, .. } if entity == "Product"));

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, "nowhere", 3, "count"))
        .await
        .unwrap_err();
    assert!(matches!(ledger_err(err), LedgerError::NotFound { ref entity, .. } if entity == "Warehouse"));
}

#[tokio::test]
async fn test_inactive_warehouse_is_invalid() {
    let f = fixture().await;
    f.ledger
        .database()
        .catalog()
        .set_warehouse_active(&f.w2, false)
        .await
        .unwrap();

    let err = f
        .ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w2, 3, "count"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidWarehouse);
}

#[tokio::test]
async fn test_transfer_moves_stock_and_conserves_total() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 10).await;

    let outcome = f
        .ledger
        .transfer(&f.ctx, TransferRequest::new(&f.p1, &f.w1, &f.w2, 4, "rebalance"))
        .await
        .unwrap();

    assert_eq!(outcome.source.quantity, 6);
    assert_eq!(outcome.destination.quantity, 4);
    assert_eq!(outcome.movements.len(), 2);

    let out = &outcome.movements[0];
    let into = &outcome.movements[1];
    assert_eq!(out.movement_type, MovementType::TransferOut);
    assert_eq!(into.movement_type, MovementType::TransferIn);
    assert_eq!(out.quantity_delta, -into.quantity_delta);
    assert_eq!(out.correlation_id.as_deref(), Some(outcome.correlation_id.as_str()));
    assert_eq!(into.correlation_id, out.correlation_id);

    let correlated = f
        .ledger
        .movements_by_correlation(&outcome.correlation_id)
        .await
        .unwrap();
    assert_eq!(correlated.len(), 2);
    assert_eq!(f.ledger.total_on_hand(&f.p1).await.unwrap(), 10);
}

#[tokio::test]
async fn test_failed_transfer_writes_neither_side() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 3).await;

    let err = f
        .ledger
        .transfer(&f.ctx, TransferRequest::new(&f.p1, &f.w1, &f.w2, 4, "rebalance"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 3);
    assert!(f.ledger.balance(&f.p1, &f.w2).await.unwrap().is_none());
    assert!(f.ledger.history(&f.p1, &f.w2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_self_transfer_is_invalid_warehouse() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 3).await;

    let err = f
        .ledger
        .transfer(&f.ctx, TransferRequest::new(&f.p1, &f.w1, &f.w1, 1, "noop"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidWarehouse);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 3);
}

#[tokio::test]
async fn test_transfer_of_zero_is_invalid_quantity() {
    let f = fixture().await;

    let err = f
        .ledger
        .transfer(&f.ctx, TransferRequest::new(&f.p1, &f.w1, &f.w2, 0, "noop"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidQuantity);
}

#[tokio::test]
async fn test_location_label_without_movement() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 2).await;

    let balance = f
        .ledger
        .set_location(&f.ctx, &f.p1, &f.w1, "  B-07 ")
        .await
        .unwrap();
    assert_eq!(balance.location.as_deref(), Some("B-07"));
    assert_eq!(balance.quantity, 2);

    let stored = f.ledger.balance(&f.p1, &f.w1).await.unwrap().unwrap();
    assert_eq!(stored.location.as_deref(), Some("B-07"));
    assert_eq!(stored.updated_at, balance.updated_at);
    assert_eq!(f.ledger.history(&f.p1, &f.w1).await.unwrap().len(), 1);

    let mut relabel = AdjustRequest::new(&f.p1, &f.w1, 1, "found");
    relabel.location = Some(String::new());
    let outcome = f.ledger.adjust(&f.ctx, relabel).await.unwrap();
    assert_eq!(outcome.balance.location, None);
    assert_eq!(f.ledger.balance(&f.p1, &f.w1).await.unwrap().unwrap().location, None);
}
