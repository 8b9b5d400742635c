//! Purchase-order receipts against balances and order bookkeeping.

mod common;

use common::fixture;
use depot_core::{ErrorKind, LedgerError, MovementType, OrderStatus};
use depot_engine::{EngineError, ReceiveRequest};

#[tokio::test]
async fn test_partial_receipt_keeps_order_open() {
    let f = fixture().await;
    let (order, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 10, 300)])
        .await
        .unwrap();

    let outcome = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 4, &f.w1))
        .await
        .unwrap();

    assert_eq!(outcome.line.received_quantity, 4);
    assert_eq!(outcome.order_status, OrderStatus::Open);
    assert_eq!(outcome.balance.quantity, 4);
    assert_eq!(outcome.movement.movement_type, MovementType::Receipt);
    assert_eq!(outcome.movement.quantity_delta, 4);
    assert_eq!(outcome.movement.reference_id.as_deref(), Some(lines[0].id.as_str()));

    let po = f.ledger.database().purchase_orders();
    assert_eq!(po.get_order(&order.id).await.unwrap().unwrap().status, OrderStatus::Open);
    assert_eq!(po.get_line(&lines[0].id).await.unwrap().unwrap().received_quantity, 4);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 4);
}

#[tokio::test]
async fn test_over_receipt_changes_nothing() {
    let f = fixture().await;
    let (_, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 10, 300)])
        .await
        .unwrap();

    f.ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 8, &f.w1))
        .await
        .unwrap();

    let err = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 3, &f.w1))
        .await
        .unwrap_err();

    assert_eq!(
        err.as_ledger(),
        Some(&LedgerError::OverReceipt {
            line_id: lines[0].id.clone(),
            ordered: 10,
            received: 8,
            requested: 3,
        })
    );
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 8);
    let line = f
        .ledger
        .database()
        .purchase_orders()
        .get_line(&lines[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.received_quantity, 8);
    assert_eq!(f.ledger.history(&f.p1, &f.w1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_completing_every_line_closes_the_order() {
    let f = fixture().await;
    let (order, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 5, 300), (f.p2.clone(), 2, 300)])
        .await
        .unwrap();

    let first = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 5, &f.w1))
        .await
        .unwrap();
    assert_eq!(first.order_status, OrderStatus::Open);

    let second = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[1].id, 2, &f.w1))
        .await
        .unwrap();
    assert_eq!(second.order_status, OrderStatus::Received);

    let stored = f
        .ledger
        .database()
        .purchase_orders()
        .get_order(&order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Received);
    assert!(stored.received_at.is_some());

    // A closed line accepts nothing more.
    let err = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[1].id, 1, &f.w1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OverReceipt);
}

#[tokio::test]
async fn test_receive_remaining_closes_order_in_one_write() {
    let f = fixture().await;
    let (order, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order(
            "PO-1",
            "Acme",
            &[(f.p1.clone(), 6, 300), (f.p2.clone(), 3, 300), (f.p3.clone(), 4, 300)],
        )
        .await
        .unwrap();

    f.ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 2, &f.w2))
        .await
        .unwrap();

    let outcome = f.ledger.receive_remaining(&f.ctx, &order.id, &f.w2).await.unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Received);
    assert_eq!(outcome.lines.len(), 3);
    assert!(outcome.lines.iter().all(|l| l.is_fully_received()));
    assert_eq!(outcome.movements.len(), 3);
    let p1_receipt = outcome
        .movements
        .iter()
        .find(|m| m.product_id == f.p1)
        .unwrap();
    assert_eq!(p1_receipt.quantity_delta, 4);
    assert_eq!(p1_receipt.balance_before, 2);

    let correlation_id = outcome.correlation_id.clone().unwrap();
    let correlated = f
        .ledger
        .movements_by_correlation(&correlation_id)
        .await
        .unwrap();
    assert_eq!(correlated.len(), 3);

    assert_eq!(f.quantity(&f.p1, &f.w2).await, 6);
    assert_eq!(f.quantity(&f.p2, &f.w2).await, 3);
    assert_eq!(f.quantity(&f.p3, &f.w2).await, 4);

    // Nothing left to receive.
    let again = f.ledger.receive_remaining(&f.ctx, &order.id, &f.w2).await.unwrap();
    assert!(again.movements.is_empty());
    assert!(again.correlation_id.is_none());
    assert_eq!(again.order.status, OrderStatus::Received);
}

#[tokio::test]
async fn test_receipt_validation_errors() {
    let f = fixture().await;
    let (_, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 5, 300)])
        .await
        .unwrap();

    let err = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new("missing", 1, &f.w1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::NotFound { ref entity, .. }) if entity == "PurchaseOrderLine"
    ));

    let err = f
        .ledger
        .receive_purchase_order_line(&f.ctx, ReceiveRequest::new(&lines[0].id, 0, &f.w1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidQuantity);

    let err = f.ledger.receive_remaining(&f.ctx, "missing", &f.w1).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::NotFound { ref entity, .. }) if entity == "PurchaseOrder"
    ));

    assert_eq!(f.quantity(&f.p1, &f.w1).await, 0);
}
