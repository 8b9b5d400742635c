//! Races between concurrent callers and lock deadlines.

mod common;

use std::time::Duration;

use common::{fixture, line};
use depot_core::{ErrorKind, LedgerError, OrderStatus, SaleStatus};
use depot_engine::{
    AdjustRequest, EngineError, LockKey, ReceiveRequest, RequestContext, SaleRequest,
    TransferRequest,
};
use tokio::time::Instant;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_sales_for_the_last_unit() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 1).await;

    let mut tasks = Vec::new();
    for clerk in ["clerk-a", "clerk-b"] {
        let ledger = f.ledger.clone();
        let request = SaleRequest::new(&f.w1, vec![line(&f.p1, 1)]);
        tasks.push(tokio::spawn(async move {
            ledger.record_sale(&RequestContext::new(clerk), request).await
        }));
    }

    let mut successes = 0;
    let mut shortages = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) if err.kind() == ErrorKind::InsufficientStock => shortages += 1,
            Err(err) => panic!("unexpected error: {err:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(shortages, 1);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 0);
    assert!(f.ledger.reconcile().await.unwrap().is_clean());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_sales_never_oversell() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 7).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let ledger = f.ledger.clone();
        let request = SaleRequest::new(&f.w1, vec![line(&f.p1, 1)]);
        tasks.push(tokio::spawn(async move {
            ledger
                .record_sale(&RequestContext::new(format!("clerk-{i}")), request)
                .await
                .is_ok()
        }));
    }

    let mut sold = 0;
    for task in tasks {
        if task.await.unwrap() {
            sold += 1;
        }
    }

    assert_eq!(sold, 7);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 0);
    assert_eq!(f.log_sum(&f.p1, &f.w1).await, 0);
    assert!(f.ledger.verify_chain(&f.p1, &f.w1).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crossing_transfers_conserve_stock() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 50).await;
    f.stock(&f.p1, &f.w2, 50).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let ledger = f.ledger.clone();
        let (from, to) = if i % 2 == 0 {
            (f.w1.clone(), f.w2.clone())
        } else {
            (f.w2.clone(), f.w1.clone())
        };
        let request = TransferRequest::new(&f.p1, from, to, 3, "rebalance");
        tasks.push(tokio::spawn(async move {
            ledger.transfer(&RequestContext::new("mover"), request).await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(f.ledger.total_on_hand(&f.p1).await.unwrap(), 100);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 50);
    assert!(f.ledger.verify_chain(&f.p1, &f.w1).await.unwrap().is_consistent());
    assert!(f.ledger.verify_chain(&f.p1, &f.w2).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_deadline_passes_while_key_is_held() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 5).await;

    let held = f
        .ledger
        .lock_manager()
        .acquire(
            [LockKey::balance(&f.p1, &f.w1)],
            Instant::now() + Duration::from_secs(5),
        )
        .await
        .unwrap();

    let ctx = RequestContext::new("impatient").with_timeout(Duration::from_millis(50));
    let err = f
        .ledger
        .adjust(&ctx, AdjustRequest::new(&f.p1, &f.w1, -1, "damage"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::Timeout { ref key, .. }) if key.starts_with("balance ")
    ));

    drop(held);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 5);

    // Same request succeeds once the key is free.
    f.ledger
        .adjust(&ctx, AdjustRequest::new(&f.p1, &f.w1, -1, "damage"))
        .await
        .unwrap();
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 4);
}

#[tokio::test]
async fn test_unrelated_keys_do_not_wait() {
    let f = fixture().await;
    f.stock(&f.p2, &f.w1, 5).await;

    let _held = f
        .ledger
        .lock_manager()
        .acquire(
            [LockKey::balance(&f.p1, &f.w1)],
            Instant::now() + Duration::from_secs(5),
        )
        .await
        .unwrap();

    let ctx = RequestContext::new("clerk").with_timeout(Duration::from_millis(50));
    f.ledger
        .adjust(&ctx, AdjustRequest::new(&f.p2, &f.w1, -1, "damage"))
        .await
        .unwrap();
    assert_eq!(f.quantity(&f.p2, &f.w1).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receipts_on_one_order_never_over_receive() {
    let f = fixture().await;
    let (order, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 10, 300), (f.p2.clone(), 5, 300)])
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for (line_id, quantity) in [
        (&lines[0].id, 4),
        (&lines[0].id, 4),
        (&lines[0].id, 4),
        (&lines[1].id, 2),
        (&lines[1].id, 2),
        (&lines[1].id, 2),
    ] {
        let ledger = f.ledger.clone();
        let request = ReceiveRequest::new(line_id, quantity, &f.w1);
        tasks.push(tokio::spawn(async move {
            ledger
                .receive_purchase_order_line(&RequestContext::new("dock"), request)
                .await
        }));
    }

    let mut received = 0;
    let mut over = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => received += 1,
            Err(err) if err.kind() == ErrorKind::OverReceipt => over += 1,
            Err(err) => panic!("unexpected error: {err:?}"),
        }
    }

    assert_eq!(received, 4);
    assert_eq!(over, 2);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 8);
    assert_eq!(f.quantity(&f.p2, &f.w1).await, 4);

    let po = f.ledger.database().purchase_orders();
    assert_eq!(po.get_line(&lines[0].id).await.unwrap().unwrap().received_quantity, 8);
    assert_eq!(po.get_line(&lines[1].id).await.unwrap().unwrap().received_quantity, 4);
    let stored = po.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Open);
    assert!(stored.received_at.is_none());
    assert!(f.ledger.reconcile().await.unwrap().is_clean());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_receipts_close_the_order_once() {
    let f = fixture().await;
    let (order, lines) = f
        .ledger
        .database()
        .purchase_orders()
        .insert_order("PO-1", "Acme", &[(f.p1.clone(), 6, 300), (f.p2.clone(), 3, 300)])
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let ledger = f.ledger.clone();
        let order_id = order.id.clone();
        let warehouse_id = f.w1.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .receive_remaining(&RequestContext::new("dock"), &order_id, &warehouse_id)
                .await
                .map(|outcome| (outcome.movements.len(), outcome.order.status))
        }));
    }
    for (line_id, quantity) in [(&lines[0].id, 1), (&lines[1].id, 1)] {
        let ledger = f.ledger.clone();
        let request = ReceiveRequest::new(line_id, quantity, &f.w1);
        tasks.push(tokio::spawn(async move {
            match ledger
                .receive_purchase_order_line(&RequestContext::new("dock"), request)
                .await
            {
                Ok(outcome) => Ok((1, outcome.order_status)),
                Err(err) if err.kind() == ErrorKind::OverReceipt => Ok((0, OrderStatus::Received)),
                Err(err) => Err(err),
            }
        }));
    }

    let mut movements = 0;
    let mut closings = 0;
    for task in tasks {
        let (written, status) = task.await.unwrap().unwrap();
        movements += written;
        if written > 0 && status == OrderStatus::Received {
            closings += 1;
        }
    }

    // Exactly one writer saw the order become fully received.
    assert_eq!(closings, 1);
    assert!(movements >= 2);
    assert_eq!(f.quantity(&f.p1, &f.w1).await, 6);
    assert_eq!(f.quantity(&f.p2, &f.w1).await, 3);
    assert_eq!(f.log_sum(&f.p1, &f.w1).await, 6);
    assert_eq!(f.log_sum(&f.p2, &f.w1).await, 3);

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
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_and_release_race_on_one_held_sale() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 5).await;

    let held = f
        .ledger
        .hold_sale(&f.ctx, SaleRequest::new(&f.w1, vec![line(&f.p1, 3)]))
        .await
        .unwrap();
    let sale_id = held.sale.id.clone();

    let complete = {
        let ledger = f.ledger.clone();
        let sale_id = sale_id.clone();
        tokio::spawn(async move {
            ledger.complete_sale(&RequestContext::new("till"), &sale_id).await
        })
    };
    let release = {
        let ledger = f.ledger.clone();
        let sale_id = sale_id.clone();
        tokio::spawn(async move {
            ledger
                .release_sale(&RequestContext::new("manager"), &sale_id, "customer left")
                .await
        })
    };

    let completed = complete.await.unwrap();
    let released = release.await.unwrap();
    assert!(completed.is_ok() != released.is_ok(), "exactly one transition must win");

    let loser = match (&completed, &released) {
        (Err(err), _) | (_, Err(err)) => err,
        _ => unreachable!(),
    };
    assert!(matches!(
        loser,
        EngineError::Ledger(LedgerError::InvalidSaleStatus { expected, .. }) if expected == "open"
    ));

    let status = f.ledger.sale(&sale_id).await.unwrap().sale.status;
    assert_eq!(f.reserved(&f.p1, &f.w1).await, 0);
    if completed.is_ok() {
        assert_eq!(status, SaleStatus::Completed);
        assert_eq!(f.quantity(&f.p1, &f.w1).await, 2);
    } else {
        assert_eq!(status, SaleStatus::Void);
        assert_eq!(f.quantity(&f.p1, &f.w1).await, 5);
    }
    assert!(f.ledger.reconcile().await.unwrap().is_clean());
}
