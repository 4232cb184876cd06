use engine::{EngineError, LedgerCmd, WalletTransactionFilter, WalletTransactionKind};

mod common;

use common::engine_with_db;

const USER: i64 = 7;

#[tokio::test]
async fn wallet_is_created_empty_on_first_access() {
    let engine = engine_with_db().await;

    let wallet = engine.wallet(USER).await.unwrap();
    assert_eq!(wallet.user_id, USER);
    assert_eq!((wallet.balance, wallet.frozen_balance), (0, 0));

    let log = engine
        .wallet_transactions(USER, &WalletTransactionFilter::default())
        .await
        .unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn operations_move_buckets_and_totals() {
    let engine = engine_with_db().await;

    engine
        .recharge(LedgerCmd::new(USER, 10_000).reference_no("TOPUP-1"))
        .await
        .unwrap();
    engine.consume(LedgerCmd::new(USER, 2_500)).await.unwrap();
    engine.refund(LedgerCmd::new(USER, 500)).await.unwrap();
    engine
        .freeze_deposit(LedgerCmd::new(USER, 3_000).reference_no("RENT-9"))
        .await
        .unwrap();
    engine
        .deduct_frozen_to_consume(LedgerCmd::new(USER, 1_000))
        .await
        .unwrap();
    engine
        .unfreeze_deposit(LedgerCmd::new(USER, 2_000))
        .await
        .unwrap();

    let wallet = engine.wallet(USER).await.unwrap();
    assert_eq!(wallet.balance, 7_000);
    assert_eq!(wallet.frozen_balance, 0);
    assert_eq!(wallet.total_recharged, 10_000);
    // refunds do not reduce total_consumed
    assert_eq!(wallet.total_consumed, 3_500);
}

#[tokio::test]
async fn log_records_snapshots_and_conserves_money() {
    let engine = engine_with_db().await;

    engine.recharge(LedgerCmd::new(USER, 5_000)).await.unwrap();
    engine.freeze_deposit(LedgerCmd::new(USER, 1_200)).await.unwrap();
    engine.consume(LedgerCmd::new(USER, 800)).await.unwrap();
    engine
        .deduct_frozen_to_consume(LedgerCmd::new(USER, 200))
        .await
        .unwrap();

    let log = engine
        .wallet_transactions(USER, &WalletTransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(log.len(), 4);
    // newest first
    assert_eq!(log[0].kind, WalletTransactionKind::DeductFrozen);
    assert_eq!((log[0].frozen_before, log[0].frozen_after), (1_200, 1_000));

    let wallet = engine.wallet(USER).await.unwrap();
    let net: i64 = log.iter().map(|row| row.net_change()).sum();
    assert_eq!(net, wallet.balance + wallet.frozen_balance);

    engine.audit_wallet(USER).await.unwrap();
}

#[tokio::test]
async fn insufficient_balance_rolls_back() {
    let engine = engine_with_db().await;
    engine.recharge(LedgerCmd::new(USER, 1_000)).await.unwrap();

    let err = engine
        .consume(LedgerCmd::new(USER, 1_001))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    let err = engine
        .unfreeze_deposit(LedgerCmd::new(USER, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFrozen(_)));

    let wallet = engine.wallet(USER).await.unwrap();
    assert_eq!(wallet.balance, 1_000);
    let log = engine
        .wallet_transactions(USER, &WalletTransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let engine = engine_with_db().await;

    for amount in [0, -100] {
        let err = engine
            .recharge(LedgerCmd::new(USER, amount))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}

#[tokio::test]
async fn composed_unit_of_work_is_atomic() {
    let engine = engine_with_db().await;
    engine.recharge(LedgerCmd::new(USER, 1_000)).await.unwrap();

    let db_tx = engine.begin().await.unwrap();
    engine
        .freeze_deposit_in(&db_tx, &LedgerCmd::new(USER, 600))
        .await
        .unwrap();
    let err = engine
        .consume_in(&db_tx, &LedgerCmd::new(USER, 600))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    db_tx.rollback().await.unwrap();

    let wallet = engine.wallet(USER).await.unwrap();
    assert_eq!((wallet.balance, wallet.frozen_balance), (1_000, 0));

    let db_tx = engine.begin().await.unwrap();
    engine
        .freeze_deposit_in(&db_tx, &LedgerCmd::new(USER, 600))
        .await
        .unwrap();
    engine
        .deduct_frozen_to_consume_in(&db_tx, &LedgerCmd::new(USER, 600))
        .await
        .unwrap();
    db_tx.commit().await.unwrap();

    let wallet = engine.wallet(USER).await.unwrap();
    assert_eq!((wallet.balance, wallet.frozen_balance), (400, 0));
}

#[tokio::test]
async fn log_filters_by_kind_and_pages() {
    let engine = engine_with_db().await;
    for _ in 0..3 {
        engine.recharge(LedgerCmd::new(USER, 100)).await.unwrap();
    }
    engine.consume(LedgerCmd::new(USER, 50)).await.unwrap();

    let mut filter = WalletTransactionFilter {
        kind: Some(WalletTransactionKind::Recharge),
        ..WalletTransactionFilter::default()
    };
    filter.page.limit = 2;
    let first = engine.wallet_transactions(USER, &filter).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(
        first
            .iter()
            .all(|row| row.kind == WalletTransactionKind::Recharge)
    );

    filter.page.offset = 2;
    let rest = engine.wallet_transactions(USER, &filter).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert!(rest[0].id < first[1].id);
}
