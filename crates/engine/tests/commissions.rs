use chrono::{Duration, Utc};

use engine::{
    CommissionFilter, CommissionKind, CommissionStatus, EngineError, FinanceSettings,
    WithdrawChannel, WithdrawalCmd, WithdrawalKind,
};

mod common;

use common::{
    CONSUMER, GRANDPARENT_USER, PARENT_USER, approved_distributor, engine_with_db,
    engine_with_settings, order, referral_chain, settled_order,
};

#[tokio::test]
async fn completed_order_pays_direct_and_indirect_levels() {
    let engine = engine_with_db().await;
    let (grandparent, parent) = referral_chain(&engine).await;

    let created = engine.on_order_completed(&order(1, 10_000)).await.unwrap();
    assert_eq!(created.len(), 2);

    let direct = &created[0];
    assert_eq!(direct.distributor_id, parent.id);
    assert_eq!(direct.kind, CommissionKind::Direct);
    assert_eq!(direct.amount, 1_000);
    assert_eq!(direct.rate_bps, 1_000);
    assert_eq!(direct.status, CommissionStatus::Pending);
    assert_eq!(direct.from_user_id, CONSUMER);
    assert_eq!(direct.order_no, "ORD-1");

    let indirect = &created[1];
    assert_eq!(indirect.distributor_id, grandparent.id);
    assert_eq!(indirect.kind, CommissionKind::Indirect);
    assert_eq!(indirect.amount, 500);
    assert_eq!(indirect.status, CommissionStatus::Pending);

    // nothing is credited before settlement
    let parent = engine.distributor(parent.id).await.unwrap();
    assert_eq!((parent.available_commission, parent.total_commission), (0, 0));
}

#[tokio::test]
async fn completing_an_order_twice_is_refused() {
    let engine = engine_with_db().await;
    referral_chain(&engine).await;

    engine.on_order_completed(&order(1, 10_000)).await.unwrap();
    let err = engine
        .on_order_completed(&order(1, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert_eq!(engine.commissions_by_order(1).await.unwrap().len(), 2);
}

#[tokio::test]
async fn order_without_commissions_still_counts_as_completed() {
    let engine = engine_with_db().await;

    // no binding yet: the first completion pays nobody
    assert!(engine.on_order_completed(&order(1, 10_000)).await.unwrap().is_empty());

    referral_chain(&engine).await;
    let err = engine
        .on_order_completed(&order(1, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert!(engine.commissions_by_order(1).await.unwrap().is_empty());

    // same for an order whose commissions truncate to zero
    assert!(engine.on_order_completed(&order(2, 9)).await.unwrap().is_empty());
    let err = engine.on_order_completed(&order(2, 9)).await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn unreferred_consumers_and_dust_create_nothing() {
    let engine = engine_with_db().await;
    referral_chain(&engine).await;

    let stranger = engine::Order::new(2, "ORD-2", CONSUMER + 1, 10_000);
    assert!(engine.on_order_completed(&stranger).await.unwrap().is_empty());

    // 10% of 9 and 5% of 9 both truncate to zero
    assert!(engine.on_order_completed(&order(3, 9)).await.unwrap().is_empty());

    let err = engine.on_order_completed(&order(4, 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn root_referrer_earns_direct_only() {
    let engine = engine_with_db().await;
    let root = approved_distributor(&engine, GRANDPARENT_USER, None).await;
    engine
        .bind_referrer(CONSUMER, &root.invite_code)
        .await
        .unwrap();

    let created = engine.on_order_completed(&order(1, 10_000)).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind, CommissionKind::Direct);
    assert_eq!(created[0].distributor_id, root.id);
}

#[tokio::test]
async fn settlement_credits_once() {
    let engine = engine_with_db().await;
    let (_, parent) = referral_chain(&engine).await;
    let created = engine.on_order_completed(&order(1, 10_000)).await.unwrap();
    let direct = &created[0];

    let settled = engine.settle_commission(direct.id).await.unwrap();
    assert_eq!(settled.status, CommissionStatus::Settled);
    assert!(settled.settled_at.is_some());

    let err = engine.settle_commission(direct.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let parent = engine.distributor(parent.id).await.unwrap();
    assert_eq!(parent.available_commission, 1_000);
    assert_eq!(parent.total_commission, 1_000);
}

#[tokio::test]
async fn refund_reverses_settled_commission() {
    let engine = engine_with_db().await;
    let (grandparent, parent) = referral_chain(&engine).await;
    settled_order(&engine, 1, 30_000).await;
    let created = engine.on_order_completed(&order(2, 10_000)).await.unwrap();
    engine.settle_commission(created[0].id).await.unwrap();

    let before = engine.distributor(parent.id).await.unwrap();
    assert_eq!(before.available_commission, 4_000);

    let cancelled = engine.on_order_refunded(&order(2, 10_000)).await.unwrap();
    assert_eq!(cancelled.len(), 2);
    assert!(
        cancelled
            .iter()
            .all(|c| c.status == CommissionStatus::Cancelled && c.cancelled_at.is_some())
    );

    let after = engine.distributor(parent.id).await.unwrap();
    assert_eq!(after.available_commission, 4_000 - 1_000);
    assert_eq!(after.total_commission, 3_000);

    // the indirect commission was still pending: no balance to take back
    let grandparent = engine.distributor(grandparent.id).await.unwrap();
    assert_eq!(grandparent.available_commission, 1_500);

    // a second refund finds nothing left to cancel
    assert!(engine.on_order_refunded(&order(2, 10_000)).await.unwrap().is_empty());
}

#[tokio::test]
async fn refund_after_withdrawal_needs_reconciliation() {
    let engine = engine_with_db().await;
    let (_, parent) = referral_chain(&engine).await;
    settled_order(&engine, 1, 10_000).await;

    engine
        .apply_withdrawal(WithdrawalCmd::new(
            PARENT_USER,
            WithdrawalKind::Commission,
            1_000,
            WithdrawChannel::Alipay,
        ))
        .await
        .unwrap();

    let err = engine
        .cancel_commissions_by_order(1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Reconciliation(_)));

    // nothing changed, not even the grandparent's row
    let commissions = engine.commissions_by_order(1).await.unwrap();
    assert!(
        commissions
            .iter()
            .all(|c| c.status == CommissionStatus::Settled)
    );
    let parent = engine.distributor(parent.id).await.unwrap();
    assert_eq!(
        (parent.available_commission, parent.frozen_commission),
        (0, 1_000)
    );
}

#[tokio::test]
async fn due_commissions_settle_after_the_delay() {
    let engine = engine_with_settings(FinanceSettings {
        settlement_delay_days: 7,
        ..FinanceSettings::default()
    })
    .await;
    let (grandparent, parent) = referral_chain(&engine).await;
    let created = engine.on_order_completed(&order(1, 10_000)).await.unwrap();
    engine.settle_commission(created[1].id).await.unwrap();

    let early = engine.settle_due_commissions(Utc::now()).await.unwrap();
    assert!(early.succeeded.is_empty());

    let outcome = engine
        .settle_due_commissions(Utc::now() + Duration::days(8))
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![created[0].id]);
    assert!(outcome.is_complete_success());

    assert_eq!(
        engine.distributor(parent.id).await.unwrap().available_commission,
        1_000
    );
    assert_eq!(
        engine.distributor(grandparent.id).await.unwrap().available_commission,
        500
    );
}

#[tokio::test]
async fn distributor_commissions_filter_by_status() {
    let engine = engine_with_db().await;
    let (_, parent) = referral_chain(&engine).await;
    settled_order(&engine, 1, 10_000).await;
    engine.on_order_completed(&order(2, 20_000)).await.unwrap();

    let all = engine
        .distributor_commissions(parent.id, &CommissionFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].order_id, 2);

    let pending = engine
        .distributor_commissions(
            parent.id,
            &CommissionFilter {
                status: Some(CommissionStatus::Pending),
                ..CommissionFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, 2_000);

    let fetched = engine.commission(pending[0].id).await.unwrap();
    assert_eq!(fetched.id, pending[0].id);
    assert!(matches!(
        engine.commission(9_999).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
}

#[tokio::test]
async fn order_hooks_join_the_callers_unit_of_work() {
    let engine = engine_with_db().await;
    referral_chain(&engine).await;

    let db_tx = engine.begin().await.unwrap();
    let created = engine
        .on_order_completed_in(&db_tx, &order(1, 10_000))
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    db_tx.rollback().await.unwrap();
    assert!(engine.commissions_by_order(1).await.unwrap().is_empty());

    let db_tx = engine.begin().await.unwrap();
    engine
        .on_order_completed_in(&db_tx, &order(1, 10_000))
        .await
        .unwrap();
    let cancelled = engine
        .on_order_refunded_in(&db_tx, &order(1, 10_000))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 2);
    db_tx.commit().await.unwrap();

    let stored = engine.commissions_by_order(1).await.unwrap();
    assert!(
        stored
            .iter()
            .all(|c| c.status == CommissionStatus::Cancelled)
    );
}
