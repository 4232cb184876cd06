use engine::{DistributorStatus, EngineError};

mod common;

use common::{
    CONSUMER, GRANDPARENT_USER, OPERATOR, PARENT_USER, approved_distributor, engine_with_db,
};

#[tokio::test]
async fn apply_creates_pending_root_distributor() {
    let engine = engine_with_db().await;

    let distributor = engine.apply_distributor(GRANDPARENT_USER, None).await.unwrap();
    assert_eq!(distributor.status, DistributorStatus::Pending);
    assert_eq!(distributor.parent_id, None);
    assert_eq!(distributor.level, 1);
    assert_eq!(distributor.invite_code.len(), 8);

    let by_user = engine.distributor_by_user(GRANDPARENT_USER).await.unwrap();
    assert_eq!(by_user.id, distributor.id);
    assert_eq!(by_user.invite_code, distributor.invite_code);
    let by_code = engine
        .distributor_by_invite_code(&distributor.invite_code.to_lowercase())
        .await
        .unwrap();
    assert_eq!(by_code.id, distributor.id);
}

#[tokio::test]
async fn approval_grows_parent_and_grandparent_counters() {
    let engine = engine_with_db().await;
    let grandparent = approved_distributor(&engine, GRANDPARENT_USER, None).await;
    let parent = approved_distributor(&engine, PARENT_USER, Some(&grandparent.invite_code)).await;
    assert_eq!(parent.parent_id, Some(grandparent.id));
    assert_eq!(parent.level, 2);

    let grandparent_after_parent = engine.distributor(grandparent.id).await.unwrap();
    assert_eq!(grandparent_after_parent.direct_count, 1);
    assert_eq!(grandparent_after_parent.team_count, 1);

    // applying alone changes nothing
    let child = engine
        .apply_distributor(3, Some(&parent.invite_code))
        .await
        .unwrap();
    assert_eq!(engine.distributor(parent.id).await.unwrap().team_count, 0);

    let child = engine.approve_distributor(child.id, OPERATOR).await.unwrap();
    assert!(child.is_approved());
    assert_eq!(child.reviewed_by, Some(OPERATOR));
    assert!(child.approved_at.is_some());

    let parent = engine.distributor(parent.id).await.unwrap();
    assert_eq!((parent.direct_count, parent.team_count), (1, 1));
    let grandparent = engine.distributor(grandparent.id).await.unwrap();
    assert_eq!((grandparent.direct_count, grandparent.team_count), (1, 2));

    let team = engine.team_members(parent.id).await.unwrap();
    assert_eq!(team.iter().map(|d| d.id).collect::<Vec<_>>(), vec![child.id]);
}

#[tokio::test]
async fn rejection_is_terminal_and_leaves_counters() {
    let engine = engine_with_db().await;
    let grandparent = approved_distributor(&engine, GRANDPARENT_USER, None).await;
    let applied = engine
        .apply_distributor(PARENT_USER, Some(&grandparent.invite_code))
        .await
        .unwrap();

    let rejected = engine.reject_distributor(applied.id, OPERATOR).await.unwrap();
    assert_eq!(rejected.status, DistributorStatus::Rejected);
    assert_eq!(engine.distributor(grandparent.id).await.unwrap().team_count, 0);

    let err = engine
        .approve_distributor(applied.id, OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let err = engine
        .apply_distributor(PARENT_USER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn approving_twice_is_an_illegal_transition() {
    let engine = engine_with_db().await;
    let distributor = approved_distributor(&engine, GRANDPARENT_USER, None).await;

    let err = engine
        .approve_distributor(distributor.id, OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
    let err = engine
        .reject_distributor(distributor.id, OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn unresolved_invite_codes_are_ignored() {
    let engine = engine_with_db().await;
    let pending = engine.apply_distributor(GRANDPARENT_USER, None).await.unwrap();

    // pending distributors cannot sponsor
    let distributor = engine
        .apply_distributor(PARENT_USER, Some(&pending.invite_code))
        .await
        .unwrap();
    assert_eq!(distributor.parent_id, None);
    assert_eq!(distributor.level, 1);

    let distributor = engine
        .apply_distributor(3, Some("NOPE0000"))
        .await
        .unwrap();
    assert_eq!(distributor.parent_id, None);
}

#[tokio::test]
async fn consumers_bind_once_to_an_approved_referrer() {
    let engine = engine_with_db().await;
    let referrer = approved_distributor(&engine, GRANDPARENT_USER, None).await;

    let bound = engine
        .bind_referrer(CONSUMER, &format!(" {} ", referrer.invite_code))
        .await
        .unwrap();
    assert_eq!(bound.id, referrer.id);

    let err = engine
        .bind_referrer(CONSUMER, &referrer.invite_code)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = engine
        .bind_referrer(GRANDPARENT_USER, &referrer.invite_code)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameter(_)));

    let err = engine.bind_referrer(CONSUMER + 1, "ZZZZ9999").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine.bind_referrer(CONSUMER + 1, "  ").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let engine = engine_with_db().await;

    assert!(matches!(
        engine.distributor(42).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        engine.distributor_by_user(42).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        engine.approve_distributor(42, OPERATOR).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
}
