#![allow(dead_code)]

use sea_orm::Database;

use engine::{Distributor, Engine, FinanceSettings, Order};
use migration::MigratorTrait;

pub const GRANDPARENT_USER: i64 = 1;
pub const PARENT_USER: i64 = 2;
pub const CONSUMER: i64 = 100;
pub const OPERATOR: i64 = 900;

pub async fn engine_with_db() -> Engine {
    engine_with_settings(FinanceSettings::default()).await
}

pub async fn engine_with_settings(settings: FinanceSettings) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder()
        .database(db)
        .settings(settings)
        .build()
        .await
        .unwrap()
}

pub async fn approved_distributor(
    engine: &Engine,
    user_id: i64,
    invite_code: Option<&str>,
) -> Distributor {
    let applied = engine
        .apply_distributor(user_id, invite_code)
        .await
        .unwrap();
    engine
        .approve_distributor(applied.id, OPERATOR)
        .await
        .unwrap()
}

/// G (root) <- P <- consumer bound to P. Returns `(G, P)`.
pub async fn referral_chain(engine: &Engine) -> (Distributor, Distributor) {
    let grandparent = approved_distributor(engine, GRANDPARENT_USER, None).await;
    let parent =
        approved_distributor(engine, PARENT_USER, Some(&grandparent.invite_code)).await;
    engine
        .bind_referrer(CONSUMER, &parent.invite_code)
        .await
        .unwrap();
    (grandparent, parent)
}

pub fn order(order_id: i64, amount_minor: i64) -> Order {
    Order::new(order_id, format!("ORD-{order_id}"), CONSUMER, amount_minor)
}

/// Completes an order for the consumer and settles every commission it made.
pub async fn settled_order(engine: &Engine, order_id: i64, amount_minor: i64) {
    let created = engine
        .on_order_completed(&order(order_id, amount_minor))
        .await
        .unwrap();
    for commission in created {
        engine.settle_commission(commission.id).await.unwrap();
    }
}
