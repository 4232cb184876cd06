use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{
    Commission, CommissionFilter, CommissionKind, CommissionStatus, Distributor, EngineError,
    Order, Rate, ResultEngine, commissions, distributors, order_completions, referral_bindings,
};

use super::{BatchOutcome, Engine, with_tx};

impl Engine {
    /// Creates the `pending` commissions owed for a completed order.
    ///
    /// The consumer's bound referrer earns the direct rate, that referrer's
    /// parent the indirect rate; each only if currently approved. Every
    /// completion is recorded, so an order seen before is refused with
    /// [`EngineError::ExistingKey`] even if it produced no commission.
    pub(super) async fn create_order_commissions_in(
        &self,
        db_tx: &DatabaseTransaction,
        order: &Order,
    ) -> ResultEngine<Vec<Commission>> {
        let seen = order_completions::Entity::find_by_id(order.order_id)
            .one(db_tx)
            .await?;
        if seen.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "order {} already completed",
                order.order_id
            )));
        }
        order_completions::ActiveModel {
            order_id: ActiveValue::Set(order.order_id),
            order_no: ActiveValue::Set(order.order_no.clone()),
            user_id: ActiveValue::Set(order.user_id),
            amount: ActiveValue::Set(order.amount_minor),
            completed_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db_tx)
        .await?;

        let mut created = Vec::new();
        for (kind, beneficiary, rate) in self.resolve_beneficiaries(db_tx, order.user_id).await? {
            let amount = rate.apply(order.amount_minor);
            if amount <= 0 {
                tracing::debug!(
                    "order {} yields no {} commission at {rate}",
                    order.order_id,
                    kind.as_str()
                );
                continue;
            }

            let model = commissions::ActiveModel {
                id: ActiveValue::NotSet,
                distributor_id: ActiveValue::Set(beneficiary.id),
                order_id: ActiveValue::Set(order.order_id),
                order_no: ActiveValue::Set(order.order_no.clone()),
                from_user_id: ActiveValue::Set(order.user_id),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                order_amount: ActiveValue::Set(order.amount_minor),
                rate_bps: ActiveValue::Set(bps_column(rate)?),
                amount: ActiveValue::Set(amount),
                status: ActiveValue::Set(CommissionStatus::Pending.as_str().to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                settled_at: ActiveValue::Set(None),
                cancelled_at: ActiveValue::Set(None),
            }
            .insert(db_tx)
            .await?;

            let commission = Commission::try_from(model)?;
            tracing::info!(
                "order {} created {} commission {} of {} for distributor {}",
                order.order_id,
                kind.as_str(),
                commission.id,
                commission.amount,
                beneficiary.id
            );
            created.push(commission);
        }
        Ok(created)
    }

    /// Credits a pending commission to its distributor's available balance.
    pub async fn settle_commission(&self, commission_id: i64) -> ResultEngine<Commission> {
        with_tx!(self, |db_tx| {
            self.settle_commission_in(&db_tx, commission_id).await
        })
    }

    pub async fn settle_commission_in(
        &self,
        db_tx: &DatabaseTransaction,
        commission_id: i64,
    ) -> ResultEngine<Commission> {
        let mut commission = self.lock_commission(db_tx, commission_id).await?;
        commission.status.ensure_transition(CommissionStatus::Settled)?;

        let mut distributor = self
            .lock_distributor(db_tx, commission.distributor_id)
            .await?;
        distributor.credit_settled(commission.amount)?;
        distributors::ActiveModel::from(&distributor)
            .update(db_tx)
            .await?;

        let now = Utc::now();
        commission.status = CommissionStatus::Settled;
        commission.settled_at = Some(now);
        commissions::ActiveModel {
            id: ActiveValue::Unchanged(commission.id),
            status: ActiveValue::Set(commission.status.as_str().to_string()),
            settled_at: ActiveValue::Set(commission.settled_at),
            ..Default::default()
        }
        .update(db_tx)
        .await?;

        tracing::info!(
            "commission {commission_id} settled: distributor {} +{}",
            distributor.id,
            commission.amount
        );
        Ok(commission)
    }

    /// Settles every pending commission old enough per
    /// [`FinanceSettings::settlement_delay_days`](crate::FinanceSettings::settlement_delay_days).
    ///
    /// Each commission settles in its own unit of work; failures are reported
    /// in the outcome and do not stop the batch.
    pub async fn settle_due_commissions(&self, now: DateTime<Utc>) -> ResultEngine<BatchOutcome> {
        let cutoff = now - self.settings.settlement_delay();
        let due: Vec<i64> = with_tx!(self, |db_tx| {
            let ids = commissions::Entity::find()
                .select_only()
                .column(commissions::Column::Id)
                .filter(commissions::Column::Status.eq(CommissionStatus::Pending.as_str()))
                .filter(commissions::Column::CreatedAt.lte(cutoff))
                .order_by_asc(commissions::Column::Id)
                .into_tuple::<i64>()
                .all(&db_tx)
                .await?;
            Ok::<_, EngineError>(ids)
        })?;

        let mut outcome = BatchOutcome::default();
        for id in due {
            outcome.record(id, self.settle_commission(id).await);
        }
        tracing::info!(
            "settlement run: {} settled, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Cancels every live commission of a refunded order.
    ///
    /// Settled commissions are taken back from the distributor's available
    /// balance. If any of them can no longer be covered the whole call fails
    /// with [`EngineError::Reconciliation`] and nothing is cancelled.
    pub async fn cancel_commissions_by_order(&self, order_id: i64) -> ResultEngine<Vec<Commission>> {
        with_tx!(self, |db_tx| {
            self.cancel_commissions_by_order_in(&db_tx, order_id).await
        })
    }

    pub async fn cancel_commissions_by_order_in(
        &self,
        db_tx: &DatabaseTransaction,
        order_id: i64,
    ) -> ResultEngine<Vec<Commission>> {
        let live = commissions::Entity::find()
            .filter(commissions::Column::OrderId.eq(order_id))
            .filter(commissions::Column::Status.ne(CommissionStatus::Cancelled.as_str()))
            .order_by_asc(commissions::Column::Id)
            .lock_exclusive()
            .all(db_tx)
            .await?;

        let now = Utc::now();
        let mut cancelled = Vec::with_capacity(live.len());
        for model in live {
            let mut commission = Commission::try_from(model)?;
            commission.status.ensure_transition(CommissionStatus::Cancelled)?;

            if commission.status == CommissionStatus::Settled {
                let mut distributor = self
                    .lock_distributor(db_tx, commission.distributor_id)
                    .await?;
                if let Err(err) = distributor.reverse_settled(commission.amount) {
                    tracing::warn!(
                        "order {order_id} refund cannot reverse commission {}: {err}",
                        commission.id
                    );
                    return Err(err);
                }
                distributors::ActiveModel::from(&distributor)
                    .update(db_tx)
                    .await?;
            }

            commission.status = CommissionStatus::Cancelled;
            commission.cancelled_at = Some(now);
            commissions::ActiveModel {
                id: ActiveValue::Unchanged(commission.id),
                status: ActiveValue::Set(commission.status.as_str().to_string()),
                cancelled_at: ActiveValue::Set(commission.cancelled_at),
                ..Default::default()
            }
            .update(db_tx)
            .await?;
            cancelled.push(commission);
        }

        if !cancelled.is_empty() {
            tracing::info!("order {order_id} refunded: {} commissions cancelled", cancelled.len());
        }
        Ok(cancelled)
    }

    pub async fn commission(&self, commission_id: i64) -> ResultEngine<Commission> {
        with_tx!(self, |db_tx| {
            let model = commissions::Entity::find_by_id(commission_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(commission_id))?;
            Commission::try_from(model)
        })
    }

    pub async fn commissions_by_order(&self, order_id: i64) -> ResultEngine<Vec<Commission>> {
        with_tx!(self, |db_tx| {
            commissions::Entity::find()
                .filter(commissions::Column::OrderId.eq(order_id))
                .order_by_asc(commissions::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Commission::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// A distributor's commissions, newest first.
    pub async fn distributor_commissions(
        &self,
        distributor_id: i64,
        filter: &CommissionFilter,
    ) -> ResultEngine<Vec<Commission>> {
        with_tx!(self, |db_tx| {
            let mut query = commissions::Entity::find()
                .filter(commissions::Column::DistributorId.eq(distributor_id));
            if let Some(status) = filter.status {
                query = query.filter(commissions::Column::Status.eq(status.as_str()));
            }
            query
                .order_by_desc(commissions::Column::Id)
                .limit(filter.page.limit)
                .offset(filter.page.offset)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Commission::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Direct referrer first, then its parent; unapproved levels are skipped.
    async fn resolve_beneficiaries(
        &self,
        db_tx: &DatabaseTransaction,
        consumer_id: i64,
    ) -> ResultEngine<Vec<(CommissionKind, Distributor, Rate)>> {
        let Some(binding) = referral_bindings::Entity::find_by_id(consumer_id)
            .one(db_tx)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut beneficiaries = Vec::with_capacity(2);
        let direct = self.find_distributor(db_tx, binding.distributor_id).await?;
        let parent_id = direct.parent_id;
        if direct.is_approved() {
            beneficiaries.push((CommissionKind::Direct, direct, self.settings.direct_rate()));
        }

        if let Some(parent_id) = parent_id {
            let indirect = self.find_distributor(db_tx, parent_id).await?;
            if indirect.is_approved() {
                beneficiaries.push((
                    CommissionKind::Indirect,
                    indirect,
                    self.settings.indirect_rate(),
                ));
            }
        }
        Ok(beneficiaries)
    }

    async fn find_distributor(
        &self,
        db_tx: &DatabaseTransaction,
        distributor_id: i64,
    ) -> ResultEngine<Distributor> {
        let model = distributors::Entity::find_by_id(distributor_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("distributor {distributor_id}")))?;
        Distributor::try_from(model)
    }

    async fn lock_commission(
        &self,
        db_tx: &DatabaseTransaction,
        commission_id: i64,
    ) -> ResultEngine<Commission> {
        let model = commissions::Entity::find_by_id(commission_id)
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| not_found(commission_id))?;
        Commission::try_from(model)
    }
}

fn bps_column(rate: Rate) -> ResultEngine<i32> {
    i32::try_from(rate.bps())
        .map_err(|_| EngineError::InvalidParameter(format!("rate {rate} out of range")))
}

fn not_found(commission_id: i64) -> EngineError {
    EngineError::KeyNotFound(format!("commission {commission_id}"))
}
