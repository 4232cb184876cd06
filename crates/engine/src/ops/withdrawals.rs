use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{
    EngineError, ResultEngine, WalletTransactionKind, Withdrawal, WithdrawalCmd,
    WithdrawalFilter, WithdrawalKind, WithdrawalStatus, distributors,
    util::{ensure_positive_amount, normalize_optional_text, normalize_required_text},
    withdrawals::{self, split_fee},
};

use super::{BatchOutcome, Engine, with_tx};

impl Engine {
    /// Requests a withdrawal and freezes `amount` in its source bucket.
    ///
    /// Wallet withdrawals hold the wallet balance; commission withdrawals hold
    /// the approved distributor's available commission. The row starts
    /// `pending` with `fee` and `actual_amount` already computed.
    pub async fn apply_withdrawal(&self, cmd: WithdrawalCmd) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| self.apply_withdrawal_in(&db_tx, &cmd).await)
    }

    pub async fn apply_withdrawal_in(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &WithdrawalCmd,
    ) -> ResultEngine<Withdrawal> {
        ensure_positive_amount(cmd.amount_minor)?;
        if cmd.amount_minor < self.settings.min_withdrawal_minor {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal {} below minimum {}",
                cmd.amount_minor, self.settings.min_withdrawal_minor
            )));
        }

        let distributor_id = match cmd.kind {
            WithdrawalKind::Wallet => None,
            WithdrawalKind::Commission => {
                let found = self
                    .find_distributor_by_user(db_tx, cmd.user_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::KeyNotFound(format!("distributor for user {}", cmd.user_id))
                    })?;
                if !found.is_approved() {
                    return Err(EngineError::InvalidParameter(format!(
                        "distributor {} is {}",
                        found.id,
                        found.status.as_str()
                    )));
                }
                let mut distributor = self.lock_distributor(db_tx, found.id).await?;
                distributor.freeze_for_withdrawal(cmd.amount_minor)?;
                distributors::ActiveModel::from(&distributor)
                    .update(db_tx)
                    .await?;
                Some(distributor.id)
            }
        };

        let (fee, actual_amount) = split_fee(cmd.amount_minor, self.settings.withdrawal_fee_rate());
        let now = Utc::now();
        let model = withdrawals::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(cmd.user_id),
            distributor_id: ActiveValue::Set(distributor_id),
            kind: ActiveValue::Set(cmd.kind.as_str().to_string()),
            amount: ActiveValue::Set(cmd.amount_minor),
            fee: ActiveValue::Set(fee),
            actual_amount: ActiveValue::Set(actual_amount),
            withdraw_to: ActiveValue::Set(cmd.withdraw_to.as_str().to_string()),
            account_info: ActiveValue::Set(normalize_optional_text(cmd.account_info.as_deref())),
            status: ActiveValue::Set(WithdrawalStatus::Pending.as_str().to_string()),
            reject_reason: ActiveValue::Set(None),
            reviewed_by: ActiveValue::Set(None),
            reviewed_at: ActiveValue::Set(None),
            processed_by: ActiveValue::Set(None),
            processed_at: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(db_tx)
        .await?;
        let withdrawal = Withdrawal::try_from(model)?;

        if withdrawal.kind == WithdrawalKind::Wallet {
            self.apply_wallet_change(
                db_tx,
                WalletTransactionKind::WithdrawFreeze,
                withdrawal.user_id,
                withdrawal.amount,
                Some(&withdrawal.reference_no()),
                None,
            )
            .await?;
        }

        tracing::info!(
            "withdrawal {} applied: user {} {} {} via {}",
            withdrawal.id,
            withdrawal.user_id,
            withdrawal.kind.as_str(),
            withdrawal.amount,
            withdrawal.withdraw_to.as_str()
        );
        Ok(withdrawal)
    }

    pub async fn approve_withdrawal(
        &self,
        withdrawal_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| {
            self.approve_withdrawal_in(&db_tx, withdrawal_id, operator_id)
                .await
        })
    }

    pub async fn approve_withdrawal_in(
        &self,
        db_tx: &DatabaseTransaction,
        withdrawal_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Withdrawal> {
        let mut withdrawal = self.lock_withdrawal(db_tx, withdrawal_id).await?;
        withdrawal.status.ensure_transition(WithdrawalStatus::Approved)?;

        withdrawal.status = WithdrawalStatus::Approved;
        withdrawal.reviewed_by = Some(operator_id);
        withdrawal.reviewed_at = Some(Utc::now());
        save(db_tx, &withdrawal).await?;

        tracing::info!("withdrawal {withdrawal_id} approved by operator {operator_id}");
        Ok(withdrawal)
    }

    /// Marks an approved withdrawal as handed to the payment channel.
    pub async fn process_withdrawal(
        &self,
        withdrawal_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| {
            self.process_withdrawal_in(&db_tx, withdrawal_id, operator_id)
                .await
        })
    }

    pub async fn process_withdrawal_in(
        &self,
        db_tx: &DatabaseTransaction,
        withdrawal_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Withdrawal> {
        let mut withdrawal = self.lock_withdrawal(db_tx, withdrawal_id).await?;
        withdrawal.status.ensure_transition(WithdrawalStatus::Processing)?;

        withdrawal.status = WithdrawalStatus::Processing;
        withdrawal.processed_by = Some(operator_id);
        save(db_tx, &withdrawal).await?;

        tracing::info!("withdrawal {withdrawal_id} processing by operator {operator_id}");
        Ok(withdrawal)
    }

    /// Pays out a processing withdrawal: the frozen `amount` becomes
    /// withdrawn and never returns to available.
    pub async fn complete_withdrawal(&self, withdrawal_id: i64) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| {
            self.complete_withdrawal_in(&db_tx, withdrawal_id).await
        })
    }

    pub async fn complete_withdrawal_in(
        &self,
        db_tx: &DatabaseTransaction,
        withdrawal_id: i64,
    ) -> ResultEngine<Withdrawal> {
        let mut withdrawal = self.lock_withdrawal(db_tx, withdrawal_id).await?;
        withdrawal.status.ensure_transition(WithdrawalStatus::Success)?;

        match withdrawal.distributor_id {
            Some(distributor_id) if withdrawal.kind == WithdrawalKind::Commission => {
                let mut distributor = self.lock_distributor(db_tx, distributor_id).await?;
                distributor.finalize_withdrawal(withdrawal.amount)?;
                distributors::ActiveModel::from(&distributor)
                    .update(db_tx)
                    .await?;
            }
            _ => {
                self.apply_wallet_change(
                    db_tx,
                    WalletTransactionKind::Withdraw,
                    withdrawal.user_id,
                    withdrawal.amount,
                    Some(&withdrawal.reference_no()),
                    None,
                )
                .await?;
            }
        }

        withdrawal.status = WithdrawalStatus::Success;
        withdrawal.processed_at = Some(Utc::now());
        save(db_tx, &withdrawal).await?;

        tracing::info!(
            "withdrawal {withdrawal_id} completed: {} paid, {} fee",
            withdrawal.actual_amount,
            withdrawal.fee
        );
        Ok(withdrawal)
    }

    /// Rejects a pending withdrawal and releases its frozen amount.
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: i64,
        operator_id: i64,
        reason: &str,
    ) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| {
            self.reject_withdrawal_in(&db_tx, withdrawal_id, operator_id, reason)
                .await
        })
    }

    pub async fn reject_withdrawal_in(
        &self,
        db_tx: &DatabaseTransaction,
        withdrawal_id: i64,
        operator_id: i64,
        reason: &str,
    ) -> ResultEngine<Withdrawal> {
        let reason = normalize_required_text(reason, "reject reason")?;
        let mut withdrawal = self.lock_withdrawal(db_tx, withdrawal_id).await?;
        withdrawal.status.ensure_transition(WithdrawalStatus::Rejected)?;

        match withdrawal.distributor_id {
            Some(distributor_id) if withdrawal.kind == WithdrawalKind::Commission => {
                let mut distributor = self.lock_distributor(db_tx, distributor_id).await?;
                distributor.release_withdrawal(withdrawal.amount)?;
                distributors::ActiveModel::from(&distributor)
                    .update(db_tx)
                    .await?;
            }
            _ => {
                self.apply_wallet_change(
                    db_tx,
                    WalletTransactionKind::WithdrawUnfreeze,
                    withdrawal.user_id,
                    withdrawal.amount,
                    Some(&withdrawal.reference_no()),
                    Some(&reason),
                )
                .await?;
            }
        }

        withdrawal.status = WithdrawalStatus::Rejected;
        withdrawal.reject_reason = Some(reason);
        withdrawal.reviewed_by = Some(operator_id);
        withdrawal.reviewed_at = Some(Utc::now());
        save(db_tx, &withdrawal).await?;

        tracing::info!("withdrawal {withdrawal_id} rejected by operator {operator_id}");
        Ok(withdrawal)
    }

    /// Approves each id in its own unit of work.
    pub async fn batch_approve_withdrawals(
        &self,
        withdrawal_ids: &[i64],
        operator_id: i64,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &id in withdrawal_ids {
            outcome.record(id, self.approve_withdrawal(id, operator_id).await);
        }
        outcome
    }

    /// Completes each id in its own unit of work.
    pub async fn batch_complete_withdrawals(&self, withdrawal_ids: &[i64]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &id in withdrawal_ids {
            outcome.record(id, self.complete_withdrawal(id).await);
        }
        outcome
    }

    pub async fn withdrawal(&self, withdrawal_id: i64) -> ResultEngine<Withdrawal> {
        with_tx!(self, |db_tx| {
            let model = withdrawals::Entity::find_by_id(withdrawal_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(withdrawal_id))?;
            Withdrawal::try_from(model)
        })
    }

    /// Withdrawals matching `filter`, newest first.
    pub async fn withdrawals(&self, filter: &WithdrawalFilter) -> ResultEngine<Vec<Withdrawal>> {
        with_tx!(self, |db_tx| {
            let mut query = withdrawals::Entity::find();
            if let Some(user_id) = filter.user_id {
                query = query.filter(withdrawals::Column::UserId.eq(user_id));
            }
            if let Some(kind) = filter.kind {
                query = query.filter(withdrawals::Column::Kind.eq(kind.as_str()));
            }
            if let Some(status) = filter.status {
                query = query.filter(withdrawals::Column::Status.eq(status.as_str()));
            }
            query
                .order_by_desc(withdrawals::Column::Id)
                .limit(filter.page.limit)
                .offset(filter.page.offset)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Withdrawal::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    async fn lock_withdrawal(
        &self,
        db_tx: &DatabaseTransaction,
        withdrawal_id: i64,
    ) -> ResultEngine<Withdrawal> {
        let model = withdrawals::Entity::find_by_id(withdrawal_id)
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| not_found(withdrawal_id))?;
        Withdrawal::try_from(model)
    }
}

/// Writes the workflow columns of `withdrawal`.
async fn save(db_tx: &DatabaseTransaction, withdrawal: &Withdrawal) -> ResultEngine<()> {
    withdrawals::ActiveModel {
        id: ActiveValue::Unchanged(withdrawal.id),
        status: ActiveValue::Set(withdrawal.status.as_str().to_string()),
        reject_reason: ActiveValue::Set(withdrawal.reject_reason.clone()),
        reviewed_by: ActiveValue::Set(withdrawal.reviewed_by),
        reviewed_at: ActiveValue::Set(withdrawal.reviewed_at),
        processed_by: ActiveValue::Set(withdrawal.processed_by),
        processed_at: ActiveValue::Set(withdrawal.processed_at),
        updated_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    Ok(())
}

fn not_found(withdrawal_id: i64) -> EngineError {
    EngineError::KeyNotFound(format!("withdrawal {withdrawal_id}"))
}
