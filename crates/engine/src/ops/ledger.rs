use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{
    EngineError, LedgerCmd, ResultEngine, Wallet, WalletTransaction, WalletTransactionFilter,
    WalletTransactionKind,
    util::{ensure_positive_amount, normalize_optional_text},
    wallet_transactions, wallets,
};

use super::{Engine, with_tx};

/// Generates a ledger operation and its transaction-scoped `_in` twin.
macro_rules! impl_ledger_op {
    ($(#[$doc:meta])* $name:ident, $name_in:ident, $kind:expr) => {
        $(#[$doc])*
        pub async fn $name(&self, cmd: LedgerCmd) -> ResultEngine<WalletTransaction> {
            with_tx!(self, |db_tx| self.$name_in(&db_tx, &cmd).await)
        }

        #[doc = concat!("[`Engine::", stringify!($name), "`] inside a caller-owned transaction.")]
        pub async fn $name_in(
            &self,
            db_tx: &DatabaseTransaction,
            cmd: &LedgerCmd,
        ) -> ResultEngine<WalletTransaction> {
            let record = self
                .apply_wallet_change(
                    db_tx,
                    $kind,
                    cmd.user_id,
                    cmd.amount_minor,
                    cmd.reference_no.as_deref(),
                    cmd.remark.as_deref(),
                )
                .await?;
            tracing::info!(
                "wallet {} {} {} (balance {} -> {})",
                record.user_id,
                record.kind.as_str(),
                record.amount,
                record.balance_before,
                record.balance_after
            );
            Ok(record)
        }
    };
}

impl Engine {
    impl_ledger_op!(
        /// Credits the spendable balance.
        recharge,
        recharge_in,
        WalletTransactionKind::Recharge
    );

    impl_ledger_op!(
        /// Pays from the spendable balance. Requires `balance >= amount`.
        consume,
        consume_in,
        WalletTransactionKind::Consume
    );

    impl_ledger_op!(
        /// Returns money to the spendable balance.
        refund,
        refund_in,
        WalletTransactionKind::Refund
    );

    impl_ledger_op!(
        /// Holds part of the balance (e.g. a rental deposit). Requires
        /// `balance >= amount`.
        freeze_deposit,
        freeze_deposit_in,
        WalletTransactionKind::FreezeDeposit
    );

    impl_ledger_op!(
        /// Releases a held amount back to the balance. Requires
        /// `frozen_balance >= amount`.
        unfreeze_deposit,
        unfreeze_deposit_in,
        WalletTransactionKind::UnfreezeDeposit
    );

    impl_ledger_op!(
        /// Settles a charge out of the held amount. Requires
        /// `frozen_balance >= amount`.
        deduct_frozen_to_consume,
        deduct_frozen_to_consume_in,
        WalletTransactionKind::DeductFrozen
    );

    /// Return the user's wallet, creating an empty one on first access.
    pub async fn wallet(&self, user_id: i64) -> ResultEngine<Wallet> {
        with_tx!(self, |db_tx| {
            let model = self.lock_wallet(&db_tx, user_id).await?;
            Ok(Wallet::from(model))
        })
    }

    /// Wallet log, newest first.
    pub async fn wallet_transactions(
        &self,
        user_id: i64,
        filter: &WalletTransactionFilter,
    ) -> ResultEngine<Vec<WalletTransaction>> {
        with_tx!(self, |db_tx| {
            let mut query = wallet_transactions::Entity::find()
                .filter(wallet_transactions::Column::UserId.eq(user_id));
            if let Some(kind) = filter.kind {
                query = query.filter(wallet_transactions::Column::Kind.eq(kind.as_str()));
            }
            let rows = query
                .order_by_desc(wallet_transactions::Column::Id)
                .limit(filter.page.limit)
                .offset(filter.page.offset)
                .all(&db_tx)
                .await?;
            rows.into_iter()
                .map(WalletTransaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Replays the wallet log and compares it with the stored buckets.
    ///
    /// Returns [`EngineError::Reconciliation`] when `balance` or
    /// `frozen_balance` differs from the totals implied by the log.
    pub async fn audit_wallet(&self, user_id: i64) -> ResultEngine<Wallet> {
        with_tx!(self, |db_tx| {
            let wallet = Wallet::from(self.lock_wallet(&db_tx, user_id).await?);
            let rows = wallet_transactions::Entity::find()
                .filter(wallet_transactions::Column::UserId.eq(user_id))
                .order_by_asc(wallet_transactions::Column::Id)
                .all(&db_tx)
                .await?;

            let mut replayed = Wallet::new(user_id);
            for row in rows {
                let record = WalletTransaction::try_from(row)?;
                if record.balance_before != replayed.balance
                    || record.frozen_before != replayed.frozen_balance
                {
                    return Err(EngineError::Reconciliation(format!(
                        "wallet {user_id} log row {} does not chain from the previous row",
                        record.id
                    )));
                }
                replayed.apply(record.kind, record.amount)?;
            }

            if (replayed.balance, replayed.frozen_balance)
                != (wallet.balance, wallet.frozen_balance)
            {
                tracing::warn!(
                    "wallet {user_id} drifted: stored {}/{}, replayed {}/{}",
                    wallet.balance,
                    wallet.frozen_balance,
                    replayed.balance,
                    replayed.frozen_balance
                );
                return Err(EngineError::Reconciliation(format!(
                    "wallet {user_id} balances do not match its log"
                )));
            }
            Ok(wallet)
        })
    }

    /// Locks the wallet row, inserting an empty wallet if the user has none.
    pub(super) async fn lock_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultEngine<wallets::Model> {
        if let Some(model) = wallets::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(db_tx)
            .await?
        {
            return Ok(model);
        }

        let now = Utc::now();
        let model = wallets::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            balance: ActiveValue::Set(0),
            frozen_balance: ActiveValue::Set(0),
            total_recharged: ActiveValue::Set(0),
            total_consumed: ActiveValue::Set(0),
            total_withdrawn: ActiveValue::Set(0),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(db_tx)
        .await?;
        tracing::debug!("created wallet for user {user_id}");
        Ok(model)
    }

    /// Read-modify-write of one wallet plus its log row.
    ///
    /// Shared by the public ledger operations and the withdrawal workflow.
    pub(super) async fn apply_wallet_change(
        &self,
        db_tx: &DatabaseTransaction,
        kind: WalletTransactionKind,
        user_id: i64,
        amount_minor: i64,
        reference_no: Option<&str>,
        remark: Option<&str>,
    ) -> ResultEngine<WalletTransaction> {
        ensure_positive_amount(amount_minor)?;

        let before = Wallet::from(self.lock_wallet(db_tx, user_id).await?);
        let mut after = before.clone();
        after.apply(kind, amount_minor)?;
        after.updated_at = Utc::now();

        wallets::ActiveModel::from(&after).update(db_tx).await?;

        let record = wallet_transactions::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            amount: ActiveValue::Set(amount_minor),
            balance_before: ActiveValue::Set(before.balance),
            balance_after: ActiveValue::Set(after.balance),
            frozen_before: ActiveValue::Set(before.frozen_balance),
            frozen_after: ActiveValue::Set(after.frozen_balance),
            reference_no: ActiveValue::Set(normalize_optional_text(reference_no)),
            remark: ActiveValue::Set(normalize_optional_text(remark)),
            created_at: ActiveValue::Set(after.updated_at),
        }
        .insert(db_tx)
        .await?;

        WalletTransaction::try_from(record)
    }
}
