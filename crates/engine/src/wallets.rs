//! The module contains `Wallet` struct and its implementation.
//!
//! A wallet holds a user's spendable `balance` and the `frozen_balance` held
//! against pending obligations (rental deposits, in-flight withdrawals).
//! Amounts are integer minor units. Both buckets are never negative.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;

use crate::{EngineError, ResultEngine, WalletTransactionKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: i64,
    pub frozen_balance: i64,
    pub total_recharged: i64,
    pub total_consumed: i64,
    pub total_withdrawn: i64,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            balance: 0,
            frozen_balance: 0,
            total_recharged: 0,
            total_consumed: 0,
            total_withdrawn: 0,
            updated_at: Utc::now(),
        }
    }

    /// Applies one ledger movement of `amount_minor` to the buckets.
    ///
    /// Fails without touching `self` when the source bucket cannot cover the
    /// amount.
    pub fn apply(&mut self, kind: WalletTransactionKind, amount_minor: i64) -> ResultEngine<()> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }

        let mut next = self.clone();
        match kind {
            WalletTransactionKind::Recharge => {
                next.balance = credit(next.balance, amount_minor)?;
                next.total_recharged = credit(next.total_recharged, amount_minor)?;
            }
            WalletTransactionKind::Consume => {
                next.balance = next.debit_available(amount_minor)?;
                next.total_consumed = credit(next.total_consumed, amount_minor)?;
            }
            WalletTransactionKind::Refund => {
                next.balance = credit(next.balance, amount_minor)?;
            }
            WalletTransactionKind::FreezeDeposit | WalletTransactionKind::WithdrawFreeze => {
                next.balance = next.debit_available(amount_minor)?;
                next.frozen_balance = credit(next.frozen_balance, amount_minor)?;
            }
            WalletTransactionKind::UnfreezeDeposit | WalletTransactionKind::WithdrawUnfreeze => {
                next.frozen_balance = next.debit_frozen(amount_minor)?;
                next.balance = credit(next.balance, amount_minor)?;
            }
            WalletTransactionKind::DeductFrozen => {
                next.frozen_balance = next.debit_frozen(amount_minor)?;
                next.total_consumed = credit(next.total_consumed, amount_minor)?;
            }
            WalletTransactionKind::Withdraw => {
                next.frozen_balance = next.debit_frozen(amount_minor)?;
                next.total_withdrawn = credit(next.total_withdrawn, amount_minor)?;
            }
        }

        *self = next;
        Ok(())
    }

    fn debit_available(&self, amount_minor: i64) -> ResultEngine<i64> {
        if self.balance < amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "wallet {} balance {} < {}",
                self.user_id, self.balance, amount_minor
            )));
        }
        Ok(self.balance - amount_minor)
    }

    fn debit_frozen(&self, amount_minor: i64) -> ResultEngine<i64> {
        if self.frozen_balance < amount_minor {
            return Err(EngineError::InsufficientFrozen(format!(
                "wallet {} frozen balance {} < {}",
                self.user_id, self.frozen_balance, amount_minor
            )));
        }
        Ok(self.frozen_balance - amount_minor)
    }
}

fn credit(current: i64, amount_minor: i64) -> ResultEngine<i64> {
    current
        .checked_add(amount_minor)
        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub balance: i64,
    pub frozen_balance: i64,
    pub total_recharged: i64,
    pub total_consumed: i64,
    pub total_withdrawn: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_transactions::Entity")]
    Transactions,
}

impl Related<super::wallet_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Wallet {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            balance: model.balance,
            frozen_balance: model.frozen_balance,
            total_recharged: model.total_recharged,
            total_consumed: model.total_consumed,
            total_withdrawn: model.total_withdrawn,
            updated_at: model.updated_at,
        }
    }
}

impl From<&Wallet> for ActiveModel {
    /// Balance columns only; `created_at` is left untouched.
    fn from(value: &Wallet) -> Self {
        Self {
            user_id: ActiveValue::Unchanged(value.user_id),
            balance: ActiveValue::Set(value.balance),
            frozen_balance: ActiveValue::Set(value.frozen_balance),
            total_recharged: ActiveValue::Set(value.total_recharged),
            total_consumed: ActiveValue::Set(value.total_consumed),
            total_withdrawn: ActiveValue::Set(value.total_withdrawn),
            created_at: ActiveValue::NotSet,
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with(balance: i64, frozen_balance: i64) -> Wallet {
        Wallet {
            balance,
            frozen_balance,
            ..Wallet::new(7)
        }
    }

    #[test]
    fn recharge_then_consume() {
        let mut wallet = Wallet::new(7);
        wallet.apply(WalletTransactionKind::Recharge, 10_000).unwrap();
        wallet.apply(WalletTransactionKind::Consume, 2_500).unwrap();

        assert_eq!(wallet.balance, 7_500);
        assert_eq!(wallet.total_recharged, 10_000);
        assert_eq!(wallet.total_consumed, 2_500);
    }

    #[test]
    fn consume_more_than_balance_leaves_wallet_untouched() {
        let mut wallet = wallet_with(100, 0);
        let before = wallet.clone();
        let err = wallet
            .apply(WalletTransactionKind::Consume, 101)
            .unwrap_err();

        assert!(matches!(err, EngineError::InsufficientFunds(_)));
        assert_eq!(wallet, before);
    }

    #[test]
    fn freeze_and_unfreeze_keep_total() {
        let mut wallet = wallet_with(1_000, 0);
        wallet.apply(WalletTransactionKind::FreezeDeposit, 400).unwrap();
        assert_eq!((wallet.balance, wallet.frozen_balance), (600, 400));

        wallet.apply(WalletTransactionKind::UnfreezeDeposit, 150).unwrap();
        assert_eq!((wallet.balance, wallet.frozen_balance), (750, 250));
    }

    #[test]
    fn deduct_frozen_requires_frozen_funds() {
        let mut wallet = wallet_with(1_000, 50);
        let err = wallet
            .apply(WalletTransactionKind::DeductFrozen, 60)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFrozen(_)));

        wallet.apply(WalletTransactionKind::DeductFrozen, 50).unwrap();
        assert_eq!(wallet.frozen_balance, 0);
        assert_eq!(wallet.total_consumed, 50);
        assert_eq!(wallet.balance, 1_000);
    }

    #[test]
    fn withdraw_moves_frozen_to_withdrawn() {
        let mut wallet = wallet_with(500, 0);
        wallet.apply(WalletTransactionKind::WithdrawFreeze, 500).unwrap();
        wallet.apply(WalletTransactionKind::Withdraw, 500).unwrap();

        assert_eq!((wallet.balance, wallet.frozen_balance), (0, 0));
        assert_eq!(wallet.total_withdrawn, 500);
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let mut wallet = wallet_with(500, 0);
        for amount in [0, -1] {
            let err = wallet
                .apply(WalletTransactionKind::Refund, amount)
                .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn overflow_is_rejected() {
        let mut wallet = wallet_with(i64::MAX, 0);
        let err = wallet.apply(WalletTransactionKind::Recharge, 1).unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount("amount too large".to_string()));
    }
}
