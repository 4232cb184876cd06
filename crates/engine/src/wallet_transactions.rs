//! Append-only wallet log.
//!
//! Every mutation of a [`Wallet`](crate::Wallet) writes exactly one row here,
//! with before/after snapshots of both buckets. The log is never updated or
//! deleted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionKind {
    Recharge,
    Consume,
    Refund,
    FreezeDeposit,
    UnfreezeDeposit,
    DeductFrozen,
    WithdrawFreeze,
    WithdrawUnfreeze,
    Withdraw,
}

impl WalletTransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recharge => "recharge",
            Self::Consume => "consume",
            Self::Refund => "refund",
            Self::FreezeDeposit => "freeze_deposit",
            Self::UnfreezeDeposit => "unfreeze_deposit",
            Self::DeductFrozen => "deduct_frozen",
            Self::WithdrawFreeze => "withdraw_freeze",
            Self::WithdrawUnfreeze => "withdraw_unfreeze",
            Self::Withdraw => "withdraw",
        }
    }
}

impl TryFrom<&str> for WalletTransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "recharge" => Ok(Self::Recharge),
            "consume" => Ok(Self::Consume),
            "refund" => Ok(Self::Refund),
            "freeze_deposit" => Ok(Self::FreezeDeposit),
            "unfreeze_deposit" => Ok(Self::UnfreezeDeposit),
            "deduct_frozen" => Ok(Self::DeductFrozen),
            "withdraw_freeze" => Ok(Self::WithdrawFreeze),
            "withdraw_unfreeze" => Ok(Self::WithdrawUnfreeze),
            "withdraw" => Ok(Self::Withdraw),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid wallet transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: WalletTransactionKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub frozen_before: i64,
    pub frozen_after: i64,
    /// External reference (order number, withdrawal id) for traceability.
    pub reference_no: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Net change of `balance + frozen_balance` caused by this row.
    pub fn net_change(&self) -> i64 {
        (self.balance_after - self.balance_before) + (self.frozen_after - self.frozen_before)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub frozen_before: i64,
    pub frozen_after: i64,
    pub reference_no: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::UserId",
        to = "super::wallets::Column::UserId",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for WalletTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            kind: WalletTransactionKind::try_from(model.kind.as_str())?,
            amount: model.amount,
            balance_before: model.balance_before,
            balance_after: model.balance_after,
            frozen_before: model.frozen_before,
            frozen_after: model.frozen_after,
            reference_no: model.reference_no,
            remark: model.remark,
            created_at: model.created_at,
        })
    }
}
