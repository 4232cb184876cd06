//! Withdrawal requests.
//!
//! ```text
//! pending --approve--> approved --process--> processing --complete--> success
//! pending --reject--> rejected
//! ```
//!
//! Applying freezes `amount` in the source bucket (wallet balance or
//! distributor commission). `success` pays the frozen amount out; `rejected`
//! releases it back to available.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Rate, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    /// Paid from the user's wallet balance.
    Wallet,
    /// Paid from the user's distributor commission.
    Commission,
}

impl WithdrawalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Commission => "commission",
        }
    }
}

impl TryFrom<&str> for WithdrawalKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "wallet" => Ok(Self::Wallet),
            "commission" => Ok(Self::Commission),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid withdrawal kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawChannel {
    Wechat,
    Alipay,
    BankCard,
}

impl WithdrawChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wechat => "wechat",
            Self::Alipay => "alipay",
            Self::BankCard => "bank_card",
        }
    }
}

impl TryFrom<&str> for WithdrawChannel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "wechat" => Ok(Self::Wechat),
            "alipay" => Ok(Self::Alipay),
            "bank_card" => Ok(Self::BankCard),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid withdraw channel: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Processing,
    Success,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Rejected => "rejected",
        }
    }

    /// The only state `to` may be entered from.
    fn required_predecessor(to: WithdrawalStatus) -> Option<WithdrawalStatus> {
        match to {
            Self::Pending => None,
            Self::Approved | Self::Rejected => Some(Self::Pending),
            Self::Processing => Some(Self::Approved),
            Self::Success => Some(Self::Processing),
        }
    }

    pub fn ensure_transition(self, to: WithdrawalStatus) -> ResultEngine<()> {
        if Self::required_predecessor(to) != Some(self) {
            return Err(EngineError::InvalidTransition(format!(
                "withdrawal {} -> {}",
                self.as_str(),
                to.as_str()
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for WithdrawalStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid withdrawal status: {other}"
            ))),
        }
    }
}

/// Fee withheld and amount actually paid out for a requested `amount_minor`.
pub fn split_fee(amount_minor: i64, fee_rate: Rate) -> (i64, i64) {
    let fee = fee_rate.apply(amount_minor);
    (fee, amount_minor - fee)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    /// Set for commission withdrawals.
    pub distributor_id: Option<i64>,
    pub kind: WithdrawalKind,
    pub amount: i64,
    pub fee: i64,
    pub actual_amount: i64,
    pub withdraw_to: WithdrawChannel,
    pub account_info: Option<String>,
    pub status: WithdrawalStatus,
    pub reject_reason: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Reference written on wallet log rows caused by this withdrawal.
    pub fn reference_no(&self) -> String {
        format!("withdrawal:{}", self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "withdrawals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub distributor_id: Option<i64>,
    pub kind: String,
    pub amount: i64,
    pub fee: i64,
    pub actual_amount: i64,
    pub withdraw_to: String,
    pub account_info: Option<String>,
    pub status: String,
    pub reject_reason: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTimeUtc>,
    pub processed_by: Option<i64>,
    pub processed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Withdrawal {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            distributor_id: model.distributor_id,
            kind: WithdrawalKind::try_from(model.kind.as_str())?,
            amount: model.amount,
            fee: model.fee,
            actual_amount: model.actual_amount,
            withdraw_to: WithdrawChannel::try_from(model.withdraw_to.as_str())?,
            account_info: model.account_info,
            status: WithdrawalStatus::try_from(model.status.as_str())?,
            reject_reason: model.reject_reason,
            reviewed_by: model.reviewed_by,
            reviewed_at: model.reviewed_at,
            processed_by: model.processed_by,
            processed_at: model.processed_at,
            created_at: model.created_at,
        })
    }
}
