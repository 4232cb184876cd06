//! Referral commissions.
//!
//! One row per (order, beneficiary). A commission is born `pending`, becomes
//! `settled` when credited to the distributor and ends `cancelled` if the
//! order is refunded.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    /// Paid to the consumer's own referrer.
    Direct,
    /// Paid to the referrer's parent.
    Indirect,
}

impl CommissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Indirect => "indirect",
        }
    }
}

impl TryFrom<&str> for CommissionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "direct" => Ok(Self::Direct),
            "indirect" => Ok(Self::Indirect),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid commission kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Settled,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Cancelled => "cancelled",
        }
    }

    /// Checks `self -> to` against the commission state machine.
    pub fn ensure_transition(self, to: CommissionStatus) -> ResultEngine<()> {
        let allowed = matches!(
            (self, to),
            (Self::Pending, Self::Settled)
                | (Self::Pending, Self::Cancelled)
                | (Self::Settled, Self::Cancelled)
        );
        if !allowed {
            return Err(EngineError::InvalidTransition(format!(
                "commission {} -> {}",
                self.as_str(),
                to.as_str()
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for CommissionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "settled" => Ok(Self::Settled),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid commission status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Commission {
    pub id: i64,
    pub distributor_id: i64,
    pub order_id: i64,
    pub order_no: String,
    /// The purchasing consumer.
    pub from_user_id: i64,
    pub kind: CommissionKind,
    pub order_amount: i64,
    pub rate_bps: u32,
    pub amount: i64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "commissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub distributor_id: i64,
    pub order_id: i64,
    pub order_no: String,
    pub from_user_id: i64,
    pub kind: String,
    pub order_amount: i64,
    pub rate_bps: i32,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub settled_at: Option<DateTimeUtc>,
    pub cancelled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::distributors::Entity",
        from = "Column::DistributorId",
        to = "super::distributors::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Distributors,
}

impl Related<super::distributors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Distributors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Commission {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            distributor_id: model.distributor_id,
            order_id: model.order_id,
            order_no: model.order_no,
            from_user_id: model.from_user_id,
            kind: CommissionKind::try_from(model.kind.as_str())?,
            order_amount: model.order_amount,
            rate_bps: u32::try_from(model.rate_bps).map_err(|_| {
                EngineError::InvalidParameter(format!("invalid rate on commission {}", model.id))
            })?,
            amount: model.amount,
            status: CommissionStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            settled_at: model.settled_at,
            cancelled_at: model.cancelled_at,
        })
    }
}
