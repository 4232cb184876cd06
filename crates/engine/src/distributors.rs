//! Referral program members.
//!
//! A distributor is a user enrolled in the referral program. `parent_id` is a
//! plain id lookup into this same table (the distributor whose invite code was
//! used), never an owning link.
//!
//! Commission buckets follow the invariant
//! `total_commission = available_commission + frozen_commission + withdrawn_commission`.
//! Settled commission enters `available`; a withdrawal moves it to `frozen`
//! and then to `withdrawn`. Cancelled commission is removed from `available`
//! and `total` together.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

pub(crate) const INVITE_CODE_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorStatus {
    Pending,
    Approved,
    Rejected,
}

impl DistributorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for DistributorStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidParameter(format!(
                "invalid distributor status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Distributor {
    pub id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub invite_code: String,
    /// 1 for a root distributor, 2 when enrolled under a parent.
    pub level: i32,
    pub status: DistributorStatus,
    pub available_commission: i64,
    pub frozen_commission: i64,
    pub total_commission: i64,
    pub withdrawn_commission: i64,
    pub team_count: i64,
    pub direct_count: i64,
    pub approved_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Distributor {
    pub fn is_approved(&self) -> bool {
        self.status == DistributorStatus::Approved
    }

    /// Settled commission becomes withdrawable.
    pub fn credit_settled(&mut self, amount_minor: i64) -> ResultEngine<()> {
        let available = checked(self.available_commission.checked_add(amount_minor))?;
        let total = checked(self.total_commission.checked_add(amount_minor))?;
        self.available_commission = available;
        self.total_commission = total;
        Ok(())
    }

    /// Takes back a settled commission cancelled by a refund.
    ///
    /// There is no clamp: if the amount already left `available` (frozen for
    /// or paid out by a withdrawal) the reversal is refused.
    pub fn reverse_settled(&mut self, amount_minor: i64) -> ResultEngine<()> {
        if self.available_commission < amount_minor {
            return Err(EngineError::Reconciliation(format!(
                "distributor {} has {} available, cannot reverse {}",
                self.id, self.available_commission, amount_minor
            )));
        }
        self.available_commission -= amount_minor;
        self.total_commission -= amount_minor;
        Ok(())
    }

    pub fn freeze_for_withdrawal(&mut self, amount_minor: i64) -> ResultEngine<()> {
        if self.available_commission < amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "distributor {} available commission {} < {}",
                self.id, self.available_commission, amount_minor
            )));
        }
        self.available_commission -= amount_minor;
        self.frozen_commission += amount_minor;
        Ok(())
    }

    pub fn release_withdrawal(&mut self, amount_minor: i64) -> ResultEngine<()> {
        self.ensure_frozen(amount_minor)?;
        self.frozen_commission -= amount_minor;
        self.available_commission += amount_minor;
        Ok(())
    }

    pub fn finalize_withdrawal(&mut self, amount_minor: i64) -> ResultEngine<()> {
        self.ensure_frozen(amount_minor)?;
        self.frozen_commission -= amount_minor;
        self.withdrawn_commission += amount_minor;
        Ok(())
    }

    fn ensure_frozen(&self, amount_minor: i64) -> ResultEngine<()> {
        if self.frozen_commission < amount_minor {
            return Err(EngineError::InsufficientFrozen(format!(
                "distributor {} frozen commission {} < {}",
                self.id, self.frozen_commission, amount_minor
            )));
        }
        Ok(())
    }
}

fn checked(value: Option<i64>) -> ResultEngine<i64> {
    value.ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
}

/// Returns a fresh candidate invite code (uppercase hex, [`INVITE_CODE_LEN`]
/// characters). Uniqueness is checked by the caller.
pub(crate) fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..INVITE_CODE_LEN].to_ascii_uppercase()
}

/// Canonical form used for lookups.
pub(crate) fn normalize_invite_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    (!code.is_empty()).then_some(code)
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "distributors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    pub parent_id: Option<i64>,
    #[sea_orm(unique)]
    pub invite_code: String,
    pub level: i32,
    pub status: String,
    pub available_commission: i64,
    pub frozen_commission: i64,
    pub total_commission: i64,
    pub withdrawn_commission: i64,
    pub team_count: i64,
    pub direct_count: i64,
    pub approved_at: Option<DateTimeUtc>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commissions::Entity")]
    Commissions,
}

impl Related<super::commissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Distributor {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            parent_id: model.parent_id,
            invite_code: model.invite_code,
            level: model.level,
            status: DistributorStatus::try_from(model.status.as_str())?,
            available_commission: model.available_commission,
            frozen_commission: model.frozen_commission,
            total_commission: model.total_commission,
            withdrawn_commission: model.withdrawn_commission,
            team_count: model.team_count,
            direct_count: model.direct_count,
            approved_at: model.approved_at,
            reviewed_by: model.reviewed_by,
            reviewed_at: model.reviewed_at,
            created_at: model.created_at,
        })
    }
}

impl From<&Distributor> for ActiveModel {
    /// Mutable columns only, keyed by `id`.
    fn from(value: &Distributor) -> Self {
        Self {
            id: ActiveValue::Unchanged(value.id),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            available_commission: ActiveValue::Set(value.available_commission),
            frozen_commission: ActiveValue::Set(value.frozen_commission),
            total_commission: ActiveValue::Set(value.total_commission),
            withdrawn_commission: ActiveValue::Set(value.withdrawn_commission),
            team_count: ActiveValue::Set(value.team_count),
            direct_count: ActiveValue::Set(value.direct_count),
            approved_at: ActiveValue::Set(value.approved_at),
            reviewed_by: ActiveValue::Set(value.reviewed_by),
            reviewed_at: ActiveValue::Set(value.reviewed_at),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
    }
}
