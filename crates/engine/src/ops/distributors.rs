use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{
    Distributor, DistributorStatus, EngineError, ResultEngine,
    distributors::{self, generate_invite_code, normalize_invite_code},
    referral_bindings,
};

use super::{Engine, with_tx};

const INVITE_CODE_ATTEMPTS: usize = 5;

impl Engine {
    /// Enrolls `user_id` in the referral program as a `pending` distributor.
    ///
    /// An `invite_code` that resolves to an approved distributor becomes the
    /// parent; any other code is ignored. Team counters only move on
    /// approval.
    pub async fn apply_distributor(
        &self,
        user_id: i64,
        invite_code: Option<&str>,
    ) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            self.apply_distributor_in(&db_tx, user_id, invite_code)
                .await
        })
    }

    pub async fn apply_distributor_in(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: i64,
        invite_code: Option<&str>,
    ) -> ResultEngine<Distributor> {
        if self.find_distributor_by_user(db_tx, user_id).await?.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "distributor for user {user_id}"
            )));
        }

        let parent = match invite_code.and_then(normalize_invite_code) {
            Some(code) => {
                let parent = self.find_approved_by_code(db_tx, &code).await?;
                if parent.is_none() {
                    tracing::warn!(
                        "user {user_id} applied with unknown or inactive invite code {code}"
                    );
                }
                parent
            }
            None => None,
        };

        let invite_code = self.unique_invite_code(db_tx).await?;
        let now = Utc::now();
        let model = distributors::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            parent_id: ActiveValue::Set(parent.as_ref().map(|p| p.id)),
            invite_code: ActiveValue::Set(invite_code),
            level: ActiveValue::Set(if parent.is_some() { 2 } else { 1 }),
            status: ActiveValue::Set(DistributorStatus::Pending.as_str().to_string()),
            available_commission: ActiveValue::Set(0),
            frozen_commission: ActiveValue::Set(0),
            total_commission: ActiveValue::Set(0),
            withdrawn_commission: ActiveValue::Set(0),
            team_count: ActiveValue::Set(0),
            direct_count: ActiveValue::Set(0),
            approved_at: ActiveValue::Set(None),
            reviewed_by: ActiveValue::Set(None),
            reviewed_at: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(db_tx)
        .await?;

        if let Some(parent) = &parent
            && referral_bindings::Entity::find_by_id(user_id)
                .one(db_tx)
                .await?
                .is_none()
        {
            self.insert_binding(db_tx, user_id, parent.id).await?;
        }

        let distributor = Distributor::try_from(model)?;
        tracing::info!(
            "user {user_id} applied as distributor {} (parent {:?})",
            distributor.id,
            distributor.parent_id
        );
        Ok(distributor)
    }

    /// Approves a pending distributor and grows its upline's team counters:
    /// the parent gains one direct member and one team member, the
    /// grandparent one team member.
    pub async fn approve_distributor(
        &self,
        distributor_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            self.approve_distributor_in(&db_tx, distributor_id, operator_id)
                .await
        })
    }

    pub async fn approve_distributor_in(
        &self,
        db_tx: &DatabaseTransaction,
        distributor_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Distributor> {
        let mut distributor = self.lock_distributor(db_tx, distributor_id).await?;
        ensure_pending(&distributor)?;

        let now = Utc::now();
        distributor.status = DistributorStatus::Approved;
        distributor.approved_at = Some(now);
        distributor.reviewed_by = Some(operator_id);
        distributor.reviewed_at = Some(now);
        distributors::ActiveModel::from(&distributor)
            .update(db_tx)
            .await?;

        if let Some(parent_id) = distributor.parent_id {
            let mut parent = self.lock_distributor(db_tx, parent_id).await?;
            parent.direct_count += 1;
            parent.team_count += 1;
            distributors::ActiveModel::from(&parent).update(db_tx).await?;

            if let Some(grandparent_id) = parent.parent_id {
                let mut grandparent = self.lock_distributor(db_tx, grandparent_id).await?;
                grandparent.team_count += 1;
                distributors::ActiveModel::from(&grandparent)
                    .update(db_tx)
                    .await?;
            }
        }

        tracing::info!("distributor {distributor_id} approved by operator {operator_id}");
        Ok(distributor)
    }

    pub async fn reject_distributor(
        &self,
        distributor_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            self.reject_distributor_in(&db_tx, distributor_id, operator_id)
                .await
        })
    }

    pub async fn reject_distributor_in(
        &self,
        db_tx: &DatabaseTransaction,
        distributor_id: i64,
        operator_id: i64,
    ) -> ResultEngine<Distributor> {
        let mut distributor = self.lock_distributor(db_tx, distributor_id).await?;
        ensure_pending(&distributor)?;

        distributor.status = DistributorStatus::Rejected;
        distributor.reviewed_by = Some(operator_id);
        distributor.reviewed_at = Some(Utc::now());
        distributors::ActiveModel::from(&distributor)
            .update(db_tx)
            .await?;

        tracing::info!("distributor {distributor_id} rejected by operator {operator_id}");
        Ok(distributor)
    }

    /// Records that `user_id` was referred by the owner of `invite_code`.
    ///
    /// A consumer is bound once; the code must belong to an approved
    /// distributor other than the consumer's own.
    pub async fn bind_referrer(&self, user_id: i64, invite_code: &str) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            let code = normalize_invite_code(invite_code).ok_or_else(|| {
                EngineError::InvalidParameter("invite code must not be empty".to_string())
            })?;
            let referrer = self
                .find_approved_by_code(&db_tx, &code)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("invite code {code}")))?;
            if referrer.user_id == user_id {
                return Err(EngineError::InvalidParameter(
                    "cannot use your own invite code".to_string(),
                ));
            }
            if referral_bindings::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(format!(
                    "referrer for user {user_id}"
                )));
            }
            self.insert_binding(&db_tx, user_id, referrer.id).await?;
            tracing::info!("user {user_id} bound to distributor {}", referrer.id);
            Ok(referrer)
        })
    }

    pub async fn distributor(&self, distributor_id: i64) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            let model = distributors::Entity::find_by_id(distributor_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(distributor_id))?;
            Distributor::try_from(model)
        })
    }

    pub async fn distributor_by_user(&self, user_id: i64) -> ResultEngine<Distributor> {
        with_tx!(self, |db_tx| {
            self.find_distributor_by_user(&db_tx, user_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("distributor for user {user_id}")))
        })
    }

    pub async fn distributor_by_invite_code(&self, invite_code: &str) -> ResultEngine<Distributor> {
        let code = normalize_invite_code(invite_code)
            .ok_or_else(|| EngineError::InvalidParameter("invite code must not be empty".to_string()))?;
        with_tx!(self, |db_tx| {
            let model = distributors::Entity::find()
                .filter(distributors::Column::InviteCode.eq(code.as_str()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("invite code {code}")))?;
            Distributor::try_from(model)
        })
    }

    /// Distributors enrolled directly under `distributor_id`.
    pub async fn team_members(&self, distributor_id: i64) -> ResultEngine<Vec<Distributor>> {
        with_tx!(self, |db_tx| {
            distributors::Entity::find()
                .filter(distributors::Column::ParentId.eq(distributor_id))
                .order_by_asc(distributors::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Distributor::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub(super) async fn lock_distributor(
        &self,
        db_tx: &DatabaseTransaction,
        distributor_id: i64,
    ) -> ResultEngine<Distributor> {
        let model = distributors::Entity::find_by_id(distributor_id)
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| not_found(distributor_id))?;
        Distributor::try_from(model)
    }

    pub(super) async fn find_distributor_by_user(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultEngine<Option<Distributor>> {
        distributors::Entity::find()
            .filter(distributors::Column::UserId.eq(user_id))
            .one(db_tx)
            .await?
            .map(Distributor::try_from)
            .transpose()
    }

    async fn find_approved_by_code(
        &self,
        db_tx: &DatabaseTransaction,
        code: &str,
    ) -> ResultEngine<Option<Distributor>> {
        distributors::Entity::find()
            .filter(distributors::Column::InviteCode.eq(code))
            .filter(distributors::Column::Status.eq(DistributorStatus::Approved.as_str()))
            .one(db_tx)
            .await?
            .map(Distributor::try_from)
            .transpose()
    }

    async fn unique_invite_code(&self, db_tx: &DatabaseTransaction) -> ResultEngine<String> {
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            let taken = distributors::Entity::find()
                .filter(distributors::Column::InviteCode.eq(code.as_str()))
                .one(db_tx)
                .await?
                .is_some();
            if !taken {
                return Ok(code);
            }
        }
        Err(EngineError::ExistingKey(
            "no free invite code after retries".to_string(),
        ))
    }

    async fn insert_binding(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: i64,
        distributor_id: i64,
    ) -> ResultEngine<()> {
        referral_bindings::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            distributor_id: ActiveValue::Set(distributor_id),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db_tx)
        .await?;
        Ok(())
    }
}

fn ensure_pending(distributor: &Distributor) -> ResultEngine<()> {
    if distributor.status != DistributorStatus::Pending {
        return Err(EngineError::InvalidTransition(format!(
            "distributor {} is {}",
            distributor.id,
            distributor.status.as_str()
        )));
    }
    Ok(())
}

fn not_found(distributor_id: i64) -> EngineError {
    EngineError::KeyNotFound(format!("distributor {distributor_id}"))
}
