//! Consumer → referring distributor lookups.
//!
//! One row per consumer, written once when the consumer first uses an invite
//! code. Commission resolution starts here.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "referral_bindings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub distributor_id: i64,
    pub created_at: DateTimeUtc,
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
