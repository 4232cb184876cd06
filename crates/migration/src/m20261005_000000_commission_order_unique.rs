use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Commissions {
    Table,
    OrderId,
    Kind,
}

/// An order yields at most one direct and one indirect commission.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("uidx-commissions-order_id-kind")
                    .table(Commissions::Table)
                    .col(Commissions::OrderId)
                    .col(Commissions::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uidx-commissions-order_id-kind")
                    .table(Commissions::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
