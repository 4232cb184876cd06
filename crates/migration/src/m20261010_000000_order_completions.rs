use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum OrderCompletions {
    Table,
    OrderId,
    OrderNo,
    UserId,
    Amount,
    CompletedAt,
}

/// Marks an order as processed even when it yields no commission.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderCompletions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderCompletions::OrderId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderCompletions::OrderNo).string().not_null())
                    .col(
                        ColumnDef::new(OrderCompletions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderCompletions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderCompletions::CompletedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderCompletions::Table).to_owned())
            .await?;

        Ok(())
    }
}
