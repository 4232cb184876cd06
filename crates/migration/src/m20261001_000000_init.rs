//! Initial schema for the finance core.
//!
//! - `wallets`: one row per user, balance buckets in minor units
//! - `wallet_transactions`: append-only wallet log with before/after snapshots
//! - `distributors`: referral program members and their commission buckets
//! - `referral_bindings`: which distributor referred a consumer
//! - `commissions`: per-order referral commissions
//! - `withdrawals`: wallet and commission payout requests

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Wallets {
    Table,
    UserId,
    Balance,
    FrozenBalance,
    TotalRecharged,
    TotalConsumed,
    TotalWithdrawn,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum WalletTransactions {
    Table,
    Id,
    UserId,
    Kind,
    Amount,
    BalanceBefore,
    BalanceAfter,
    FrozenBefore,
    FrozenAfter,
    ReferenceNo,
    Remark,
    CreatedAt,
}

#[derive(Iden)]
enum Distributors {
    Table,
    Id,
    UserId,
    ParentId,
    InviteCode,
    Level,
    Status,
    AvailableCommission,
    FrozenCommission,
    TotalCommission,
    WithdrawnCommission,
    TeamCount,
    DirectCount,
    ApprovedAt,
    ReviewedBy,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ReferralBindings {
    Table,
    UserId,
    DistributorId,
    CreatedAt,
}

#[derive(Iden)]
enum Commissions {
    Table,
    Id,
    DistributorId,
    OrderId,
    OrderNo,
    FromUserId,
    Kind,
    OrderAmount,
    RateBps,
    Amount,
    Status,
    CreatedAt,
    SettledAt,
    CancelledAt,
}

#[derive(Iden)]
enum Withdrawals {
    Table,
    Id,
    UserId,
    DistributorId,
    Kind,
    Amount,
    Fee,
    ActualAmount,
    WithdrawTo,
    AccountInfo,
    Status,
    RejectReason,
    ReviewedBy,
    ReviewedAt,
    ProcessedBy,
    ProcessedAt,
    CreatedAt,
    UpdatedAt,
}

fn bigint_zero(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn id(column: impl IntoIden) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Wallets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(bigint_zero(Wallets::Balance))
                    .col(bigint_zero(Wallets::FrozenBalance))
                    .col(bigint_zero(Wallets::TotalRecharged))
                    .col(bigint_zero(Wallets::TotalConsumed))
                    .col(bigint_zero(Wallets::TotalWithdrawn))
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Wallet transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(WalletTransactions::Table)
                    .if_not_exists()
                    .col(id(WalletTransactions::Id))
                    .col(
                        ColumnDef::new(WalletTransactions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(WalletTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(bigint_zero(WalletTransactions::BalanceBefore))
                    .col(bigint_zero(WalletTransactions::BalanceAfter))
                    .col(bigint_zero(WalletTransactions::FrozenBefore))
                    .col(bigint_zero(WalletTransactions::FrozenAfter))
                    .col(ColumnDef::new(WalletTransactions::ReferenceNo).string())
                    .col(ColumnDef::new(WalletTransactions::Remark).string())
                    .col(
                        ColumnDef::new(WalletTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallet_transactions-user_id")
                            .from(WalletTransactions::Table, WalletTransactions::UserId)
                            .to(Wallets::Table, Wallets::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_transactions-user_id-id")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::UserId)
                    .col(WalletTransactions::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallet_transactions-reference_no")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::ReferenceNo)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Distributors
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Distributors::Table)
                    .if_not_exists()
                    .col(id(Distributors::Id))
                    .col(
                        ColumnDef::new(Distributors::UserId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Distributors::ParentId).big_integer())
                    .col(
                        ColumnDef::new(Distributors::InviteCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Distributors::Level)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Distributors::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(bigint_zero(Distributors::AvailableCommission))
                    .col(bigint_zero(Distributors::FrozenCommission))
                    .col(bigint_zero(Distributors::TotalCommission))
                    .col(bigint_zero(Distributors::WithdrawnCommission))
                    .col(bigint_zero(Distributors::TeamCount))
                    .col(bigint_zero(Distributors::DirectCount))
                    .col(ColumnDef::new(Distributors::ApprovedAt).timestamp())
                    .col(ColumnDef::new(Distributors::ReviewedBy).big_integer())
                    .col(ColumnDef::new(Distributors::ReviewedAt).timestamp())
                    .col(
                        ColumnDef::new(Distributors::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Distributors::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-distributors-parent_id")
                            .from(Distributors::Table, Distributors::ParentId)
                            .to(Distributors::Table, Distributors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-distributors-parent_id")
                    .table(Distributors::Table)
                    .col(Distributors::ParentId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Referral bindings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ReferralBindings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferralBindings::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferralBindings::DistributorId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferralBindings::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-referral_bindings-distributor_id")
                            .from(ReferralBindings::Table, ReferralBindings::DistributorId)
                            .to(Distributors::Table, Distributors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Commissions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Commissions::Table)
                    .if_not_exists()
                    .col(id(Commissions::Id))
                    .col(
                        ColumnDef::new(Commissions::DistributorId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Commissions::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(Commissions::OrderNo).string().not_null())
                    .col(
                        ColumnDef::new(Commissions::FromUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Commissions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Commissions::OrderAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Commissions::RateBps).integer().not_null())
                    .col(ColumnDef::new(Commissions::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Commissions::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Commissions::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Commissions::SettledAt).timestamp())
                    .col(ColumnDef::new(Commissions::CancelledAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-commissions-distributor_id")
                            .from(Commissions::Table, Commissions::DistributorId)
                            .to(Distributors::Table, Distributors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-commissions-order_id")
                    .table(Commissions::Table)
                    .col(Commissions::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-commissions-distributor_id-status")
                    .table(Commissions::Table)
                    .col(Commissions::DistributorId)
                    .col(Commissions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-commissions-status-created_at")
                    .table(Commissions::Table)
                    .col(Commissions::Status)
                    .col(Commissions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Withdrawals
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Withdrawals::Table)
                    .if_not_exists()
                    .col(id(Withdrawals::Id))
                    .col(ColumnDef::new(Withdrawals::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Withdrawals::DistributorId).big_integer())
                    .col(ColumnDef::new(Withdrawals::Kind).string().not_null())
                    .col(ColumnDef::new(Withdrawals::Amount).big_integer().not_null())
                    .col(bigint_zero(Withdrawals::Fee))
                    .col(
                        ColumnDef::new(Withdrawals::ActualAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Withdrawals::WithdrawTo).string().not_null())
                    .col(ColumnDef::new(Withdrawals::AccountInfo).string())
                    .col(
                        ColumnDef::new(Withdrawals::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Withdrawals::RejectReason).string())
                    .col(ColumnDef::new(Withdrawals::ReviewedBy).big_integer())
                    .col(ColumnDef::new(Withdrawals::ReviewedAt).timestamp())
                    .col(ColumnDef::new(Withdrawals::ProcessedBy).big_integer())
                    .col(ColumnDef::new(Withdrawals::ProcessedAt).timestamp())
                    .col(ColumnDef::new(Withdrawals::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Withdrawals::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-withdrawals-distributor_id")
                            .from(Withdrawals::Table, Withdrawals::DistributorId)
                            .to(Distributors::Table, Distributors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-withdrawals-user_id-status")
                    .table(Withdrawals::Table)
                    .col(Withdrawals::UserId)
                    .col(Withdrawals::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Withdrawals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReferralBindings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Distributors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        Ok(())
    }
}
