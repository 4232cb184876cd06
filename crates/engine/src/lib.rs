//! Finance core: wallet ledger, distributor registry, referral commissions
//! and withdrawal workflow.
//!
//! All state lives in the database. Every public operation runs in its own
//! atomic unit of work and locks the rows it mutates; the `*_in` variants run
//! inside a transaction opened by the caller with [`Engine::begin`], so several
//! operations can commit or roll back together.

pub use commands::{
    CommissionFilter, LedgerCmd, Order, Page, WalletTransactionFilter, WithdrawalCmd,
    WithdrawalFilter,
};
pub use commissions::{Commission, CommissionKind, CommissionStatus};
pub use distributors::{Distributor, DistributorStatus};
pub use error::EngineError;
pub use money::{MoneyCents, Rate};
pub use ops::{BatchOutcome, Engine, EngineBuilder};
pub use settings::FinanceSettings;
pub use wallet_transactions::{WalletTransaction, WalletTransactionKind};
pub use wallets::Wallet;
pub use withdrawals::{WithdrawChannel, Withdrawal, WithdrawalKind, WithdrawalStatus};

mod commands;
mod commissions;
mod distributors;
mod error;
mod money;
mod ops;
mod order_completions;
mod referral_bindings;
mod settings;
mod util;
mod wallet_transactions;
mod wallets;
mod withdrawals;

pub type ResultEngine<T> = Result<T, EngineError>;
