//! The module contains the error the engine can throw.
//!
//! Every operation returns [`ResultEngine`](crate::ResultEngine); variants
//! map one to one to the categories callers must tell apart:
//!
//! - [`InvalidAmount`] and [`InvalidParameter`] are validation failures,
//!   raised before anything is written.
//! - [`InsufficientFunds`] and [`InsufficientFrozen`] are business-rule
//!   violations on available and frozen buckets.
//! - [`InvalidTransition`] means the entity is not in the state the operation
//!   requires (e.g. it was already processed).
//! - [`Reconciliation`] flags stored data that cannot be reversed or does not
//!   match the ledger and needs an operator decision.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidParameter`]: EngineError::InvalidParameter
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`InsufficientFrozen`]: EngineError::InsufficientFrozen
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`Reconciliation`]: EngineError::Reconciliation
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Insufficient frozen balance: {0}")]
    InsufficientFrozen(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Reconciliation required: {0}")]
    Reconciliation(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for failures rejected before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::InvalidParameter(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidParameter(a), Self::InvalidParameter(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InsufficientFrozen(a), Self::InsufficientFrozen(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Reconciliation(a), Self::Reconciliation(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
