//! Command structs for engine operations.
//!
//! These types group parameters for write operations (ledger movements,
//! withdrawal requests, order lifecycle events) and for list queries,
//! keeping call sites readable and avoiding long argument lists.

use crate::{
    CommissionStatus, WalletTransactionKind, WithdrawChannel, WithdrawalKind, WithdrawalStatus,
};

/// Move `amount_minor` through a user's wallet.
#[derive(Clone, Debug)]
pub struct LedgerCmd {
    pub user_id: i64,
    pub amount_minor: i64,
    /// External reference (order number, rental number) stored on the log row.
    pub reference_no: Option<String>,
    pub remark: Option<String>,
}

impl LedgerCmd {
    #[must_use]
    pub fn new(user_id: i64, amount_minor: i64) -> Self {
        Self {
            user_id,
            amount_minor,
            reference_no: None,
            remark: None,
        }
    }

    #[must_use]
    pub fn reference_no(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    #[must_use]
    pub fn remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

/// Request a withdrawal.
#[derive(Clone, Debug)]
pub struct WithdrawalCmd {
    pub user_id: i64,
    pub kind: WithdrawalKind,
    pub amount_minor: i64,
    pub withdraw_to: WithdrawChannel,
    pub account_info: Option<String>,
}

impl WithdrawalCmd {
    #[must_use]
    pub fn new(
        user_id: i64,
        kind: WithdrawalKind,
        amount_minor: i64,
        withdraw_to: WithdrawChannel,
    ) -> Self {
        Self {
            user_id,
            kind,
            amount_minor,
            withdraw_to,
            account_info: None,
        }
    }

    #[must_use]
    pub fn account_info(mut self, account_info: impl Into<String>) -> Self {
        self.account_info = Some(account_info.into());
        self
    }
}

/// The slice of an order the finance core needs.
///
/// Sent by the order subsystem when an order is completed or refunded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: i64,
    pub order_no: String,
    /// The purchasing consumer.
    pub user_id: i64,
    /// Paid amount, commission basis.
    pub amount_minor: i64,
}

impl Order {
    #[must_use]
    pub fn new(order_id: i64, order_no: impl Into<String>, user_id: i64, amount_minor: i64) -> Self {
        Self {
            order_id,
            order_no: order_no.into(),
            user_id,
            amount_minor,
        }
    }
}

/// Pagination shared by list queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WalletTransactionFilter {
    pub kind: Option<WalletTransactionKind>,
    pub page: Page,
}

#[derive(Clone, Debug, Default)]
pub struct CommissionFilter {
    pub status: Option<CommissionStatus>,
    pub page: Page,
}

#[derive(Clone, Debug, Default)]
pub struct WithdrawalFilter {
    pub user_id: Option<i64>,
    pub kind: Option<WithdrawalKind>,
    pub status: Option<WithdrawalStatus>,
    pub page: Page,
}
