//! Internal helpers for input validation.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every operation rejects bad input the same way, before any
//! row is touched.

use crate::{EngineError, ResultEngine};

pub(crate) fn ensure_positive_amount(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidParameter(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}
