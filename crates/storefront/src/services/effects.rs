//! Best-effort side effects.
//!
//! Profile writes, stock decrements and emails never fail the operation that
//! triggered them. Their failures are logged and collected here so callers
//! can surface them.

use serde::Serialize;

/// A secondary write or notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    ProfileUpsert,
    StockDecrement,
    AdminNotification,
    CustomerConfirmation,
}

impl SideEffect {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileUpsert => "profile_upsert",
            Self::StockDecrement => "stock_decrement",
            Self::AdminNotification => "admin_notification",
            Self::CustomerConfirmation => "customer_confirmation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectFailure {
    pub effect: SideEffect,
    pub message: String,
}

/// Failures collected while running an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SideEffects {
    failures: Vec<SideEffectFailure>,
}

impl SideEffects {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Log and remember a failed side effect.
    pub fn record(&mut self, effect: SideEffect, error: impl std::fmt::Display) {
        let message = error.to_string();
        tracing::warn!(effect = effect.as_str(), error = %message, "Side effect failed");
        self.failures.push(SideEffectFailure { effect, message });
    }

    /// Whether every side effect succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn failures(&self) -> &[SideEffectFailure] {
        &self.failures
    }

    #[must_use]
    pub fn has_failed(&self, effect: SideEffect) -> bool {
        self.failures.iter().any(|f| f.effect == effect)
    }

    /// Append the failures of another report.
    pub fn extend(&mut self, other: Self) {
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let mut effects = SideEffects::new();
        assert!(effects.is_clean());

        effects.record(SideEffect::StockDecrement, "connection reset");
        assert!(!effects.is_clean());
        assert!(effects.has_failed(SideEffect::StockDecrement));
        assert!(!effects.has_failed(SideEffect::AdminNotification));
        assert_eq!(effects.failures().len(), 1);
    }

    #[test]
    fn test_serializes_effect_names() {
        let mut effects = SideEffects::new();
        effects.record(SideEffect::ProfileUpsert, "timeout");
        let json = serde_json::to_value(&effects).unwrap_or_default();
        assert_eq!(json["failures"][0]["effect"], "profile_upsert");
    }
}
