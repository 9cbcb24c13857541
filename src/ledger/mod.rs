//! Ledger core: the transaction model, its validation, and the pure parts of
//! stock aggregation. Nothing in here performs I/O; the services feed it rows
//! read inside a database transaction and persist what it returns.

pub mod draft;
pub mod rules;
pub mod stock;

pub use crate::config::LedgerPolicy;
pub use draft::{TransactionDraft, TransactionPatch};
pub use rules::{InventoryImpact, ReversalCheck, RuleCheck};
pub use stock::{StockAvailability, StockKey, StockMap, StockShortfall};

/// Truncates to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
