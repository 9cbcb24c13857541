use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{draft::TransactionDraft, truncate_chars, LedgerPolicy, StockKey};
use crate::entities::{InventoryTransactionModel, TransactionType};

/// Result of the cross-field rule check; every rule is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Checks the business rules for a built row. Pure; errors accumulate.
pub fn validate_business_rules(
    transaction: &InventoryTransactionModel,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
) -> RuleCheck {
    let mut errors = Vec::new();

    match transaction.transaction_type {
        TransactionType::Inbound => {
            if is_blank(&transaction.supplier) {
                errors.push("inbound transactions require a supplier".to_string());
            }
        }
        TransactionType::Outbound => {
            if is_blank(&transaction.recipient) {
                errors.push("outbound transactions require a recipient".to_string());
            }
            if is_blank(&transaction.purpose) {
                errors.push("outbound transactions require a purpose".to_string());
            }
        }
    }

    if transaction.date > now {
        errors.push("transaction date cannot be in the future".to_string());
    }

    if transaction.quantity > policy.max_quantity {
        errors.push(format!(
            "quantity {} exceeds the per-transaction limit of {}",
            transaction.quantity, policy.max_quantity
        ));
    }

    RuleCheck {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Signed stock effect of one row on its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryImpact {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub quantity_change: i64,
}

impl InventoryImpact {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.item_id, self.location_id)
    }
}

pub fn calculate_inventory_impact(transaction: &InventoryTransactionModel) -> InventoryImpact {
    InventoryImpact {
        item_id: transaction.item_id,
        location_id: transaction.location_id,
        quantity_change: transaction.signed_quantity(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalCheck {
    pub can_reverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reversal window check, independent of the deletion window.
pub fn can_be_reversed(
    transaction: &InventoryTransactionModel,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
) -> ReversalCheck {
    if now - transaction.date > policy.reversal_window() {
        return ReversalCheck {
            can_reverse: false,
            reason: Some(format!(
                "transaction is older than {} days and can no longer be reversed",
                policy.reversal_window_days
            )),
        };
    }
    ReversalCheck {
        can_reverse: true,
        reason: None,
    }
}

/// Deletion window check. Returns the reason when the row is too old.
pub fn deletion_block_reason(
    transaction: &InventoryTransactionModel,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
) -> Option<String> {
    (now - transaction.date > policy.deletion_window()).then(|| {
        format!(
            "transaction {} is older than {} days and can no longer be deleted",
            transaction.id, policy.deletion_window_days
        )
    })
}

/// Draft of the opposite movement that cancels `transaction`'s stock effect.
///
/// The counterpart recorded on the original (supplier or recipient) becomes
/// the counterpart of the reversal, falling back to the operator.
pub fn generate_reverse_transaction(
    transaction: &InventoryTransactionModel,
    operator: &str,
) -> TransactionDraft {
    let reversal_note = format!("Reversal of transaction {}", transaction.id);
    let purpose = match transaction.purpose.as_deref() {
        Some(original) if !original.trim().is_empty() => {
            truncate_chars(&format!("{}: {}", reversal_note, original), 200)
        }
        _ => reversal_note.clone(),
    };
    let counterpart = match transaction.transaction_type {
        TransactionType::Inbound => transaction.supplier.clone(),
        TransactionType::Outbound => transaction.recipient.clone(),
    }
    .filter(|v| !v.trim().is_empty())
    .unwrap_or_else(|| operator.to_string());

    let reversed_type = transaction.transaction_type.opposite();
    let (supplier, recipient) = match reversed_type {
        TransactionType::Inbound => (Some(truncate_chars(&counterpart, 100)), None),
        TransactionType::Outbound => (None, Some(truncate_chars(&counterpart, 50))),
    };

    TransactionDraft {
        item_id: transaction.item_id,
        location_id: transaction.location_id,
        transaction_type: reversed_type,
        quantity: i64::from(transaction.quantity),
        date: None,
        operator: operator.to_string(),
        supplier,
        recipient,
        purpose: Some(purpose),
        notes: Some(reversal_note),
    }
}
