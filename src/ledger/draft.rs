use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{InventoryTransactionModel, TransactionType};
use crate::errors::{FieldViolation, ServiceError};

/// Input for a new ledger row, as accepted on the wire.
///
/// `supplier` is required for inbound rows and `recipient`/`purpose` for
/// outbound rows; those are business rules checked after construction, not
/// schema constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub item_id: Uuid,
    pub location_id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Wider than the stored column so oversized values reach the quantity
    /// limit check instead of failing to parse.
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub quantity: i64,
    /// Defaults to the time of creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub notes: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TransactionDraft {
    /// Parses a JSON body, reporting malformed or missing fields as validation errors.
    pub fn from_json(value: Value) -> Result<Self, ServiceError> {
        serde_json::from_value(value).map_err(ServiceError::from)
    }

    pub fn inbound(item_id: Uuid, location_id: Uuid, quantity: i32, operator: &str, supplier: &str) -> Self {
        Self {
            item_id,
            location_id,
            transaction_type: TransactionType::Inbound,
            quantity: i64::from(quantity),
            date: None,
            operator: operator.to_string(),
            supplier: Some(supplier.to_string()),
            recipient: None,
            purpose: None,
            notes: None,
        }
    }

    pub fn outbound(
        item_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        operator: &str,
        recipient: &str,
        purpose: &str,
    ) -> Self {
        Self {
            item_id,
            location_id,
            transaction_type: TransactionType::Outbound,
            quantity: i64::from(quantity),
            date: None,
            operator: operator.to_string(),
            supplier: None,
            recipient: Some(recipient.to_string()),
            purpose: Some(purpose.to_string()),
            notes: None,
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Trims text fields and turns blank optionals into `None`.
    pub fn normalized(mut self) -> Self {
        self.operator = self.operator.trim().to_string();
        self.supplier = clean(self.supplier);
        self.recipient = clean(self.recipient);
        self.purpose = clean(self.purpose);
        self.notes = clean(self.notes);
        self
    }
}

/// Builds a ledger row from a draft: validates every field, then assigns the
/// id and timestamps. Does not touch the store.
pub fn create(draft: TransactionDraft, now: DateTime<Utc>) -> Result<InventoryTransactionModel, ServiceError> {
    let draft = draft.normalized();
    draft.validate()?;
    let quantity = i32::try_from(draft.quantity).map_err(|_| {
        ServiceError::BusinessRule(vec![format!(
            "quantity {} exceeds the per-transaction limit",
            draft.quantity
        )])
    })?;

    Ok(InventoryTransactionModel {
        id: Uuid::new_v4(),
        item_id: draft.item_id,
        location_id: draft.location_id,
        transaction_type: draft.transaction_type,
        quantity,
        date: draft.date.unwrap_or(now),
        operator: draft.operator,
        supplier: draft.supplier,
        recipient: draft.recipient,
        purpose: draft.purpose,
        notes: draft.notes.unwrap_or_default(),
        batch_id: None,
        created_at: now,
    })
}

/// Builds every row of a batch under one shared `batch_id`. Each entry is
/// built exactly like [`create`]; failures are returned in place so callers
/// can report them by row.
pub fn create_batch(
    drafts: Vec<TransactionDraft>,
    batch_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<Result<InventoryTransactionModel, ServiceError>> {
    drafts
        .into_iter()
        .map(|draft| {
            create(draft, now).map(|mut row| {
                row.batch_id = Some(batch_id);
                row
            })
        })
        .collect()
}

/// Changes allowed on an existing row. Anything that moves stock
/// (quantity, type, item, location, date) is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub notes: Option<String>,
    /// Any other keys sent along with the patch
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

impl TransactionPatch {
    pub fn from_json(value: Value) -> Result<Self, ServiceError> {
        serde_json::from_value(value).map_err(ServiceError::from)
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.operator.is_none()
            && self.supplier.is_none()
            && self.recipient.is_none()
            && self.purpose.is_none()
            && self.notes.is_none()
            && self.other.values().all(is_blank)
    }

    /// Keys outside the allowed set that carry a value.
    fn restricted_violations(&self) -> Vec<FieldViolation> {
        let mut violations: Vec<FieldViolation> = self
            .other
            .iter()
            .filter(|(_, value)| !is_blank(value))
            .map(|(key, _)| FieldViolation::new(key.clone(), "cannot be modified after creation"))
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        violations
    }
}

/// Validates `patch` and returns `row` with the patch applied.
///
/// Blank optional fields clear the stored value; a blank operator is
/// rejected. Business rules are re-checked by the caller on the result.
pub fn apply_patch(
    row: &InventoryTransactionModel,
    patch: TransactionPatch,
) -> Result<InventoryTransactionModel, ServiceError> {
    let mut violations = patch.restricted_violations();

    let patch = TransactionPatch {
        operator: patch.operator.map(|v| v.trim().to_string()),
        supplier: patch.supplier.map(|v| v.trim().to_string()),
        recipient: patch.recipient.map(|v| v.trim().to_string()),
        purpose: patch.purpose.map(|v| v.trim().to_string()),
        notes: patch.notes.map(|v| v.trim().to_string()),
        other: patch.other,
    };

    if let Err(errors) = patch.validate() {
        if let ServiceError::ValidationError(field_errors) = ServiceError::from(errors) {
            violations.extend(field_errors);
        }
    }
    if !violations.is_empty() {
        return Err(ServiceError::ValidationError(violations));
    }

    let mut updated = row.clone();
    if let Some(operator) = patch.operator {
        updated.operator = operator;
    }
    if let Some(supplier) = patch.supplier {
        updated.supplier = Some(supplier).filter(|v| !v.is_empty());
    }
    if let Some(recipient) = patch.recipient {
        updated.recipient = Some(recipient).filter(|v| !v.is_empty());
    }
    if let Some(purpose) = patch.purpose {
        updated.purpose = Some(purpose).filter(|v| !v.is_empty());
    }
    if let Some(notes) = patch.notes {
        updated.notes = notes;
    }
    Ok(updated)
}
