//! Transaction Service
//!
//! Write path for the ledger. Every mutation acquires the stock locks for the
//! positions it touches, then runs its read-check-write sequence inside one
//! database transaction so a failure at any step persists nothing.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{AppConfig, LedgerPolicy};
use crate::db::locks::advisory_lock_keys;
use crate::db::{with_transaction, StockLocks};
use crate::entities::inventory_transaction::Column;
use crate::entities::{InventoryTransactionModel, TransactionType};
use crate::errors::ServiceError;
use crate::ledger::draft::{self, TransactionDraft, TransactionPatch};
use crate::ledger::rules::{
    can_be_reversed, deletion_block_reason, generate_reverse_transaction, validate_business_rules,
};
use crate::ledger::stock::{
    display_stock, validate_stock_availability, StockAvailability, StockKey, StockMap,
};
use crate::repositories::transaction_repository::contains_ci;
use crate::repositories::{ItemRepository, LocationRepository, TransactionRepository};

const TOP_N: usize = 10;

/// Request body for a batch of drafts sharing one batch id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransactionRequest {
    pub transactions: Vec<TransactionDraft>,
    /// Reused when supplied, generated otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

/// Why one row of a batch was rejected. `row` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub reason: String,
}

/// Outcome of a batch. When `failed` is non-empty nothing was persisted and
/// `success` lists the rows that would otherwise have been accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub success: Vec<InventoryTransactionModel>,
    pub failed: Vec<RowFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// "N of M failed"
    pub fn summary(&self) -> String {
        format!("{} of {} failed", self.failed.len(), self.total())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionSortField {
    #[default]
    Date,
    Quantity,
    Operator,
    CreatedAt,
}

impl TransactionSortField {
    fn column(self) -> Column {
        match self {
            Self::Date => Column::Date,
            Self::Quantity => Column::Quantity,
            Self::Operator => Column::Operator,
            Self::CreatedAt => Column::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters, sorting and paging for the transaction history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionHistoryQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Case-insensitive substring
    pub operator: Option<String>,
    pub supplier: Option<String>,
    pub recipient: Option<String>,
    pub batch_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sort_by: TransactionSortField,
    pub sort_order: SortOrder,
    /// 1-based
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Optional scope for [`TransactionService::get_transaction_statistics`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatisticsQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMovement {
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub inbound: i64,
    pub outbound: i64,
    pub transaction_count: i64,
}

impl ItemMovement {
    pub fn total_moved(&self) -> i64 {
        self.inbound + self.outbound
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMovement {
    pub location_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub inbound: i64,
    pub outbound: i64,
    pub transaction_count: i64,
}

impl LocationMovement {
    pub fn total_moved(&self) -> i64 {
        self.inbound + self.outbound
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatistics {
    pub total_inbound: i64,
    pub total_outbound: i64,
    pub net_change: i64,
    pub transaction_count: i64,
    pub inbound_count: i64,
    pub outbound_count: i64,
    pub top_items: Vec<ItemMovement>,
    pub top_locations: Vec<LocationMovement>,
}

#[derive(Default)]
struct Movement {
    inbound: i64,
    outbound: i64,
    rows: i64,
}

impl Movement {
    fn add(&mut self, transaction_type: TransactionType, quantity: i64, rows: i64) {
        match transaction_type {
            TransactionType::Inbound => self.inbound += quantity,
            TransactionType::Outbound => self.outbound += quantity,
        }
        self.rows += rows;
    }
}

/// Turns a failed availability check into an `InsufficientStock` error with
/// item and location names filled in.
async fn shortfall_error<C: ConnectionTrait>(
    conn: &C,
    availability: StockAvailability,
) -> Result<ServiceError, ServiceError> {
    let items = ItemRepository::find_by_ids(
        conn,
        availability.shortfalls.iter().map(|s| s.item_id),
    )
    .await?;
    let locations = LocationRepository::find_by_ids(
        conn,
        availability.shortfalls.iter().map(|s| s.location_id),
    )
    .await?;

    let item_names: HashMap<Uuid, String> =
        items.into_iter().map(|(id, item)| (id, item.name)).collect();
    let location_names: HashMap<Uuid, String> = locations
        .into_iter()
        .map(|(id, location)| (id, location.name))
        .collect();

    Ok(ServiceError::InsufficientStock(
        availability
            .with_names(&item_names, &location_names)
            .shortfalls,
    ))
}

/// Checks that removing rows with the given net stock effect per position
/// leaves every position non-negative.
fn removal_availability(net_effect: &BTreeMap<StockKey, i64>, current: &StockMap) -> StockAvailability {
    validate_stock_availability(
        net_effect
            .iter()
            .filter(|(_, effect)| **effect > 0)
            .map(|(key, effect)| (*key, *effect)),
        current,
    )
}

/// Service for recording and querying ledger transactions.
#[derive(Clone)]
pub struct TransactionService {
    db_pool: Arc<DatabaseConnection>,
    locks: StockLocks,
    policy: LedgerPolicy,
    default_page_size: u64,
    max_page_size: u64,
}

impl TransactionService {
    pub fn new(db_pool: Arc<DatabaseConnection>, policy: LedgerPolicy) -> Self {
        Self {
            db_pool,
            locks: StockLocks::new(),
            policy,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    pub fn from_config(db_pool: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        Self::new(db_pool, config.ledger.clone())
            .with_page_sizes(config.api_default_page_size, config.api_max_page_size)
    }

    /// Shares a lock table with other services writing to the same ledger.
    pub fn with_locks(mut self, locks: StockLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_page_sizes(mut self, default_size: u32, max_size: u32) -> Self {
        self.max_page_size = u64::from(max_size.max(1));
        self.default_page_size = u64::from(default_size.max(1)).min(self.max_page_size);
        self
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn locks(&self) -> &StockLocks {
        &self.locks
    }

    /// Records one movement.
    ///
    /// Fields are validated first, then inside one transaction scope the item
    /// and location are resolved, outbound stock is checked, business rules
    /// are applied, and the row is inserted.
    #[instrument(skip(self, draft), fields(item_id = %draft.item_id, location_id = %draft.location_id))]
    pub async fn create_transaction(
        &self,
        draft: TransactionDraft,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        let now = Utc::now();
        let row = draft::create(draft, now)?;
        let key = StockKey::new(row.item_id, row.location_id);
        let policy = self.policy.clone();

        let _guard = self.locks.acquire([key]).await;
        let created = with_transaction(&self.db_pool, "create_transaction", move |txn| {
            Box::pin(async move {
                advisory_lock_keys(txn, [key]).await?;
                ItemRepository::get(txn, row.item_id).await?;
                LocationRepository::get(txn, row.location_id).await?;

                if row.transaction_type == TransactionType::Outbound {
                    let available = TransactionRepository::balance(txn, key).await?;
                    let check = validate_stock_availability(
                        [(key, i64::from(row.quantity))],
                        &StockMap::from([(key, available)]),
                    );
                    if !check.is_valid() {
                        return Err(shortfall_error(txn, check).await?);
                    }
                }

                let rules = validate_business_rules(&row, &policy, now);
                if !rules.is_valid {
                    return Err(ServiceError::BusinessRule(rules.errors));
                }

                TransactionRepository::insert(txn, row).await
            })
        })
        .await?;

        info!(
            transaction_id = %created.id,
            transaction_type = %created.transaction_type,
            quantity = created.quantity,
            "Transaction recorded"
        );
        Ok(created)
    }

    /// Records a batch all-or-nothing under one batch id.
    ///
    /// Aggregate outbound demand is checked per position before any row is
    /// examined; then every row is resolved and rule-checked. If any row
    /// fails, the scope rolls back and `BatchRejected` carries the full report.
    #[instrument(skip(self, request), fields(rows = request.transactions.len()))]
    pub async fn create_batch_transactions(
        &self,
        request: BatchTransactionRequest,
    ) -> Result<BatchReport, ServiceError> {
        if request.transactions.is_empty() {
            return Err(ServiceError::validation(
                "transactions",
                "must contain at least one row",
            ));
        }

        let now = Utc::now();
        let batch_id = request.batch_id.unwrap_or_else(Uuid::new_v4);
        let built = draft::create_batch(request.transactions, batch_id, now);
        let keys: Vec<StockKey> = built
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|row| StockKey::new(row.item_id, row.location_id))
            .collect();
        let policy = self.policy.clone();

        let _guard = self.locks.acquire(keys.iter().copied()).await;
        let report = with_transaction(&self.db_pool, "create_batch_transactions", move |txn| {
            Box::pin(async move {
                advisory_lock_keys(txn, keys.iter().copied()).await?;

                let outbound: Vec<(StockKey, i64)> = built
                    .iter()
                    .filter_map(|r| r.as_ref().ok())
                    .filter(|row| row.transaction_type == TransactionType::Outbound)
                    .map(|row| {
                        (
                            StockKey::new(row.item_id, row.location_id),
                            i64::from(row.quantity),
                        )
                    })
                    .collect();
                if !outbound.is_empty() {
                    let current = TransactionRepository::stock_map(txn, &keys).await?;
                    let check = validate_stock_availability(outbound, &current);
                    if !check.is_valid() {
                        return Err(shortfall_error(txn, check).await?);
                    }
                }

                let items = ItemRepository::find_by_ids(txn, keys.iter().map(|k| k.item_id)).await?;
                let locations =
                    LocationRepository::find_by_ids(txn, keys.iter().map(|k| k.location_id))
                        .await?;

                let mut success = Vec::with_capacity(built.len());
                let mut failed = Vec::new();
                for (index, result) in built.into_iter().enumerate() {
                    let row_number = index + 1;
                    let row = match result {
                        Ok(row) => row,
                        Err(err) => {
                            failed.push(RowFailure {
                                row: row_number,
                                item_id: None,
                                location_id: None,
                                reason: err.to_string(),
                            });
                            continue;
                        }
                    };

                    let reason = if !items.contains_key(&row.item_id) {
                        Some(format!("Item {} not found", row.item_id))
                    } else if !locations.contains_key(&row.location_id) {
                        Some(format!("Location {} not found", row.location_id))
                    } else {
                        let rules = validate_business_rules(&row, &policy, now);
                        (!rules.is_valid).then(|| rules.errors.join("; "))
                    };

                    match reason {
                        Some(reason) => failed.push(RowFailure {
                            row: row_number,
                            item_id: Some(row.item_id),
                            location_id: Some(row.location_id),
                            reason,
                        }),
                        None => success.push(row),
                    }
                }

                if !failed.is_empty() {
                    return Err(ServiceError::BatchRejected(BatchReport {
                        batch_id,
                        success,
                        failed,
                    }));
                }

                let mut persisted = Vec::with_capacity(success.len());
                for row in success {
                    persisted.push(TransactionRepository::insert(txn, row).await?);
                }

                Ok(BatchReport {
                    batch_id,
                    success: persisted,
                    failed: Vec::new(),
                })
            })
        })
        .await
        .map_err(|err| {
            if let ServiceError::BatchRejected(report) = &err {
                warn!(batch_id = %report.batch_id, "Batch rejected: {}", report.summary());
            }
            err
        })?;

        info!(batch_id = %report.batch_id, rows = report.success.len(), "Batch recorded");
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: Uuid) -> Result<InventoryTransactionModel, ServiceError> {
        TransactionRepository::get(&*self.db_pool, id).await
    }

    /// Applies a descriptive-field patch. An empty patch returns the row unchanged.
    #[instrument(skip(self, patch))]
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        if patch.is_empty() {
            return self.get_transaction(id).await;
        }

        let now = Utc::now();
        let policy = self.policy.clone();
        let updated = with_transaction(&self.db_pool, "update_transaction", move |txn| {
            Box::pin(async move {
                let existing = TransactionRepository::get(txn, id).await?;
                let patched = draft::apply_patch(&existing, patch)?;

                let rules = validate_business_rules(&patched, &policy, now);
                if !rules.is_valid {
                    return Err(ServiceError::BusinessRule(rules.errors));
                }

                TransactionRepository::update_descriptive(txn, patched).await
            })
        })
        .await?;

        info!(transaction_id = %updated.id, "Transaction updated");
        Ok(updated)
    }

    /// Deletes one row if it is inside the deletion window, is not part of a
    /// multi-row batch, and its removal leaves the position non-negative.
    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get_transaction(id).await?;
        let key = StockKey::new(existing.item_id, existing.location_id);
        let now = Utc::now();
        let policy = self.policy.clone();

        let _guard = self.locks.acquire([key]).await;
        with_transaction(&self.db_pool, "delete_transaction", move |txn| {
            Box::pin(async move {
                advisory_lock_keys(txn, [key]).await?;
                let row = TransactionRepository::get(txn, id).await?;

                if let Some(reason) = deletion_block_reason(&row, &policy, now) {
                    return Err(ServiceError::PolicyViolation(reason));
                }

                if let Some(batch_id) = row.batch_id {
                    let siblings = TransactionRepository::count_batch_rows(txn, batch_id).await?;
                    if siblings > 1 {
                        return Err(ServiceError::PolicyViolation(format!(
                            "transaction {} belongs to batch {} with {} rows; delete the batch as a unit",
                            row.id, batch_id, siblings
                        )));
                    }
                }

                let net_effect = BTreeMap::from([(key, row.signed_quantity())]);
                let current = TransactionRepository::stock_map(txn, &[key]).await?;
                let check = removal_availability(&net_effect, &current);
                if !check.is_valid() {
                    return Err(shortfall_error(txn, check).await?);
                }

                TransactionRepository::delete(txn, row.id).await?;
                Ok(())
            })
        })
        .await?;

        info!(transaction_id = %id, "Transaction deleted");
        Ok(())
    }

    /// Deletes every row of a batch atomically. Returns the number of rows removed.
    #[instrument(skip(self))]
    pub async fn delete_batch(&self, batch_id: Uuid) -> Result<u64, ServiceError> {
        let rows = TransactionRepository::find_by_batch(&*self.db_pool, batch_id).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!("Batch {} not found", batch_id)));
        }
        let keys: Vec<StockKey> = rows
            .iter()
            .map(|row| StockKey::new(row.item_id, row.location_id))
            .collect();
        let now = Utc::now();
        let policy = self.policy.clone();

        let _guard = self.locks.acquire(keys.iter().copied()).await;
        let deleted = with_transaction(&self.db_pool, "delete_batch", move |txn| {
            Box::pin(async move {
                advisory_lock_keys(txn, keys.iter().copied()).await?;
                let rows = TransactionRepository::find_by_batch(txn, batch_id).await?;
                if rows.is_empty() {
                    return Err(ServiceError::NotFound(format!("Batch {} not found", batch_id)));
                }

                let blocked: Vec<String> = rows
                    .iter()
                    .filter_map(|row| deletion_block_reason(row, &policy, now))
                    .collect();
                if !blocked.is_empty() {
                    return Err(ServiceError::PolicyViolation(blocked.join("; ")));
                }

                let mut net_effect: BTreeMap<StockKey, i64> = BTreeMap::new();
                for row in &rows {
                    *net_effect
                        .entry(StockKey::new(row.item_id, row.location_id))
                        .or_insert(0) += row.signed_quantity();
                }
                let affected: Vec<StockKey> = net_effect.keys().copied().collect();
                let current = TransactionRepository::stock_map(txn, &affected).await?;
                let check = removal_availability(&net_effect, &current);
                if !check.is_valid() {
                    return Err(shortfall_error(txn, check).await?);
                }

                TransactionRepository::delete_batch(txn, batch_id).await
            })
        })
        .await?;

        info!(batch_id = %batch_id, rows = deleted, "Batch deleted");
        Ok(deleted)
    }

    /// Records the opposite movement of `id` on behalf of `operator`.
    #[instrument(skip(self))]
    pub async fn reverse_transaction(
        &self,
        id: Uuid,
        operator: &str,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        let original = self.get_transaction(id).await?;

        let check = can_be_reversed(&original, &self.policy, Utc::now());
        if !check.can_reverse {
            return Err(ServiceError::PolicyViolation(
                check
                    .reason
                    .unwrap_or_else(|| format!("transaction {} cannot be reversed", id)),
            ));
        }

        let reversal = self
            .create_transaction(generate_reverse_transaction(&original, operator))
            .await?;
        info!(transaction_id = %id, reversal_id = %reversal.id, "Transaction reversed");
        Ok(reversal)
    }

    /// Current stock of one position, floored at zero.
    pub async fn current_stock(&self, item_id: Uuid, location_id: Uuid) -> Result<i64, ServiceError> {
        let balance =
            TransactionRepository::balance(&*self.db_pool, StockKey::new(item_id, location_id))
                .await?;
        Ok(display_stock(balance))
    }

    /// Current stock for each requested position, floored at zero.
    pub async fn stock_map(&self, keys: &[StockKey]) -> Result<StockMap, ServiceError> {
        let map = TransactionRepository::stock_map(&*self.db_pool, keys).await?;
        Ok(map
            .into_iter()
            .map(|(key, balance)| (key, display_stock(balance)))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_transaction_history(
        &self,
        query: TransactionHistoryQuery,
    ) -> Result<Page<InventoryTransactionModel>, ServiceError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(ServiceError::validation("page", "must be at least 1"));
        }
        let limit = match query.limit {
            Some(0) => return Err(ServiceError::validation("limit", "must be at least 1")),
            Some(limit) => limit.min(self.max_page_size),
            None => self.default_page_size,
        };
        let offset_in_range = (page - 1)
            .checked_mul(limit)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !offset_in_range {
            return Err(ServiceError::validation("page", "is out of range"));
        }
        check_date_range(query.start_date, query.end_date)?;

        let mut condition = Condition::all();
        if let Some(item_id) = query.item_id {
            condition = condition.add(Column::ItemId.eq(item_id));
        }
        if let Some(location_id) = query.location_id {
            condition = condition.add(Column::LocationId.eq(location_id));
        }
        if let Some(transaction_type) = query.transaction_type {
            condition = condition.add(Column::TransactionType.eq(transaction_type));
        }
        if let Some(batch_id) = query.batch_id {
            condition = condition.add(Column::BatchId.eq(batch_id));
        }
        for (column, needle) in [
            (Column::Operator, &query.operator),
            (Column::Supplier, &query.supplier),
            (Column::Recipient, &query.recipient),
        ] {
            if let Some(needle) = needle.as_deref().filter(|n| !n.trim().is_empty()) {
                condition = condition.add(contains_ci(column, needle));
            }
        }
        condition = with_date_range(condition, query.start_date, query.end_date);

        let (data, total) = TransactionRepository::search(
            &*self.db_pool,
            condition,
            query.sort_by.column(),
            query.sort_order == SortOrder::Desc,
            page,
            limit,
        )
        .await?;

        Ok(Page {
            data,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        })
    }

    #[instrument(skip(self))]
    pub async fn get_transaction_statistics(
        &self,
        query: StatisticsQuery,
    ) -> Result<TransactionStatistics, ServiceError> {
        check_date_range(query.start_date, query.end_date)?;

        let mut condition = Condition::all();
        if let Some(item_id) = query.item_id {
            condition = condition.add(Column::ItemId.eq(item_id));
        }
        if let Some(location_id) = query.location_id {
            condition = condition.add(Column::LocationId.eq(location_id));
        }
        condition = with_date_range(condition, query.start_date, query.end_date);

        let totals = TransactionRepository::position_totals(&*self.db_pool, condition).await?;

        let mut by_item: HashMap<Uuid, Movement> = HashMap::new();
        let mut by_location: HashMap<Uuid, Movement> = HashMap::new();
        let mut overall = Movement::default();
        let mut inbound_count = 0;
        let mut outbound_count = 0;
        for total in &totals {
            by_item
                .entry(total.key.item_id)
                .or_default()
                .add(total.transaction_type, total.quantity, total.rows);
            by_location
                .entry(total.key.location_id)
                .or_default()
                .add(total.transaction_type, total.quantity, total.rows);
            overall.add(total.transaction_type, total.quantity, total.rows);
            match total.transaction_type {
                TransactionType::Inbound => inbound_count += total.rows,
                TransactionType::Outbound => outbound_count += total.rows,
            }
        }

        let items = ItemRepository::find_by_ids(&*self.db_pool, by_item.keys().copied()).await?;
        let locations =
            LocationRepository::find_by_ids(&*self.db_pool, by_location.keys().copied()).await?;

        let mut top_items: Vec<ItemMovement> = by_item
            .into_iter()
            .map(|(item_id, m)| ItemMovement {
                item_id,
                item_name: items.get(&item_id).map(|i| i.name.clone()),
                inbound: m.inbound,
                outbound: m.outbound,
                transaction_count: m.rows,
            })
            .collect();
        top_items.sort_by(|a, b| {
            b.total_moved()
                .cmp(&a.total_moved())
                .then_with(|| a.item_name.cmp(&b.item_name))
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        top_items.truncate(TOP_N);

        let mut top_locations: Vec<LocationMovement> = by_location
            .into_iter()
            .map(|(location_id, m)| {
                let location = locations.get(&location_id);
                LocationMovement {
                    location_id,
                    location_code: location.map(|l| l.code.clone()),
                    location_name: location.map(|l| l.name.clone()),
                    inbound: m.inbound,
                    outbound: m.outbound,
                    transaction_count: m.rows,
                }
            })
            .collect();
        top_locations.sort_by(|a, b| {
            b.total_moved()
                .cmp(&a.total_moved())
                .then_with(|| a.location_code.cmp(&b.location_code))
                .then_with(|| a.location_id.cmp(&b.location_id))
        });
        top_locations.truncate(TOP_N);

        Ok(TransactionStatistics {
            total_inbound: overall.inbound,
            total_outbound: overall.outbound,
            net_change: overall.inbound - overall.outbound,
            transaction_count: overall.rows,
            inbound_count,
            outbound_count,
            top_items,
            top_locations,
        })
    }
}

fn check_date_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ServiceError::validation(
            "startDate",
            "must not be after endDate",
        )),
        _ => Ok(()),
    }
}

fn with_date_range(
    mut condition: Condition,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Condition {
    if let Some(start) = start {
        condition = condition.add(Column::Date.gte(start));
    }
    if let Some(end) = end {
        condition = condition.add(Column::Date.lte(end));
    }
    condition
}
