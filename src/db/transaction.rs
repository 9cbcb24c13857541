//! Transaction scope helper.
//!
//! Every ledger write runs its read-check-write sequence inside one database
//! transaction: the closure's error rolls the scope back and is returned
//! unchanged to the caller.

use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Execute `f` within a database transaction.
///
/// Commits when `f` returns `Ok`, rolls back otherwise. The closure may only
/// capture owned data; borrow everything it needs from `txn`.
///
/// ```rust,ignore
/// let row = with_transaction(&db, "create_transaction", move |txn| {
///     Box::pin(async move {
///         let row = model.into_active_model().insert(txn).await?;
///         Ok(row)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(
    db: &DatabaseConnection,
    operation: &'static str,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    debug!(%transaction_id, operation, "Starting database transaction");
    counter!("office_inventory_db.transaction.started", 1, "operation" => operation);

    let result = db.transaction::<F, T, ServiceError>(f).await;

    let elapsed = start.elapsed();
    histogram!("office_inventory_db.transaction.duration", elapsed, "operation" => operation);

    match &result {
        Ok(_) => {
            counter!("office_inventory_db.transaction.committed", 1, "operation" => operation);
            debug!(%transaction_id, operation, "Transaction committed in {:?}", elapsed);
        }
        Err(e) => {
            counter!("office_inventory_db.transaction.rolled_back", 1, "operation" => operation);
            warn!(%transaction_id, operation, error = %e, "Transaction rolled back after {:?}", elapsed);
        }
    }

    result.map_err(|e| match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    })
}
