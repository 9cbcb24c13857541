// Write path
pub mod transactions;

// Read path
pub mod inventory_query;

// Bulk uploads
pub mod batch_import;

pub use batch_import::{BatchImportService, ImportMode, ImportReport};
pub use inventory_query::InventoryQueryService;
pub use transactions::{BatchReport, BatchTransactionRequest, RowFailure, TransactionService};
