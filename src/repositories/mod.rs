//! Data access for the ledger and its reference tables.
//!
//! Every function is generic over `ConnectionTrait` so the same lookup runs
//! against the pool for reads and against an open `DatabaseTransaction`
//! inside a write scope.

pub mod item_repository;
pub mod location_repository;
pub mod transaction_repository;

pub use item_repository::ItemRepository;
pub use location_repository::LocationRepository;
pub use transaction_repository::{PositionTotal, TransactionRepository};
