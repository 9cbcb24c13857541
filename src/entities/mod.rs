pub mod inventory_transaction;
pub mod item;
pub mod location;

pub use inventory_transaction::{
    Entity as InventoryTransaction, Model as InventoryTransactionModel, TransactionType,
};
pub use item::{Entity as Item, Model as ItemModel};
pub use location::{Entity as Location, Model as LocationModel};
