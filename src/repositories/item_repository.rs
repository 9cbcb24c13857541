use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::item::{self, Entity as Item, Model as ItemModel};
use crate::errors::ServiceError;

/// Read-only lookups against the item catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemRepository;

impl ItemRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<ItemModel>, ServiceError> {
        Item::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Resolves a reference, failing with `NotFound` when it does not exist.
    pub async fn get<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<ItemModel, ServiceError> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        conn: &C,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, ItemModel>, ServiceError> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = Item::find()
            .filter(item::Column::Id.is_in(ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }
}
