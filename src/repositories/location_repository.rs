use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::location::{self, Entity as Location, Model as LocationModel};
use crate::errors::ServiceError;

/// Read-only lookups against storage locations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationRepository;

impl LocationRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<LocationModel>, ServiceError> {
        Location::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<LocationModel, ServiceError> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", id)))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        conn: &C,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, LocationModel>, ServiceError> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let locations = Location::find()
            .filter(location::Column::Id.is_in(ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(locations.into_iter().map(|l| (l.id, l)).collect())
    }
}
