//! Suppression of duplicate open service requests.
//!
//! The query in [`DuplicateRequestGuard::has_open_service_request`] is the optimistic check.
//! The unique `requests.open_service_key` column is what guarantees at most one open
//! request per room and service item when two guests race.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    context::GuestContext,
    entities::request::{self, RequestKind, RequestStatus},
    errors::ServiceError,
};

/// Value stored in `requests.open_service_key` while a SERVICE request is open.
pub fn open_service_key(hotel_id: Uuid, room_id: Uuid, service_item_id: Uuid) -> String {
    format!("{hotel_id}:{room_id}:{service_item_id}")
}

const OPEN_STATUSES: [RequestStatus; 2] = [RequestStatus::New, RequestStatus::Accepted];

#[derive(Clone)]
pub struct DuplicateRequestGuard {
    db: Arc<DatabaseConnection>,
}

impl DuplicateRequestGuard {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn open_service_requests(ctx: &GuestContext) -> sea_orm::Select<request::Entity> {
        request::Entity::find()
            .filter(request::Column::HotelId.eq(ctx.hotel_id()))
            .filter(request::Column::RoomId.eq(ctx.room_id()))
            .filter(request::Column::Kind.eq(RequestKind::Service))
            .filter(request::Column::Status.is_in(OPEN_STATUSES))
    }

    pub async fn has_open_service_request(
        &self,
        ctx: &GuestContext,
        service_item_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let open = Self::open_service_requests(ctx)
            .filter(request::Column::ServiceItemId.eq(service_item_id))
            .count(&*self.db)
            .await?;
        Ok(open > 0)
    }

    /// Service items the room already has an open request for, for pre-disabling buttons
    pub async fn open_service_item_ids(&self, ctx: &GuestContext) -> Result<Vec<Uuid>, ServiceError> {
        let mut ids: Vec<Uuid> = Self::open_service_requests(ctx)
            .filter(request::Column::ServiceItemId.is_not_null())
            .select_only()
            .column(request::Column::ServiceItemId)
            .into_tuple::<Option<Uuid>>()
            .all(&*self.db)
            .await?
            .into_iter()
            .flatten()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
