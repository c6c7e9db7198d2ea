//! Read-only lookups against the hotel, room and catalog tables.

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    context::GuestContext,
    entities::{
        category::{self, CategoryKind},
        hotel::{self, HotelStatus},
        item, room,
    },
    errors::ServiceError,
    services::money,
};

/// Catalog item together with the kind of the category it sits in
#[derive(Debug, Clone)]
pub struct OrderableItem {
    pub item: item::Model,
    pub kind: CategoryKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub unit: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuCategory {
    pub id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    pub items: Vec<MenuItem>,
    pub children: Vec<MenuCategory>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Menu {
    pub food: Vec<MenuCategory>,
    pub services: Vec<MenuCategory>,
}

/// Looks up an available item of `hotel_id` and the kind of its category.
///
/// Hidden items, inactive categories and other tenants' items are all not found.
pub async fn find_orderable_item<C>(
    conn: &C,
    hotel_id: Uuid,
    item_id: Uuid,
) -> Result<OrderableItem, ServiceError>
where
    C: ConnectionTrait,
{
    let found = item::Entity::find_by_id(item_id)
        .filter(item::Column::HotelId.eq(hotel_id))
        .filter(item::Column::IsAvailable.eq(true))
        .find_also_related(category::Entity)
        .one(conn)
        .await?;

    match found {
        Some((item, Some(category))) if category.is_active => Ok(OrderableItem {
            item,
            kind: category.kind,
        }),
        _ => Err(ServiceError::NotFound(format!("Item {item_id} not found"))),
    }
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves the room a QR code points at into a guest context.
    ///
    /// Paused or disabled hotels and inactive or foreign rooms are reported as not found.
    #[instrument(skip(self))]
    pub async fn resolve_guest(
        &self,
        hotel_id: Uuid,
        room_id: Uuid,
    ) -> Result<GuestContext, ServiceError> {
        let db = &*self.db;

        let hotel = hotel::Entity::find_by_id(hotel_id)
            .filter(hotel::Column::Status.eq(HotelStatus::Active))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Hotel {hotel_id} not found")))?;

        let room = room::Entity::find_by_id(room_id)
            .filter(room::Column::HotelId.eq(hotel_id))
            .filter(room::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Room {room_id} not found")))?;

        let stay_id = room.current_stay_id;
        Ok(GuestContext {
            hotel,
            room,
            stay_id,
        })
    }

    /// Active categories of the guest's hotel with their available items, split by kind.
    #[instrument(skip(self, ctx), fields(hotel_id = %ctx.hotel_id()))]
    pub async fn menu(&self, ctx: &GuestContext) -> Result<Menu, ServiceError> {
        let db = &*self.db;

        let categories = category::Entity::find()
            .filter(category::Column::HotelId.eq(ctx.hotel_id()))
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Position)
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?;

        let items = item::Entity::find()
            .filter(item::Column::HotelId.eq(ctx.hotel_id()))
            .filter(item::Column::IsAvailable.eq(true))
            .order_by_asc(item::Column::Position)
            .order_by_asc(item::Column::Name)
            .all(db)
            .await?;

        let mut items_by_category: HashMap<Uuid, Vec<MenuItem>> = HashMap::new();
        for it in items {
            items_by_category
                .entry(it.category_id)
                .or_default()
                .push(MenuItem {
                    id: it.id,
                    name: it.name,
                    price: money::normalize(it.price),
                    unit: it.unit,
                    description: it.description,
                });
        }

        let mut children: HashMap<Uuid, Vec<MenuCategory>> = HashMap::new();
        let mut top_level = Vec::new();
        for c in &categories {
            let entry = MenuCategory {
                id: c.id,
                name: c.name.clone(),
                kind: c.kind,
                items: items_by_category.remove(&c.id).unwrap_or_default(),
                children: Vec::new(),
            };
            match c.parent_id {
                Some(parent) => children.entry(parent).or_default().push(entry),
                None => top_level.push(entry),
            }
        }

        let mut menu = Menu::default();
        for mut entry in top_level {
            entry.children = children.remove(&entry.id).unwrap_or_default();
            match entry.kind {
                CategoryKind::Food => menu.food.push(entry),
                CategoryKind::Service => menu.services.push(entry),
            }
        }

        debug!(
            food = menu.food.len(),
            services = menu.services.len(),
            "menu assembled"
        );
        Ok(menu)
    }
}
