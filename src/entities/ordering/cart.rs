use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room cart. At most one DRAFT cart exists per (hotel, room, stay); `draft_key` carries
/// that uniqueness through a plain unique index and is cleared when the cart is submitted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub room_id: Uuid,
    #[sea_orm(nullable)]
    pub stay_id: Option<Uuid>,
    pub status: CartStatus,
    #[sea_orm(nullable, unique)]
    pub draft_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
}

/// Key identifying the draft cart slot of a room; a missing stay is its own slot.
pub fn draft_key(hotel_id: Uuid, room_id: Uuid, stay_id: Option<Uuid>) -> String {
    match stay_id {
        Some(stay) => format!("{hotel_id}:{room_id}:{stay}"),
        None => format!("{hotel_id}:{room_id}:-"),
    }
}
