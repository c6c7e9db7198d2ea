use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A submitted food order or service request, as shown on the live board.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub room_id: Uuid,
    #[sea_orm(nullable)]
    pub stay_id: Option<Uuid>,
    pub kind: RequestKind,
    pub status: RequestStatus,
    /// Catalog item a SERVICE request was made for
    #[sea_orm(nullable)]
    pub service_item_id: Option<Uuid>,
    /// Set only while a SERVICE request is open; unique, so one open request per room and service
    #[sea_orm(nullable, unique)]
    pub open_service_key: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub subtotal: Decimal,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::request_line::Entity")]
    RequestLines,
    #[sea_orm(
        belongs_to = "crate::entities::room::Entity",
        from = "Column::RoomId",
        to = "crate::entities::room::Column::Id"
    )]
    Room,
}

impl Related<super::request_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestLines.def()
    }
}

impl Related<crate::entities::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    #[sea_orm(string_value = "FOOD")]
    Food,
    #[sea_orm(string_value = "SERVICE")]
    Service,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl RequestStatus {
    /// NEW and ACCEPTED requests are still waiting on staff.
    pub fn is_open(self) -> bool {
        matches!(self, RequestStatus::New | RequestStatus::Accepted)
    }
}
