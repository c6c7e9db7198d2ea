//! Guest endpoints, reached from the room QR code.
//!
//! Every path is scoped by `/guest/h/{hotel_id}/r/{room_id}`; the [`Guest`] extractor turns
//! that prefix into a [`GuestContext`] before any handler runs.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    context::GuestContext,
    errors::ServiceError,
    handlers::common::{
        cart_fragment_response, parse_quantity, parse_quantity_or_one, require_uuid, CreatedRequestResponse,
    },
    services::{catalog::MenuCategory, requests::RoomSummary},
    AppState,
};

/// Guest context resolved from the room path
pub struct Guest(pub GuestContext);

#[derive(Debug, Deserialize)]
struct RoomPath {
    hotel_id: Uuid,
    room_id: Uuid,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Guest {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Path(path) = Path::<RoomPath>::from_request_parts(parts, state)
            .await
            .map_err(|_| ServiceError::NotFound("Room not found".to_string()))?;

        state
            .services
            .catalog
            .resolve_guest(path.hotel_id, path.room_id)
            .await
            .map(Guest)
    }
}

/// Form body of the cart and service endpoints; both fields arrive as raw strings
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ItemForm {
    pub item_id: Option<String>,
    pub qty: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HotelLabel {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomLabel {
    pub id: Uuid,
    pub number: String,
    pub floor: String,
}

/// Everything the room page needs on first load
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMenuResponse {
    pub hotel: HotelLabel,
    pub room: RoomLabel,
    #[schema(value_type = Vec<Object>)]
    pub food: Vec<MenuCategory>,
    #[schema(value_type = Vec<Object>)]
    pub services: Vec<MenuCategory>,
    pub cart_count: i64,
    /// Service items with an open request in this room
    pub open_service_item_ids: Vec<Uuid>,
}

pub fn guest_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guest/h/:hotel_id/r/:room_id/menu", get(room_menu))
        .route("/guest/h/:hotel_id/r/:room_id/cart", get(cart_view))
        .route("/guest/h/:hotel_id/r/:room_id/cart/add", post(cart_add))
        .route("/guest/h/:hotel_id/r/:room_id/cart/update", post(cart_update))
        .route("/guest/h/:hotel_id/r/:room_id/cart/clear", post(cart_clear))
        .route("/guest/h/:hotel_id/r/:room_id/order/submit", post(order_submit))
        .route(
            "/guest/h/:hotel_id/r/:room_id/service/request",
            post(service_request),
        )
        .route("/guest/h/:hotel_id/r/:room_id/summary", get(room_summary))
}

/// Room page data: catalog, cart badge and already-requested services
#[utoipa::path(
    get,
    path = "/guest/h/{hotel_id}/r/{room_id}/menu",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room menu", body = RoomMenuResponse),
        (status = 404, description = "Unknown or inactive hotel or room", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn room_menu(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
) -> Result<Json<RoomMenuResponse>, ServiceError> {
    let menu = state.services.catalog.menu(&ctx).await?;
    let cart = state.services.cart.summary(&ctx).await?;
    let open_service_item_ids = state
        .services
        .duplicate_guard
        .open_service_item_ids(&ctx)
        .await?;

    Ok(Json(RoomMenuResponse {
        hotel: HotelLabel {
            id: ctx.hotel.id,
            name: ctx.hotel.name.clone(),
        },
        room: RoomLabel {
            id: ctx.room.id,
            number: ctx.room.number.clone(),
            floor: ctx.room.floor.clone(),
        },
        food: menu.food,
        services: menu.services,
        cart_count: cart.item_count,
        open_service_item_ids,
    }))
}

/// Render the cart fragment
#[utoipa::path(
    get,
    path = "/guest/h/{hotel_id}/r/{room_id}/cart",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Cart fragment; X-Cart-Count carries the badge count", body = String, content_type = "text/html"),
        (status = 404, description = "Unknown or inactive hotel or room", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn cart_view(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.summary(&ctx).await?;
    let html = state.services.views.cart_fragment(&cart)?;
    Ok(cart_fragment_response(html, cart.item_count))
}

/// Add an item to the cart
#[utoipa::path(
    post,
    path = "/guest/h/{hotel_id}/r/{room_id}/cart/add",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    request_body(content = ItemForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Updated cart fragment", body = String, content_type = "text/html"),
        (status = 400, description = "Missing item_id, or qty above the line limit", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item, hotel or room", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn cart_add(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
    Form(form): Form<ItemForm>,
) -> Result<Response, ServiceError> {
    let item_id = require_uuid("item_id", form.item_id.as_deref())?;
    // Non-numeric quantities are clamped like non-positive ones.
    let qty = parse_quantity_or_one(form.qty.as_deref())?;

    let cart = state.services.cart.add_item(&ctx, item_id, qty).await?;
    let html = state.services.views.cart_fragment(&cart)?;
    Ok(cart_fragment_response(html, cart.item_count))
}

/// Set a cart line to an exact quantity; zero removes it
#[utoipa::path(
    post,
    path = "/guest/h/{hotel_id}/r/{room_id}/cart/update",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    request_body(content = ItemForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Updated cart fragment", body = String, content_type = "text/html"),
        (status = 400, description = "Missing item_id or malformed qty", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item is not in the cart", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn cart_update(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
    Form(form): Form<ItemForm>,
) -> Result<Response, ServiceError> {
    let item_id = require_uuid("item_id", form.item_id.as_deref())?;
    let qty = parse_quantity(form.qty.as_deref())?;

    let cart = state.services.cart.update_item(&ctx, item_id, qty).await?;
    let html = state.services.views.cart_fragment(&cart)?;
    Ok(cart_fragment_response(html, cart.item_count))
}

/// Remove every line from the cart
#[utoipa::path(
    post,
    path = "/guest/h/{hotel_id}/r/{room_id}/cart/clear",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Empty cart fragment", body = String, content_type = "text/html")
    ),
    tag = "guest"
)]
pub async fn cart_clear(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.clear(&ctx).await?;
    let html = state.services.views.cart_fragment(&cart)?;
    Ok(cart_fragment_response(html, cart.item_count))
}

/// Submit the cart as a food order
#[utoipa::path(
    post,
    path = "/guest/h/{hotel_id}/r/{room_id}/order/submit",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Order created", body = CreatedRequestResponse),
        (status = 400, description = "Cart is empty (`empty_cart`)", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn order_submit(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
) -> Result<Json<CreatedRequestResponse>, ServiceError> {
    let request = state.services.requests.submit_order(&ctx).await?;
    Ok(Json(CreatedRequestResponse::new(request.id)))
}

/// Request a service item
#[utoipa::path(
    post,
    path = "/guest/h/{hotel_id}/r/{room_id}/service/request",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    request_body(content = ItemForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Service request created", body = CreatedRequestResponse),
        (status = 400, description = "Missing item_id or not a service (`not_a_service`)", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already open for this room (`already_requested`)", body = crate::errors::ErrorResponse)
    ),
    tag = "guest"
)]
pub async fn service_request(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
    Form(form): Form<ItemForm>,
) -> Result<Json<CreatedRequestResponse>, ServiceError> {
    let item_id = require_uuid("item_id", form.item_id.as_deref())?;
    let request = state.services.requests.request_service(&ctx, item_id).await?;
    Ok(Json(CreatedRequestResponse::new(request.id)))
}

/// Food lines and service requests of this room, latest first
#[utoipa::path(
    get,
    path = "/guest/h/{hotel_id}/r/{room_id}/summary",
    params(
        ("hotel_id" = Uuid, Path, description = "Hotel id"),
        ("room_id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room history", body = RoomSummary)
    ),
    tag = "guest"
)]
pub async fn room_summary(
    State(state): State<Arc<AppState>>,
    Guest(ctx): Guest,
) -> Result<Json<RoomSummary>, ServiceError> {
    Ok(Json(state.services.requests.room_summary(&ctx).await?))
}
