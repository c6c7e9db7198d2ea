use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roomservice API",
        version = "0.1.0",
        description = r#"
# Roomservice API

In-room ordering for hotels. Guests reach their room page from a QR code, fill a cart with food
items and submit it, or request services such as housekeeping. Staff work the requests from a
live board that refreshes by polling.

## Guest routes

Every guest path is scoped by `/guest/h/{hotel_id}/r/{room_id}`. Bodies are form encoded.
Cart endpoints answer with an HTML fragment and an `X-Cart-Count` header.

## Portal routes

Portal routes require an operator token:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body:

```json
{
  "ok": false,
  "error": "empty_cart",
  "message": "Cart is empty",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "guest", description = "Room menu, cart, orders and service requests"),
        (name = "portal", description = "Staff live board"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Guest
        crate::handlers::guest::room_menu,
        crate::handlers::guest::cart_view,
        crate::handlers::guest::cart_add,
        crate::handlers::guest::cart_update,
        crate::handlers::guest::cart_clear,
        crate::handlers::guest::order_submit,
        crate::handlers::guest::service_request,
        crate::handlers::guest::room_summary,

        // Portal
        crate::handlers::live_board::live_board_page,
        crate::handlers::live_board::poll,
        crate::handlers::live_board::apply_action,
        crate::handlers::live_board::request_detail,

        crate::health
    ),
    components(
        schemas(
            crate::handlers::common::CreatedRequestResponse,
            crate::handlers::guest::ItemForm,
            crate::handlers::guest::RoomMenuResponse,
            crate::handlers::guest::HotelLabel,
            crate::handlers::guest::RoomLabel,
            crate::handlers::live_board::ActionForm,
            crate::handlers::live_board::ActionResponse,
            crate::handlers::live_board::DetailResponse,
            crate::services::requests::RoomSummary,
            crate::services::requests::SummaryEntry,
            crate::services::live_board::BoardSnapshot,
            crate::services::live_board::BoardCard,
            crate::services::live_board::BoardCounts,
            crate::services::live_board::PreviewLine,
            crate::entities::request::RequestKind,
            crate::entities::request::RequestStatus,
            crate::HealthResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
