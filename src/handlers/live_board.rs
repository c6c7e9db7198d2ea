//! Staff live board: page, poll, actions and request detail.

use axum::{
    extract::{Path, State},
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthRouterExt,
    context::OperatorContext,
    entities::request::RequestStatus,
    errors::ServiceError,
    services::live_board::BoardSnapshot,
    AppState,
};

pub const BOARD_PATH: &str = "/portal/live";
pub const POLL_PATH: &str = "/portal/live/poll";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ActionForm {
    /// One of `accept`, `complete` or `cancel`
    pub action: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub ok: bool,
    pub status: RequestStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub ok: bool,
    /// Rendered detail popup
    pub html: String,
}

/// Portal routes; every one requires an operator token.
pub fn portal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(BOARD_PATH, get(live_board_page))
        .route(POLL_PATH, get(poll))
        .route("/portal/live/:id/action", post(apply_action))
        .route("/portal/live/:id/detail", get(request_detail))
        .with_operator()
}

/// Board page with the first snapshot embedded
#[utoipa::path(
    get,
    path = "/portal/live",
    responses(
        (status = 200, description = "Live board page", body = String, content_type = "text/html"),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not an operator, or no hotel on the account", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "portal"
)]
pub async fn live_board_page(
    State(state): State<Arc<AppState>>,
    ctx: OperatorContext,
) -> Result<Html<String>, ServiceError> {
    let snapshot = state.services.live_board.snapshot(&ctx).await?;
    let page = state.services.views.live_board_page(
        &snapshot,
        BOARD_PATH,
        state.config.board_poll_interval_secs,
    )?;
    Ok(Html(page))
}

/// Current open requests and today's counters
#[utoipa::path(
    get,
    path = "/portal/live/poll",
    responses(
        (status = 200, description = "Board snapshot", body = BoardSnapshot),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not an operator, or no hotel on the account", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "portal"
)]
pub async fn poll(
    State(state): State<Arc<AppState>>,
    ctx: OperatorContext,
) -> Result<Json<BoardSnapshot>, ServiceError> {
    Ok(Json(state.services.live_board.poll(&ctx).await?))
}

/// Accept, complete or cancel a request
#[utoipa::path(
    post,
    path = "/portal/live/{id}/action",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body(content = ActionForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Transition applied", body = ActionResponse),
        (status = 400, description = "Unknown action", body = crate::errors::ErrorResponse),
        (status = 404, description = "Request not visible to this operator", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed, or another operator is acting on the request (`bad_state`)", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "portal"
)]
pub async fn apply_action(
    State(state): State<Arc<AppState>>,
    ctx: OperatorContext,
    Path(id): Path<Uuid>,
    Form(form): Form<ActionForm>,
) -> Result<Json<ActionResponse>, ServiceError> {
    let action = form
        .action
        .ok_or_else(|| ServiceError::ValidationError("Missing action".to_string()))?;

    let updated = state.services.live_board.action(&ctx, id, &action).await?;
    info!(request_id = %updated.id, status = %updated.status, operator = %ctx.user.user_id, "board action applied");

    Ok(Json(ActionResponse {
        ok: true,
        status: updated.status,
    }))
}

/// Detail popup for one request
#[utoipa::path(
    get,
    path = "/portal/live/{id}/detail",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Rendered detail", body = DetailResponse),
        (status = 404, description = "Request not visible to this operator", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "portal"
)]
pub async fn request_detail(
    State(state): State<Arc<AppState>>,
    ctx: OperatorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailResponse>, ServiceError> {
    let detail = state.services.live_board.detail(&ctx, id).await?;
    let html = state.services.views.request_detail(&detail)?;
    Ok(Json(DetailResponse { ok: true, html }))
}
