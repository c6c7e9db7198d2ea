//! Live board: the staff view of open requests, refreshed by polling.
//!
//! Each snapshot is read inside one transaction so the lists and the counters describe the
//! same moment. There is no diffing; every poll returns the complete board.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    AccessMode, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, IsolationLevel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    context::{OperatorContext, TenantScope},
    entities::{
        hotel,
        request::{self, RequestKind, RequestStatus},
        request_line, room,
    },
    errors::ServiceError,
    services::{money, request_status::RequestAction, requests::RequestService},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreviewLine {
    pub name: String,
    pub qty: i32,
}

/// One request as shown on the board
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardCard {
    pub id: Uuid,
    /// Room number label
    pub room: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
    #[schema(value_type = String, example = "290.50")]
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    /// First few lines of a FOOD request; empty for SERVICE
    pub lines: Vec<PreviewLine>,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoardCounts {
    pub completed_today: u64,
    pub cancelled_today: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardSnapshot {
    pub new: Vec<BoardCard>,
    pub accepted: Vec<BoardCard>,
    pub counts: BoardCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailLine {
    pub name: String,
    pub qty: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

/// Everything the detail popup shows for one request
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    pub id: Uuid,
    pub room: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub subtotal: Decimal,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub lines: Vec<DetailLine>,
}

#[derive(Debug, Clone, Copy)]
pub struct BoardSettings {
    pub list_limit: u64,
    pub preview_lines: usize,
    pub default_utc_offset_minutes: i32,
}

impl From<&AppConfig> for BoardSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            list_limit: cfg.board_list_limit,
            preview_lines: cfg.board_preview_lines as usize,
            default_utc_offset_minutes: cfg.default_utc_offset_minutes,
        }
    }
}

#[derive(Clone)]
pub struct LiveBoardService {
    db: Arc<DatabaseConnection>,
    requests: RequestService,
    settings: BoardSettings,
}

impl LiveBoardService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        requests: RequestService,
        settings: BoardSettings,
    ) -> Self {
        Self {
            db,
            requests,
            settings,
        }
    }

    /// Open requests of the operator's scope plus today's closed counters.
    #[instrument(skip(self, ctx), fields(scope = ?ctx.scope))]
    pub async fn snapshot(&self, ctx: &OperatorContext) -> Result<BoardSnapshot, ServiceError> {
        let txn = self.begin_snapshot().await?;

        let new = self
            .cards(&txn, &ctx.scope, RequestStatus::New, request::Column::CreatedAt)
            .await?;
        let accepted = self
            .cards(&txn, &ctx.scope, RequestStatus::Accepted, request::Column::UpdatedAt)
            .await?;
        let counts = self.today_counts(&txn, &ctx.scope, Utc::now()).await?;

        txn.commit().await?;

        debug!(
            new = new.len(),
            accepted = accepted.len(),
            completed_today = counts.completed_today,
            cancelled_today = counts.cancelled_today,
            "board snapshot"
        );
        Ok(BoardSnapshot {
            new,
            accepted,
            counts,
        })
    }

    /// Same payload as [`Self::snapshot`]; the client calls it on an interval.
    pub async fn poll(&self, ctx: &OperatorContext) -> Result<BoardSnapshot, ServiceError> {
        self.snapshot(ctx).await
    }

    #[instrument(skip(self, ctx), fields(scope = ?ctx.scope))]
    pub async fn detail(
        &self,
        ctx: &OperatorContext,
        request_id: Uuid,
    ) -> Result<RequestDetail, ServiceError> {
        let db = &*self.db;

        let (req, room) = ctx
            .scope
            .restrict(request::Entity::find_by_id(request_id))
            .find_also_related(room::Entity)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {request_id} not found")))?;

        let lines = request_line::Entity::find()
            .filter(request_line::Column::RequestId.eq(req.id))
            .order_by_asc(request_line::Column::NameSnapshot)
            .all(db)
            .await?
            .into_iter()
            .map(|line| DetailLine {
                name: line.name_snapshot,
                qty: line.quantity,
                price: money::normalize(line.price_snapshot),
                line_total: money::normalize(line.line_total),
            })
            .collect();

        Ok(RequestDetail {
            id: req.id,
            room: room.map(|r| r.number).unwrap_or_default(),
            kind: req.kind,
            status: req.status,
            subtotal: money::normalize(req.subtotal),
            note: req.note,
            created_at: req.created_at,
            updated_at: req.updated_at,
            accepted_at: req.accepted_at,
            completed_at: req.completed_at,
            cancelled_at: req.cancelled_at,
            lines,
        })
    }

    /// Parses a board action and applies it through the lifecycle engine.
    pub async fn action(
        &self,
        ctx: &OperatorContext,
        request_id: Uuid,
        action: &str,
    ) -> Result<request::Model, ServiceError> {
        let action = RequestAction::from_str(action.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "unknown action '{action}', expected accept, complete or cancel"
            ))
        })?;
        self.requests.transition(ctx, request_id, action).await
    }

    async fn begin_snapshot(&self) -> Result<DatabaseTransaction, ServiceError> {
        let txn = match self.db.get_database_backend() {
            DbBackend::Postgres => {
                self.db
                    .begin_with_config(
                        Some(IsolationLevel::RepeatableRead),
                        Some(AccessMode::ReadOnly),
                    )
                    .await?
            }
            _ => self.db.begin().await?,
        };
        Ok(txn)
    }

    async fn cards(
        &self,
        txn: &DatabaseTransaction,
        scope: &TenantScope,
        status: RequestStatus,
        order_by: request::Column,
    ) -> Result<Vec<BoardCard>, ServiceError> {
        let rows = scope
            .restrict(request::Entity::find())
            .filter(request::Column::Status.eq(status))
            .order_by_desc(order_by)
            .limit(self.settings.list_limit)
            .find_also_related(room::Entity)
            .all(txn)
            .await?;

        let food_ids: Vec<Uuid> = rows
            .iter()
            .filter(|(r, _)| r.kind == RequestKind::Food)
            .map(|(r, _)| r.id)
            .collect();
        let mut previews = self.preview_lines(txn, food_ids).await?;

        Ok(rows
            .into_iter()
            .map(|(req, room)| BoardCard {
                id: req.id,
                room: room.map(|r| r.number).unwrap_or_default(),
                kind: req.kind,
                status: req.status,
                subtotal: money::normalize(req.subtotal),
                created_at: req.created_at,
                updated_at: req.updated_at,
                accepted_at: req.accepted_at,
                lines: previews.remove(&req.id).unwrap_or_default(),
                note: req.note,
            })
            .collect())
    }

    async fn preview_lines(
        &self,
        txn: &DatabaseTransaction,
        request_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<PreviewLine>>, ServiceError> {
        let mut previews: HashMap<Uuid, Vec<PreviewLine>> = HashMap::new();
        if request_ids.is_empty() {
            return Ok(previews);
        }

        let lines = request_line::Entity::find()
            .filter(request_line::Column::RequestId.is_in(request_ids))
            .order_by_asc(request_line::Column::NameSnapshot)
            .all(txn)
            .await?;

        for line in lines {
            let entry = previews.entry(line.request_id).or_default();
            if entry.len() < self.settings.preview_lines {
                entry.push(PreviewLine {
                    name: line.name_snapshot,
                    qty: line.quantity,
                });
            }
        }
        Ok(previews)
    }

    async fn utc_offset_minutes<C>(
        &self,
        conn: &C,
        scope: &TenantScope,
    ) -> Result<i32, ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(hotel_id) = scope.hotel_id() else {
            return Ok(self.settings.default_utc_offset_minutes);
        };

        let offset = hotel::Entity::find_by_id(hotel_id)
            .one(conn)
            .await?
            .map(|h| h.utc_offset_minutes)
            .unwrap_or(self.settings.default_utc_offset_minutes);
        Ok(offset)
    }

    async fn today_counts(
        &self,
        txn: &DatabaseTransaction,
        scope: &TenantScope,
        now: DateTime<Utc>,
    ) -> Result<BoardCounts, ServiceError> {
        let offset = self.utc_offset_minutes(txn, scope).await?;
        let (start, end) = local_day_bounds(now, offset);

        let completed_today = scope
            .restrict(request::Entity::find())
            .filter(request::Column::Status.eq(RequestStatus::Completed))
            .filter(request::Column::CompletedAt.gte(start))
            .filter(request::Column::CompletedAt.lt(end))
            .count(txn)
            .await?;

        let cancelled_today = scope
            .restrict(request::Entity::find())
            .filter(request::Column::Status.eq(RequestStatus::Cancelled))
            .filter(request::Column::CancelledAt.gte(start))
            .filter(request::Column::CancelledAt.lt(end))
            .count(txn)
            .await?;

        Ok(BoardCounts {
            completed_today,
            cancelled_today,
        })
    }
}

/// UTC bounds `[start, end)` of the local calendar day containing `now`.
pub fn local_day_bounds(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = Duration::minutes(i64::from(utc_offset_minutes));
    let local_date = (now + offset).date_naive();
    let start = local_date.and_time(NaiveTime::MIN).and_utc() - offset;
    (start, start + Duration::days(1))
}
