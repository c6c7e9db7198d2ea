//! Request lifecycle: turning carts and service taps into requests, and moving requests
//! through their status machine.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    context::{GuestContext, OperatorContext},
    db::RowLocks,
    entities::{
        cart::{self, draft_key, CartStatus},
        cart_item,
        category::CategoryKind,
        item,
        request::{self, RequestKind, RequestStatus},
        request_line,
    },
    errors::{is_unique_violation, ServiceError},
    services::{
        cart::lock_draft,
        catalog::find_orderable_item,
        duplicate_guard::{open_service_key, DuplicateRequestGuard},
        money,
        request_status::{transition, InvalidTransition, RequestAction},
    },
};

/// One row of the guest's history modal
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SummaryEntry {
    pub request_id: Uuid,
    pub name: String,
    pub qty: i32,
    #[schema(value_type = String, example = "12.50")]
    pub price: Decimal,
    pub status: RequestStatus,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RoomSummary {
    pub food: Vec<SummaryEntry>,
    pub services: Vec<SummaryEntry>,
}

#[derive(Clone)]
pub struct RequestService {
    db: Arc<DatabaseConnection>,
    locks: RowLocks,
    guard: DuplicateRequestGuard,
    summary_limit: u64,
}

impl RequestService {
    pub fn new(db: Arc<DatabaseConnection>, locks: RowLocks, summary_limit: u64) -> Self {
        let guard = DuplicateRequestGuard::new(db.clone());
        Self {
            db,
            locks,
            guard,
            summary_limit,
        }
    }

    /// Converts the guest's draft cart into a FOOD request.
    ///
    /// Creating the request and its lines, emptying the cart and marking it SUBMITTED
    /// commit together or not at all.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn submit_order(&self, ctx: &GuestContext) -> Result<request::Model, ServiceError> {
        let key = draft_key(ctx.hotel_id(), ctx.room_id(), ctx.stay_id);
        let txn = self.db.begin().await?;

        let cart = match lock_draft(&txn, cart::Column::DraftKey.eq(key)).await? {
            Some(cart) => cart,
            None => {
                txn.rollback().await?;
                return Err(ServiceError::EmptyCart);
            }
        };

        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(item::Entity)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let subtotal = money::total(lines.iter().map(|(l, _)| (l.price_snapshot, l.quantity)));
        let now = Utc::now();
        let request = request::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(ctx.hotel_id()),
            room_id: Set(ctx.room_id()),
            stay_id: Set(ctx.stay_id),
            kind: Set(RequestKind::Food),
            status: Set(RequestStatus::New),
            service_item_id: Set(None),
            open_service_key: Set(None),
            subtotal: Set(subtotal),
            note: Set(String::new()),
            created_at: Set(now),
            updated_at: Set(now),
            accepted_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let line_count = lines.len();
        let snapshots = lines.into_iter().map(|(line, item)| request_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_id: Set(request.id),
            item_id: Set(line.item_id),
            name_snapshot: Set(item.map(|it| it.name).unwrap_or_default()),
            price_snapshot: Set(money::normalize(line.price_snapshot)),
            quantity: Set(line.quantity),
            line_total: Set(money::line_total(line.price_snapshot, line.quantity)),
        });
        request_line::Entity::insert_many(snapshots)
            .exec_without_returning(&txn)
            .await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart_id = cart.id;
        let mut submitted: cart::ActiveModel = cart.into();
        submitted.status = Set(CartStatus::Submitted);
        submitted.draft_key = Set(None);
        submitted.updated_at = Set(now);
        submitted.update(&txn).await?;

        txn.commit().await?;

        counter!("requests.created", 1, "kind" => "FOOD");
        info!(
            request_id = %request.id,
            %cart_id,
            lines = line_count,
            subtotal = %request.subtotal,
            "order submitted"
        );
        Ok(request)
    }

    /// Creates a SERVICE request for a single catalog item.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn request_service(
        &self,
        ctx: &GuestContext,
        item_id: Uuid,
    ) -> Result<request::Model, ServiceError> {
        let orderable = find_orderable_item(&*self.db, ctx.hotel_id(), item_id).await?;
        if orderable.kind != CategoryKind::Service {
            return Err(ServiceError::NotAService(item_id));
        }

        if self.guard.has_open_service_request(ctx, item_id).await? {
            return Err(ServiceError::DuplicateRequest(item_id));
        }

        let now = Utc::now();
        let service = orderable.item;
        let created = request::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(ctx.hotel_id()),
            room_id: Set(ctx.room_id()),
            stay_id: Set(ctx.stay_id),
            kind: Set(RequestKind::Service),
            status: Set(RequestStatus::New),
            service_item_id: Set(Some(service.id)),
            open_service_key: Set(Some(open_service_key(
                ctx.hotel_id(),
                ctx.room_id(),
                service.id,
            ))),
            subtotal: Set(money::normalize(service.price)),
            note: Set(truncate_note(&service.name)),
            created_at: Set(now),
            updated_at: Set(now),
            accepted_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
        }
        .insert(&*self.db)
        .await;

        match created {
            Ok(request) => {
                counter!("requests.created", 1, "kind" => "SERVICE");
                info!(request_id = %request.id, %item_id, "service requested");
                Ok(request)
            }
            Err(err) if is_unique_violation(&err) => {
                warn!(%item_id, "concurrent duplicate service request rejected");
                Err(ServiceError::DuplicateRequest(item_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Applies a staff action to a request in the operator's scope.
    ///
    /// A second operator acting on the same request at the same moment is rejected with
    /// [`ServiceError::Busy`]; one acting after the first committed sees the new status and
    /// gets [`ServiceError::InvalidStateTransition`] if the action no longer applies. Both
    /// reach the caller as `bad_state`.
    #[instrument(skip(self, ctx), fields(operator = %ctx.user.user_id))]
    pub async fn transition(
        &self,
        ctx: &OperatorContext,
        request_id: Uuid,
        action: RequestAction,
    ) -> Result<request::Model, ServiceError> {
        let select = ctx.scope.restrict(request::Entity::find_by_id(request_id));

        let updated = self
            .locks
            .mutate(&self.db, request_id, select, move |txn, current| {
                Box::pin(async move {
                    let from = current.status;
                    let next = transition(from, action)?;
                    let now = Utc::now();

                    let mut patch = request::ActiveModel {
                        status: Set(next),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    match next {
                        RequestStatus::Accepted => patch.accepted_at = Set(Some(now)),
                        RequestStatus::Completed => patch.completed_at = Set(Some(now)),
                        RequestStatus::Cancelled => patch.cancelled_at = Set(Some(now)),
                        RequestStatus::New => {}
                    }
                    if !next.is_open() {
                        patch.open_service_key = Set(None);
                    }

                    // Conditional on the status we read, in case the row lock is a no-op.
                    let result = request::Entity::update_many()
                        .set(patch)
                        .filter(request::Column::Id.eq(current.id))
                        .filter(request::Column::Status.eq(from))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(InvalidTransition { from, action }.into());
                    }

                    let mut updated = current;
                    updated.status = next;
                    updated.updated_at = now;
                    match next {
                        RequestStatus::Accepted => updated.accepted_at = Some(now),
                        RequestStatus::Completed => updated.completed_at = Some(now),
                        RequestStatus::Cancelled => updated.cancelled_at = Some(now),
                        RequestStatus::New => {}
                    }
                    if !next.is_open() {
                        updated.open_service_key = None;
                    }
                    Ok(updated)
                })
            })
            .await?;

        counter!("requests.transition", 1, "action" => action.to_string());
        info!(
            %request_id,
            %action,
            status = %updated.status,
            "request status changed"
        );
        Ok(updated)
    }

    /// Food lines and service requests of the guest's room, newest requests first.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn room_summary(&self, ctx: &GuestContext) -> Result<RoomSummary, ServiceError> {
        let db = &*self.db;

        let requests = request::Entity::find()
            .filter(request::Column::HotelId.eq(ctx.hotel_id()))
            .filter(request::Column::RoomId.eq(ctx.room_id()))
            .order_by_desc(request::Column::CreatedAt)
            .limit(self.summary_limit)
            .all(db)
            .await?;

        let food_ids: Vec<Uuid> = requests
            .iter()
            .filter(|r| r.kind == RequestKind::Food)
            .map(|r| r.id)
            .collect();

        let mut lines_by_request: HashMap<Uuid, Vec<request_line::Model>> = HashMap::new();
        if !food_ids.is_empty() {
            let lines = request_line::Entity::find()
                .filter(request_line::Column::RequestId.is_in(food_ids))
                .order_by_asc(request_line::Column::NameSnapshot)
                .all(db)
                .await?;
            for line in lines {
                lines_by_request.entry(line.request_id).or_default().push(line);
            }
        }

        let mut summary = RoomSummary::default();
        for req in requests {
            match req.kind {
                RequestKind::Food => {
                    for line in lines_by_request.remove(&req.id).unwrap_or_default() {
                        summary.food.push(SummaryEntry {
                            request_id: req.id,
                            name: line.name_snapshot,
                            qty: line.quantity,
                            price: money::normalize(line.price_snapshot),
                            status: req.status,
                            ts: req.created_at,
                        });
                    }
                }
                RequestKind::Service => summary.services.push(SummaryEntry {
                    request_id: req.id,
                    name: if req.note.is_empty() {
                        "Service".to_string()
                    } else {
                        req.note.clone()
                    },
                    qty: 1,
                    price: money::normalize(req.subtotal),
                    status: req.status,
                    ts: req.created_at,
                }),
            }
        }

        Ok(summary)
    }
}

const NOTE_MAX_CHARS: usize = 200;

fn truncate_note(text: &str) -> String {
    text.chars().take(NOTE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_capped() {
        let long = "x".repeat(NOTE_MAX_CHARS + 20);
        assert_eq!(truncate_note(&long).chars().count(), NOTE_MAX_CHARS);
        assert_eq!(truncate_note("Towels"), "Towels");
    }
}
