//! Explicit caller scopes passed into every service call.
//!
//! Guests are scoped by the room URL, operators by their token. Services never look
//! the scope up themselves.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::{ColumnTrait, QueryFilter, Select};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{hotel, request, room};
use crate::errors::ServiceError;

/// Hotel, room and stay a guest is acting for
#[derive(Debug, Clone)]
pub struct GuestContext {
    pub hotel: hotel::Model,
    pub room: room::Model,
    pub stay_id: Option<Uuid>,
}

impl GuestContext {
    pub fn hotel_id(&self) -> Uuid {
        self.hotel.id
    }

    pub fn room_id(&self) -> Uuid {
        self.room.id
    }
}

/// Which tenants an operator may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    Hotel(Uuid),
    /// Platform operators without a hotel see every tenant
    AllHotels,
}

impl TenantScope {
    pub fn hotel_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Hotel(id) => Some(*id),
            TenantScope::AllHotels => None,
        }
    }

    /// Restricts a request query to this scope
    pub fn restrict(&self, select: Select<request::Entity>) -> Select<request::Entity> {
        match self {
            TenantScope::Hotel(id) => select.filter(request::Column::HotelId.eq(*id)),
            TenantScope::AllHotels => select,
        }
    }
}

/// Authenticated portal operator and the tenant scope they act in
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub user: AuthUser,
    pub scope: TenantScope,
}

impl OperatorContext {
    pub fn from_user(user: AuthUser) -> Result<Self, ServiceError> {
        if !user.role.is_operator() {
            return Err(ServiceError::Forbidden(format!(
                "role {} cannot use the portal",
                user.role
            )));
        }

        let scope = match user.hotel_id {
            Some(hotel_id) => TenantScope::Hotel(hotel_id),
            None if user.is_platform_admin() => TenantScope::AllHotels,
            None => return Err(ServiceError::NoTenant),
        };

        Ok(Self { user, scope })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OperatorContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("missing operator token".to_string()))?;
        Self::from_user(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use assert_matches::assert_matches;

    fn user(role: Role, hotel_id: Option<Uuid>) -> AuthUser {
        AuthUser {
            user_id: "op".into(),
            role,
            hotel_id,
            token_id: "t".into(),
        }
    }

    #[test]
    fn hotel_bound_operator_is_scoped_to_their_hotel() {
        let hotel = Uuid::new_v4();
        let ctx = OperatorContext::from_user(user(Role::Staff, Some(hotel))).unwrap();
        assert_eq!(ctx.scope, TenantScope::Hotel(hotel));
    }

    #[test]
    fn operator_without_hotel_has_no_tenant() {
        assert_matches!(
            OperatorContext::from_user(user(Role::HotelAdmin, None)),
            Err(ServiceError::NoTenant)
        );
        assert_matches!(
            OperatorContext::from_user(user(Role::Staff, None)),
            Err(ServiceError::NoTenant)
        );
    }

    #[test]
    fn platform_admin_without_hotel_sees_all_tenants() {
        let ctx = OperatorContext::from_user(user(Role::PlatformAdmin, None)).unwrap();
        assert_eq!(ctx.scope, TenantScope::AllHotels);
        assert_eq!(ctx.scope.hotel_id(), None);
    }

    #[test]
    fn guests_cannot_operate() {
        assert_matches!(
            OperatorContext::from_user(user(Role::Guest, Some(Uuid::new_v4()))),
            Err(ServiceError::Forbidden(_))
        );
    }
}
