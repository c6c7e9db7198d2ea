/*!
 * # Authentication and Authorization Module
 *
 * Operators (hotel staff, hotel admins, platform admins) authenticate to the live board
 * with HS256 bearer tokens. A token carries the operator's role and, for hotel-bound
 * roles, the hotel they operate. Guests never authenticate; their scope comes from the
 * room URL.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ErrorResponse;

/// Account role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    PlatformAdmin,
    HotelAdmin,
    Staff,
    Guest,
}

impl Role {
    /// Roles allowed onto the hotel portal
    pub fn is_operator(self) -> bool {
        matches!(self, Role::PlatformAdmin | Role::HotelAdmin | Role::Staff)
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,              // Subject (operator ID)
    pub role: Role,               // Account role
    pub hotel_id: Option<Uuid>,   // Hotel the operator belongs to
    pub jti: String,              // JWT ID
    pub iat: i64,                 // Issued at time
    pub exp: i64,                 // Expiration time
    pub iss: String,              // Issuer
    pub aud: String,              // Audience
}

/// Authenticated operator extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
    pub hotel_id: Option<Uuid>,
    pub token_id: String,
}

impl AuthUser {
    pub fn is_platform_admin(&self) -> bool {
        self.role == Role::PlatformAdmin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            hotel_id: claims.hotel_id,
            token_id: claims.jti,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issue an access token for an operator
    pub fn issue_token(
        &self,
        subject: &str,
        role: Role,
        hotel_id: Option<Uuid>,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            hotel_id,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.access_token_expiration.as_secs() as i64,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %e, "rejected bearer token");
                AuthError::InvalidToken
            }
        })?
        .claims;

        Ok(claims)
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MissingToken | Self::InvalidToken | Self::TokenExpired => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            Self::InsufficientPermissions => (StatusCode::FORBIDDEN, "forbidden"),
            Self::TokenCreation(_) | Self::ServiceUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
        }

        let message = match &self {
            Self::TokenCreation(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            ok: false,
            error: code.to_string(),
            message,
            request_id: crate::tracing::current_request_id().map(|rid| rid.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceUnavailable.into_response(),
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "portal authentication failed");
            e.into_response()
        }
    }
}

/// Rejects authenticated callers whose role may not use the portal
pub async fn operator_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.role.is_operator() {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    auth_service.validate_token(token).map(AuthUser::from)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_operator(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_operator(self) -> Self {
        self.layer(axum::middleware::from_fn(operator_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::ServiceExt;

    const SECRET: &str = "k3Jq9vX2mR7tY5wZ8pL4nB6cV1xH0gF-s_dA.QeUoIiPyTrEwMbNzXcVbLkJhGfZr9";

    fn service() -> Arc<AuthService> {
        Arc::new(AuthService::new(AuthConfig::new(
            SECRET.to_string(),
            "roomservice-api".to_string(),
            "roomservice-auth".to_string(),
            Duration::from_secs(600),
        )))
    }

    async fn whoami(user: AuthUser) -> String {
        format!("{}:{}", user.user_id, user.role)
    }

    fn app(auth: Arc<AuthService>) -> Router {
        Router::new()
            .route("/portal", get(whoami))
            .with_operator()
            .layer(Extension(auth))
    }

    async fn status_for(auth: Arc<AuthService>, bearer: Option<String>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/portal");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app(auth)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let auth = service();
        let hotel = Uuid::new_v4();
        let token = auth.issue_token("op-1", Role::Staff, Some(hotel)).unwrap();

        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "op-1");
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.hotel_id, Some(hotel));
    }

    #[test]
    fn token_for_other_audience_is_rejected() {
        let issuer = service();
        let token = issuer.issue_token("op-1", Role::Staff, None).unwrap();

        let other = AuthService::new(AuthConfig::new(
            SECRET.to_string(),
            "someone-else".to_string(),
            "roomservice-auth".to_string(),
            Duration::from_secs(600),
        ));
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn role_parses_from_wire_names() {
        assert_eq!("HOTEL_ADMIN".parse::<Role>().unwrap(), Role::HotelAdmin);
        assert_eq!(Role::PlatformAdmin.to_string(), "PLATFORM_ADMIN");
        assert!(!Role::Guest.is_operator());
    }

    #[tokio::test]
    async fn portal_requires_operator_token() {
        let auth = service();
        assert_eq!(status_for(auth.clone(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(auth.clone(), Some("garbage".into())).await,
            StatusCode::UNAUTHORIZED
        );

        let guest = auth.issue_token("g-1", Role::Guest, None).unwrap();
        assert_eq!(status_for(auth.clone(), Some(guest)).await, StatusCode::FORBIDDEN);

        let staff = auth
            .issue_token("op-1", Role::Staff, Some(Uuid::new_v4()))
            .unwrap();
        assert_eq!(status_for(auth, Some(staff)).await, StatusCode::OK);
    }
}
