#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use roomservice_api::{
    auth::{AuthUser, Role},
    build_router,
    config::AppConfig,
    context::{GuestContext, OperatorContext},
    db,
    entities::{
        category::{self, CategoryKind},
        hotel::{self, HotelStatus},
        item, room,
        stay::{self, StayStatus},
    },
    AppState,
};

pub const TEST_SECRET: &str =
    "k3Jq9vX2mR7tY5wZ8pL4nB6cV1xH0gF-s_dA.QeUoIiPyTrEwMbNzXcVbLkJhGfZr9";

/// Helper harness for spinning up the application on a fresh SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

/// A hotel with one room, two food items and one service item.
pub struct Fixture {
    pub hotel: hotel::Model,
    pub room: room::Model,
    pub food: category::Model,
    pub services: category::Model,
    /// 120.00
    pub steak: item::Model,
    /// 50.50
    pub salad: item::Model,
    pub towels: item::Model,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_file = dir.path().join("roomservice_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.cors_allow_any_origin = true;
        // Several connections, so concurrent tests contend in the database itself.
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(pool, cfg).expect("build app state");
        let router = build_router(state.clone()).expect("build router");

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub async fn seed_hotel(&self, name: &str) -> hotel::Model {
        let now = Utc::now();
        hotel::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            status: Set(HotelStatus::Active),
            utc_offset_minutes: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed hotel")
    }

    pub async fn set_hotel_status(&self, hotel: &hotel::Model, status: HotelStatus) {
        let mut active: hotel::ActiveModel = hotel.clone().into();
        active.status = Set(status);
        active.update(self.db()).await.expect("update hotel status");
    }

    pub async fn seed_room(&self, hotel_id: Uuid, number: &str) -> room::Model {
        room::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(hotel_id),
            number: Set(number.to_string()),
            floor: Set(number.chars().next().map(String::from).unwrap_or_default()),
            is_active: Set(true),
            current_stay_id: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed room")
    }

    /// Checks a guest into `room` and returns the new stay id.
    pub async fn check_in(&self, room: &room::Model, guest: &str) -> Uuid {
        let stay = stay::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(room.hotel_id),
            room_id: Set(room.id),
            guest_name: Set(guest.to_string()),
            status: Set(StayStatus::CheckedIn),
            check_in_at: Set(Utc::now()),
            check_out_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed stay");

        let mut active: room::ActiveModel = room.clone().into();
        active.current_stay_id = Set(Some(stay.id));
        active.update(self.db()).await.expect("attach stay");
        stay.id
    }

    pub async fn seed_category(
        &self,
        hotel_id: Uuid,
        name: &str,
        kind: CategoryKind,
    ) -> category::Model {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(hotel_id),
            name: Set(name.to_string()),
            kind: Set(kind),
            parent_id: Set(None),
            position: Set(0),
            is_active: Set(true),
        }
        .insert(self.db())
        .await
        .expect("seed category")
    }

    pub async fn seed_item(
        &self,
        category: &category::Model,
        name: &str,
        price: Decimal,
    ) -> item::Model {
        item::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(category.hotel_id),
            category_id: Set(category.id),
            name: Set(name.to_string()),
            price: Set(price),
            unit: Set("pcs".to_string()),
            description: Set(String::new()),
            is_available: Set(true),
            position: Set(0),
        }
        .insert(self.db())
        .await
        .expect("seed item")
    }

    pub async fn set_item_price(&self, item: &item::Model, price: Decimal) {
        let mut active: item::ActiveModel = item.clone().into();
        active.price = Set(price);
        active.update(self.db()).await.expect("update item price");
    }

    pub async fn seed_fixture(&self, hotel_name: &str) -> Fixture {
        let hotel = self.seed_hotel(hotel_name).await;
        let room = self.seed_room(hotel.id, "101").await;
        let food = self.seed_category(hotel.id, "Mains", CategoryKind::Food).await;
        let services = self
            .seed_category(hotel.id, "Housekeeping", CategoryKind::Service)
            .await;
        let steak = self.seed_item(&food, "Steak", dec!(120.00)).await;
        let salad = self.seed_item(&food, "Salad", dec!(50.50)).await;
        let towels = self.seed_item(&services, "Extra towels", Decimal::ZERO).await;

        Fixture {
            hotel,
            room,
            food,
            services,
            steak,
            salad,
            towels,
        }
    }

    /// Guest context for a room, resolved the same way the guest routes do.
    pub async fn guest(&self, hotel_id: Uuid, room_id: Uuid) -> GuestContext {
        self.state
            .services
            .catalog
            .resolve_guest(hotel_id, room_id)
            .await
            .expect("resolve guest context")
    }

    pub fn operator(&self, role: Role, hotel_id: Option<Uuid>) -> OperatorContext {
        OperatorContext::from_user(AuthUser {
            user_id: format!("{role}-operator"),
            role,
            hotel_id,
            token_id: Uuid::new_v4().to_string(),
        })
        .expect("operator context")
    }

    pub fn token(&self, role: Role, hotel_id: Option<Uuid>) -> String {
        self.state
            .auth
            .issue_token(&format!("{role}-user"), role, hotel_id)
            .expect("issue token")
    }

    /// Send a request with an optional form body and bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        form: Option<&[(&str, &str)]>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {tok}"));
        }

        let body = match form {
            Some(fields) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                let encoded = fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&");
                Body::from(encoded)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        form: &[(&str, &str)],
        token: Option<&str>,
    ) -> Response {
        self.request(Method::POST, uri, Some(form), token).await
    }
}

pub fn guest_path(fixture: &Fixture, suffix: &str) -> String {
    format!(
        "/guest/h/{}/r/{}/{}",
        fixture.hotel.id, fixture.room.id, suffix
    )
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> Value {
    let text = body_text(response).await;
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid json ({e}): {text}"))
}
