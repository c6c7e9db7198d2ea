//! Seed data script - populates the database with a demo hotel
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - one active hotel with 6 rooms on two floors, one of them occupied
//! - a food menu (breakfast, mains, drinks) and a services menu
//! - access tokens for a hotel admin, a staff member and a platform admin

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tracing::info;
use uuid::Uuid;

use roomservice_api::{
    auth::{AuthConfig, AuthService, Role},
    config, db,
    entities::{
        category::{self, CategoryKind},
        hotel::{self, HotelStatus},
        item, room,
        stay::{self, StayStatus},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Roomservice Seed Data ===");

    let db = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&db).await?;

    let now = Utc::now();
    let hotel = hotel::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Harbour View Hotel".to_string()),
        status: Set(HotelStatus::Active),
        utc_offset_minutes: Set(60),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await?;
    info!("Created hotel {} ({})", hotel.name, hotel.id);

    let mut rooms = Vec::new();
    let layout = [
        ("1", "101"),
        ("1", "102"),
        ("1", "103"),
        ("2", "201"),
        ("2", "202"),
        ("2", "203"),
    ];
    for (floor, number) in layout {
        let created = room::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(hotel.id),
            number: Set(number.to_string()),
            floor: Set(floor.to_string()),
            is_active: Set(true),
            current_stay_id: Set(None),
            created_at: Set(now),
        }
        .insert(&db)
        .await?;
        rooms.push(created);
    }
    info!("  Created {} rooms", rooms.len());

    if let Some(first) = rooms.first().cloned() {
        let guest_stay = stay::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(hotel.id),
            room_id: Set(first.id),
            guest_name: Set("Demo Guest".to_string()),
            status: Set(StayStatus::CheckedIn),
            check_in_at: Set(now),
            check_out_at: Set(None),
        }
        .insert(&db)
        .await?;

        let mut occupied: room::ActiveModel = first.into();
        occupied.current_stay_id = Set(Some(guest_stay.id));
        occupied.update(&db).await?;
        info!("  Checked a demo guest into room 101");
    }

    let food = [
        (
            "Breakfast",
            vec![
                ("Continental breakfast", dec!(18.50), "plate"),
                ("Pancakes with berries", dec!(12.00), "plate"),
            ],
        ),
        (
            "Mains",
            vec![
                ("Club sandwich", dec!(16.00), "plate"),
                ("Grilled salmon", dec!(28.00), "plate"),
                ("Margherita pizza", dec!(19.50), "pizza"),
            ],
        ),
        (
            "Drinks",
            vec![
                ("Still water", dec!(3.50), "bottle"),
                ("Fresh orange juice", dec!(6.00), "glass"),
            ],
        ),
    ];
    let mut item_count = 0;
    for (position, (name, items)) in food.into_iter().enumerate() {
        let cat = create_category(&db, hotel.id, name, CategoryKind::Food, position as i32).await?;
        item_count += create_items(&db, hotel.id, cat, items).await?;
    }

    let services = create_category(&db, hotel.id, "Housekeeping", CategoryKind::Service, 0).await?;
    item_count += create_items(
        &db,
        hotel.id,
        services,
        vec![
            ("Room cleaning", Decimal::ZERO, "visit"),
            ("Extra towels", Decimal::ZERO, "set"),
            ("Laundry pickup", dec!(15.00), "bag"),
        ],
    )
    .await?;
    info!("  Created {} catalog items", item_count);

    let auth = AuthService::new(AuthConfig::from(&cfg));
    let admin = auth.issue_token("demo-hotel-admin", Role::HotelAdmin, Some(hotel.id))?;
    let staff = auth.issue_token("demo-staff", Role::Staff, Some(hotel.id))?;
    let platform = auth.issue_token("demo-platform-admin", Role::PlatformAdmin, None)?;

    info!("\n=== Seed Data Complete ===");
    if let Some(room) = rooms.first() {
        info!(
            "Guest room page: http://localhost:{}/guest/h/{}/r/{}/menu",
            cfg.port, hotel.id, room.id
        );
    }
    info!("Hotel admin token:     {}", admin);
    info!("Staff token:           {}", staff);
    info!("Platform admin token:  {}", platform);
    info!(
        "Try: curl -H \"Authorization: Bearer <token>\" http://localhost:{}/portal/live/poll",
        cfg.port
    );

    Ok(())
}

async fn create_category<C: ConnectionTrait>(
    db: &C,
    hotel_id: Uuid,
    name: &str,
    kind: CategoryKind,
    position: i32,
) -> anyhow::Result<Uuid> {
    let created = category::ActiveModel {
        id: Set(Uuid::new_v4()),
        hotel_id: Set(hotel_id),
        name: Set(name.to_string()),
        kind: Set(kind),
        parent_id: Set(None),
        position: Set(position),
        is_active: Set(true),
    }
    .insert(db)
    .await?;
    Ok(created.id)
}

async fn create_items<C: ConnectionTrait>(
    db: &C,
    hotel_id: Uuid,
    category_id: Uuid,
    items: Vec<(&str, Decimal, &str)>,
) -> anyhow::Result<usize> {
    let count = items.len();
    for (position, (name, price, unit)) in items.into_iter().enumerate() {
        item::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(hotel_id),
            category_id: Set(category_id),
            name: Set(name.to_string()),
            price: Set(price),
            unit: Set(unit.to_string()),
            description: Set(String::new()),
            is_available: Set(true),
            position: Set(position as i32),
        }
        .insert(db)
        .await?;
    }
    Ok(count)
}
