use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_ordering_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Hotels::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Hotels::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Hotels::Name).string().not_null())
                        .col(
                            ColumnDef::new(Hotels::Status)
                                .string_len(12)
                                .not_null()
                                .default("ACTIVE"),
                        )
                        .col(
                            ColumnDef::new(Hotels::UtcOffsetMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Hotels::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Hotels::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Rooms::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Rooms::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Rooms::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Rooms::Number).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Rooms::Floor)
                                .string_len(20)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Rooms::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Rooms::CurrentStayId).uuid().null())
                        .col(
                            ColumnDef::new(Rooms::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rooms_hotel")
                                .from(Rooms::Table, Rooms::HotelId)
                                .to(Hotels::Table, Hotels::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_rooms_hotel_number")
                        .table(Rooms::Table)
                        .col(Rooms::HotelId)
                        .col(Rooms::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Stays::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stays::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stays::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Stays::RoomId).uuid().not_null())
                        .col(
                            ColumnDef::new(Stays::GuestName)
                                .string_len(120)
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Stays::Status).string_len(12).not_null())
                        .col(
                            ColumnDef::new(Stays::CheckInAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stays::CheckOutAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stays_room")
                                .from(Stays::Table, Stays::RoomId)
                                .to(Rooms::Table, Rooms::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Categories::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Categories::Name).string_len(120).not_null())
                        .col(ColumnDef::new(Categories::Kind).string_len(10).not_null())
                        .col(ColumnDef::new(Categories::ParentId).uuid().null())
                        .col(
                            ColumnDef::new(Categories::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Categories::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_categories_hotel")
                                .from(Categories::Table, Categories::HotelId)
                                .to(Hotels::Table, Hotels::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Items::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Items::Name).string_len(120).not_null())
                        .col(
                            ColumnDef::new(Items::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::Unit)
                                .string_len(20)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Items::Description)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Items::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Items::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_items_category")
                                .from(Items::Table, Items::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_hotel_category")
                        .table(Items::Table)
                        .col(Items::HotelId)
                        .col(Items::CategoryId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stays::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Rooms::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Hotels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Hotels {
        Table,
        Id,
        Name,
        Status,
        UtcOffsetMinutes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Rooms {
        Table,
        Id,
        HotelId,
        Number,
        Floor,
        IsActive,
        CurrentStayId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Stays {
        Table,
        Id,
        HotelId,
        RoomId,
        GuestName,
        Status,
        CheckInAt,
        CheckOutAt,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        HotelId,
        Name,
        Kind,
        ParentId,
        Position,
        IsActive,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        HotelId,
        CategoryId,
        Name,
        Price,
        Unit,
        Description,
        IsAvailable,
        Position,
    }
}

mod m20240301_000002_create_ordering_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_ordering_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Carts::RoomId).uuid().not_null())
                        .col(ColumnDef::new(Carts::StayId).uuid().null())
                        .col(
                            ColumnDef::new(Carts::Status)
                                .string_len(12)
                                .not_null()
                                .default("DRAFT"),
                        )
                        .col(ColumnDef::new(Carts::DraftKey).string_len(120).null())
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Unique indexes ignore NULLs, so only DRAFT carts compete for a slot.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_carts_draft_key")
                        .table(Carts::Table)
                        .col(Carts::DraftKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_carts_room_status")
                        .table(Carts::Table)
                        .col(Carts::HotelId)
                        .col(Carts::RoomId)
                        .col(Carts::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(CartItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(CartItems::PriceSnapshot)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_cart_items_cart_item")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .col(CartItems::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Requests::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Requests::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Requests::HotelId).uuid().not_null())
                        .col(ColumnDef::new(Requests::RoomId).uuid().not_null())
                        .col(ColumnDef::new(Requests::StayId).uuid().null())
                        .col(ColumnDef::new(Requests::Kind).string_len(10).not_null())
                        .col(
                            ColumnDef::new(Requests::Status)
                                .string_len(12)
                                .not_null()
                                .default("NEW"),
                        )
                        .col(ColumnDef::new(Requests::ServiceItemId).uuid().null())
                        .col(
                            ColumnDef::new(Requests::OpenServiceKey)
                                .string_len(120)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Requests::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Requests::Note)
                                .string_len(200)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Requests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Requests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Requests::AcceptedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Requests::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Requests::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Open SERVICE requests carry a key; closing a request clears it.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_requests_open_service_key")
                        .table(Requests::Table)
                        .col(Requests::OpenServiceKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_hotel_status_updated")
                        .table(Requests::Table)
                        .col(Requests::HotelId)
                        .col(Requests::Status)
                        .col(Requests::UpdatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_hotel_created")
                        .table(Requests::Table)
                        .col(Requests::HotelId)
                        .col(Requests::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_hotel_kind_status")
                        .table(Requests::Table)
                        .col(Requests::HotelId)
                        .col(Requests::Kind)
                        .col(Requests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_room_created")
                        .table(Requests::Table)
                        .col(Requests::HotelId)
                        .col(Requests::RoomId)
                        .col(Requests::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RequestLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestLines::RequestId).uuid().not_null())
                        .col(ColumnDef::new(RequestLines::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(RequestLines::NameSnapshot)
                                .string_len(120)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequestLines::PriceSnapshot)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(RequestLines::LineTotal)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_lines_request")
                                .from(RequestLines::Table, RequestLines::RequestId)
                                .to(Requests::Table, Requests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_request_lines_request_item")
                        .table(RequestLines::Table)
                        .col(RequestLines::RequestId)
                        .col(RequestLines::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequestLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Requests::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        HotelId,
        RoomId,
        StayId,
        Status,
        DraftKey,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        CartId,
        ItemId,
        Quantity,
        PriceSnapshot,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Requests {
        Table,
        Id,
        HotelId,
        RoomId,
        StayId,
        Kind,
        Status,
        ServiceItemId,
        OpenServiceKey,
        Subtotal,
        Note,
        CreatedAt,
        UpdatedAt,
        AcceptedAt,
        CompletedAt,
        CancelledAt,
    }

    #[derive(DeriveIden)]
    enum RequestLines {
        Table,
        Id,
        RequestId,
        ItemId,
        NameSnapshot,
        PriceSnapshot,
        Quantity,
        LineTotal,
    }
}

pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_and_revert_on_sqlite() {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        let applied = Migrator::get_applied_migrations(&db).await.unwrap();
        assert_eq!(applied.len(), 2);

        Migrator::down(&db, None).await.unwrap();
        assert!(Migrator::get_applied_migrations(&db).await.unwrap().is_empty());
    }
}
