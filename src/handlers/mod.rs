pub mod common;
pub mod guest;
pub mod live_board;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{DbPool, RowLocks};
use crate::services::{
    live_board::BoardSettings, CartService, CatalogService, DuplicateRequestGuard,
    LiveBoardService, RequestService,
};
use crate::views::Views;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub requests: Arc<RequestService>,
    pub duplicate_guard: Arc<DuplicateRequestGuard>,
    pub live_board: Arc<LiveBoardService>,
    pub views: Views,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Result<Self, tera::Error> {
        let locks = RowLocks::new();
        let requests = RequestService::new(db_pool.clone(), locks, config.guest_summary_limit);
        let live_board = LiveBoardService::new(
            db_pool.clone(),
            requests.clone(),
            BoardSettings::from(config),
        );

        Ok(Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool.clone())),
            requests: Arc::new(requests),
            duplicate_guard: Arc::new(DuplicateRequestGuard::new(db_pool)),
            live_board: Arc::new(live_board),
            views: Views::new()?,
        })
    }
}
