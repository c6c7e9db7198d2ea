// Guest-facing ordering
pub mod cart;
pub mod catalog;
pub mod duplicate_guard;
pub mod requests;

// Request status machine and the staff board built on it
pub mod live_board;
pub mod request_status;

// Fixed-point money helpers
pub mod money;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use duplicate_guard::DuplicateRequestGuard;
pub use live_board::LiveBoardService;
pub use requests::RequestService;
