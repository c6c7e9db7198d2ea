pub mod catalog;
pub mod ordering;

// Flat module paths, e.g. `entities::request::RequestStatus`
pub use catalog::{category, hotel, item, room, stay};
pub use ordering::{cart, cart_item, request, request_line};
