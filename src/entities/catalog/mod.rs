/// Reference tables owned by the hotel administration side (tenants, rooms, stays, catalog).
/// The ordering core only reads them.
pub mod category;
pub mod hotel;
pub mod item;
pub mod room;
pub mod stay;

// Re-export entities
pub use category::{CategoryKind, Entity as Category, Model as CategoryModel};
pub use hotel::{Entity as Hotel, HotelStatus, Model as HotelModel};
pub use item::{Entity as Item, Model as ItemModel};
pub use room::{Entity as Room, Model as RoomModel};
pub use stay::{Entity as Stay, Model as StayModel, StayStatus};
