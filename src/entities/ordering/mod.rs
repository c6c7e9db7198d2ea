/// Tables written by the ordering core: draft carts, submitted requests and their lines.
pub mod cart;
pub mod cart_item;
pub mod request;
pub mod request_line;

// Re-export entities
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use request::{Entity as Request, Model as RequestModel, RequestKind, RequestStatus};
pub use request_line::{Entity as RequestLine, Model as RequestLineModel};
