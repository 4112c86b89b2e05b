//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartError, CartItem};
pub use order::{Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, StatusUpdate};
pub use product::Product;
pub use user::{Role, User};
