//! Domain models for the storefront.
//!
//! Catalog entities are read-only here; carts, orders and AI sessions are
//! owned documents keyed by [`fastspot_core::OwnerKey`].

pub mod cart;
pub mod catalog;
pub mod mood;
pub mod order;

pub use cart::{Cart, CartLine, CartView};
pub use catalog::{
    Category, Ingredient, OptionChoice, OptionKind, Product, ProductOption, Promotion,
};
pub use mood::{AiSession, MoodAnswer, MoodQuestion, QuestionOption};
pub use order::{
    CustomerInfo, Delivery, DeliveryAddress, Order, OrderItem, Payment, TrackingEvent,
};
