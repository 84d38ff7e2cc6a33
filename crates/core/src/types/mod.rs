//! Domain value types shared by every FastSpot component.

pub mod email;
pub mod id;
pub mod owner;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use owner::OwnerKey;
pub use price::{CurrencyCode, Price};
pub use status::*;
