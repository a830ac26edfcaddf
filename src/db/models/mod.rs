//! Database models split into domain-specific modules.

pub mod category;
pub mod common;
pub mod invoice;
pub mod product;
pub mod request;
pub mod stored_file;
pub mod supplier;
pub mod user;

pub use category::*;
pub use common::*;
pub use invoice::*;
pub use product::*;
pub use request::*;
pub use stored_file::*;
pub use supplier::*;
pub use user::*;
