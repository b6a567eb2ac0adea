//! Database models split into domain-specific modules.

pub mod common;
pub mod finance;
pub mod owned;
pub mod patient;
pub mod session;
pub mod user;

pub use common::*;
pub use finance::*;
pub use owned::*;
pub use patient::*;
pub use session::*;
pub use user::*;
