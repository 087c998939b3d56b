//! Database models split into domain-specific modules.

pub mod audit;
pub mod center;
pub mod claim;
pub mod user;

pub use audit::*;
pub use center::*;
pub use claim::*;
pub use user::*;
