//! Repository implementations for database operations

pub mod alerts;
pub mod users;

pub use alerts::*;
pub use users::*;
