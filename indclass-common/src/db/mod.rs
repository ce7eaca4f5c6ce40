//! Database models and queries

pub mod models;

#[cfg(feature = "sqlx")]
pub mod codes;
#[cfg(feature = "sqlx")]
pub mod init;

pub use models::*;

#[cfg(feature = "sqlx")]
pub use codes::SqliteCodeStore;
#[cfg(feature = "sqlx")]
pub use init::*;
