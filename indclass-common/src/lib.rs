//! # Industry Classifier Common Library
//!
//! Shared code for the classifier service and its tools:
//! - Industry code reference model
//! - Code store trait with SQLite and in-memory implementations
//! - Request context (cancellation and deadline)
//! - Configuration loading
//! - Reference data seeding

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod seed;
pub mod store;

pub use context::RequestContext;
pub use db::models::{CodeStats, CodeType, IndustryCode, TypeStats};
pub use error::{Error, Result};
pub use store::{CodeStore, MemoryCodeStore};
