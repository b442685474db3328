//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Domain models and closed enums

mod database;
mod models;

pub use database::{Database, PoolSettings};
pub use models::*;
