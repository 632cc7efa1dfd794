//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Database: SQLite record stores
//! - Adapters: Transport integrations (console)

pub mod config;
pub mod database;
pub mod adapters;
