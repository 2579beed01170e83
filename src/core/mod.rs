//! Core modules shared by every registry surface: errors, configuration,
//! logging, SQLite plumbing, the audit broker, and the store seam.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod memory_store;
pub mod pool;
pub mod schemas;
pub mod sqlite_store;
pub mod store;
pub mod time;
