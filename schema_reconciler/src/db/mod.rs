//! Database module
//!
//! This module handles the MySQL session and statement execution.

pub mod connection;
pub mod executor;

// Re-export key types
pub use connection::DatabaseConnection;
pub use executor::{execute_batch, SqlExecutor, SqlPrinter, StatementSink};
