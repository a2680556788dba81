//! Stored jobs are grouped by combinability key in a SQLite database

/// Connect to a SQLite database
pub mod open;
/// Load, append and wipe the persisted job groups
pub mod store;
