//! Merge stored job groups into fewer combined jobs

/// Split one job group into time-balanced partitions
pub mod partition;
/// Merge one partition into a single combined job plus its script body
pub mod merge;
/// Write combined jobs to disk and optionally dispatch them
pub mod emit;
