//! Canonical jobs parsed from heterogeneous submission scripts

/// Job type, resource parameters and combinability grouping
pub mod script;
/// Turn one submission-script file into a Job
pub mod parse;
/// Render a Job back into a directive header block
pub mod render;
