//! Subcommand implementations

pub mod baseline;
pub mod check;
pub mod report;
