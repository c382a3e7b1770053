// ABOUTME: Library root for carbon-copy
// ABOUTME: Clones production RDS instances into sanitized development copies and dumps them

pub mod config;
pub mod dump;
pub mod error;
pub mod mysql;
pub mod provision;
pub mod rds;
pub mod wait;
pub mod whitelist;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CarbonCopyError, DumpFailure};
