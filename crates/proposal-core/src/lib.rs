//! Proposal Core: configuration, data directories, error types.

pub mod config;
pub mod error;

pub use config::{DataPaths, ProposalConfig, RebuildPolicy};
pub use error::{Error, Result};
