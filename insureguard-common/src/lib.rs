//! # InsureGuard Common Library
//!
//! Shared code for the InsureGuard binaries:
//! - Error type and result alias
//! - TOML configuration model and config-file discovery
//! - Storage root resolution
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
