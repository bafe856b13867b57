//! # gameinsights common library
//!
//! Shared code for the gameinsights workspace:
//! - Error type shared by configuration and startup code
//! - TOML configuration loading and config file resolution
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
