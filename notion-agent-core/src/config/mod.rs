//! Configuration management
//!
//! Handles loading and validation of notion-agent configuration from files
//! and environment variables.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::{expand_tilde, ConfigLoader};
pub use schema::*;
pub use validate::validate_config;
