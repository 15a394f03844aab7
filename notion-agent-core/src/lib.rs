//! Core types and traits for notion-agent
//!
//! This crate provides the error type, configuration, logging setup,
//! the conversation content model and the session service shared by
//! every other notion-agent crate.

pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod session;

pub use content::{Content, Part, Role};
pub use error::{Error, Result};
pub use session::{Event, InMemorySessionService, Session, SessionKey, SessionService};
