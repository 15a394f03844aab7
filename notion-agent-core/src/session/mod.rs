//! Session management for conversation history
//!
//! A session is addressed by the `(app_name, user_id, session_id)` triple and
//! holds the ordered events of one conversation. Storage sits behind the
//! [`SessionService`] trait; [`InMemorySessionService`] keeps everything in
//! process memory for the lifetime of the run.

pub mod event;
pub mod service;
pub mod store;

pub use event::Event;
pub use service::{InMemorySessionService, SessionService};
pub use store::{Session, SessionKey};
