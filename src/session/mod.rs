//! Shared session management
//!
//! One session serves every attached client. [`SessionController`] reacts
//! to lifecycle events and commands, [`SessionState`] tracks the phase and
//! bound elements, and [`SessionConfig`] holds the startup bounds.

pub mod config;
pub mod controller;
pub mod state;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionEvent, StatusSource};
pub use state::{ElementSlots, SessionPhase, SessionState};
