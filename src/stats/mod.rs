//! Session statistics

pub mod metrics;

pub use metrics::{SessionReport, SessionStats};
