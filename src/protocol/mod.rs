//! Command/status protocol spoken over the IPC pipes

pub mod command;
pub mod status;

pub use command::{Command, CommandFields, LineFramer, SetParam, MAX_LINE_LEN};
pub use status::{StatusKind, StatusMessage};
