//! Error types
//!
//! Configuration errors are fatal at startup and surface through [`Error`].
//! Protocol and pipeline errors stay local: the offending line or operation
//! is dropped and the session keeps running.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Invalid session configuration
    Config(ConfigError),
    /// Pipe or file I/O failure
    Io(io::Error),
    /// The session loop is no longer receiving events
    SessionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::SessionClosed => write!(f, "Session loop closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::SessionClosed => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Rejected session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Max quant level below min quant level
    QuantRange { min: u32, max: u32 },
    /// Max bitrate below min bitrate
    BitrateRange { min: u32, max: u32 },
    /// Fewer than one step between the quality bounds
    Steps(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::QuantRange { min, max } => write!(
                f,
                "max quant level ({}) must be greater than min quant level ({})",
                max, min
            ),
            ConfigError::BitrateRange { min, max } => write!(
                f,
                "max bitrate ({}) must be greater than min bitrate ({})",
                max, min
            ),
            // Users count quality levels, the model counts the gaps between them
            ConfigError::Steps(_) => write!(f, "steps must be 2 or greater"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Malformed command-pipe input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line grew past the line buffer before a newline arrived
    LineTooLong { limit: usize },
    /// Line is not valid UTF-8
    InvalidUtf8,
    /// A single field exceeds the field limit
    FieldTooLong { index: usize, limit: usize },
    /// Action needs more `:`-delimited fields than were given
    MissingFields {
        action: String,
        required: usize,
        found: usize,
    },
    /// Action keyword is not recognised
    UnknownAction(String),
    /// Nothing but delimiters
    EmptyCommand,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::LineTooLong { limit } => {
                write!(f, "command line exceeds {} bytes", limit)
            }
            ProtocolError::InvalidUtf8 => write!(f, "command line is not valid UTF-8"),
            ProtocolError::FieldTooLong { index, limit } => {
                write!(f, "field {} exceeds {} bytes", index, limit)
            }
            ProtocolError::MissingFields {
                action,
                required,
                found,
            } => write!(
                f,
                "not enough values for {}: need {} delimiters, got {}",
                action, required, found
            ),
            ProtocolError::UnknownAction(action) => write!(f, "undefined action [{}]", action),
            ProtocolError::EmptyCommand => write!(f, "empty command"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Failure to reach or modify a pipeline object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No element with this name in the pipeline
    ElementNotFound(String),
    /// Element has no pad with this name
    PadNotFound { element: String, pad: String },
    /// Object has no property with this name
    PropertyNotFound(String),
    /// Property exists but cannot be written
    PropertyNotWritable(String),
    /// Value cannot be converted to the property's kind
    InvalidValue { property: String, value: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ElementNotFound(name) => write!(f, "element not found: {}", name),
            PipelineError::PadNotFound { element, pad } => {
                write!(f, "pad not found: {}.{}", element, pad)
            }
            PipelineError::PropertyNotFound(name) => write!(f, "property not found: {}", name),
            PipelineError::PropertyNotWritable(name) => {
                write!(f, "property not writable: {}", name)
            }
            PipelineError::InvalidValue { property, value } => {
                write!(f, "invalid value for {}: {}", property, value)
            }
        }
    }
}

impl std::error::Error for PipelineError {}
