//! Status messages
//!
//! One message per emission, delimited by braces and newlines so a reader
//! needs no length prefix:
//!
//! ```text
//! msg{
//! type:status,
//! data:{
//! num_cli:2,
//! connected:true
//! }}
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Session state snapshot
    Status,
    /// Property dump of one element
    ElementProps,
    /// Outcome of a `setparam` command
    SetParam,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Status => "status",
            StatusKind::ElementProps => "elementprops",
            StatusKind::SetParam => "setparam",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status message under construction
///
/// Built per reply and dropped after it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    kind: StatusKind,
    entries: Vec<String>,
}

impl StatusMessage {
    /// Create an empty message
    pub fn new(kind: StatusKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Append a `key:value` entry
    pub fn field(&mut self, key: &str, value: impl fmt::Display) -> &mut Self {
        self.entries.push(format!("{}:{}", key, value));
        self
    }

    /// Append a free-text entry
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.entries.push(text.into());
        self
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Value of the first `key:value` entry with this key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| {
            entry
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix(':'))
        })
    }

    /// Entries joined with `,\n`, no trailing separator
    pub fn payload(&self) -> String {
        self.entries.join(",\n")
    }

    /// Wire form for the status pipe
    pub fn encode(&self) -> Bytes {
        let payload = self.payload();
        let mut buf = BytesMut::with_capacity(payload.len() + 32);

        buf.put_slice(b"msg{\ntype:");
        buf.put_slice(self.kind.as_str().as_bytes());
        buf.put_slice(b",\ndata:{\n");
        buf.put_slice(payload.as_bytes());
        buf.put_slice(b"\n}}\n");

        buf.freeze()
    }

    /// Single-line form used when no status pipe is available
    pub fn fallback_line(&self) -> String {
        format!("status-reply: {{{}}}\n", self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_framing() {
        let mut message = StatusMessage::new(StatusKind::Status);
        message.field("num_cli", 2).field("connected", true);

        assert_eq!(
            &message.encode()[..],
            b"msg{\ntype:status,\ndata:{\nnum_cli:2,\nconnected:true\n}}\n"
        );
    }

    #[test]
    fn test_encode_empty_payload() {
        let message = StatusMessage::new(StatusKind::SetParam);

        assert_eq!(
            &message.encode()[..],
            b"msg{\ntype:setparam,\ndata:{\n\n}}\n"
        );
    }

    #[test]
    fn test_get_field() {
        let mut message = StatusMessage::new(StatusKind::Status);
        message
            .field("num_cli", 3)
            .field("num_cli_max", 9)
            .line("free text");

        assert_eq!(message.get("num_cli"), Some("3"));
        assert_eq!(message.get("num_cli_max"), Some("9"));
        assert_eq!(message.get("missing"), None);
        assert_eq!(message.entries().len(), 3);
    }

    #[test]
    fn test_fallback_line() {
        let mut message = StatusMessage::new(StatusKind::SetParam);
        message.line("enc0::bitrate:5000:ok");

        assert_eq!(
            message.fallback_line(),
            "status-reply: {enc0::bitrate:5000:ok}\n"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(StatusKind::Status.to_string(), "status");
        assert_eq!(StatusKind::ElementProps.to_string(), "elementprops");
        assert_eq!(StatusKind::SetParam.to_string(), "setparam");
    }
}
