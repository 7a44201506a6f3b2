//! Command-pipe framing and parsing
//!
//! The pipe carries one command per line, fields separated by `:`:
//!
//! ```text
//! setparam:<element>:<pad or empty>:<property>:<number>
//! printbin
//! status
//! ```
//!
//! Lines are bounded. A line that outgrows the buffer is dropped whole,
//! never processed as a prefix.

use std::fmt;

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

/// Longest accepted command line, excluding the `\n` or `\r\n` ending
pub const MAX_LINE_LEN: usize = 255;

/// Longest accepted single field
pub const MAX_FIELD_LEN: usize = 255;

/// Fields a command line is split into
pub const FIELD_COUNT: usize = 5;

/// Field delimiter
pub const DELIMITER: char = ':';

/// Delimiters `setparam` needs to carry all five fields
const SETPARAM_DELIMITERS: usize = FIELD_COUNT - 1;

/// Splits a byte stream into bounded lines
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    /// Set while skipping the rest of an oversized line
    discarding: bool,
    limit: usize,
}

impl LineFramer {
    /// Create a framer with the default line limit
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_LEN)
    }

    /// Create a framer with a custom line limit
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit + 2),
            discarding: false,
            limit,
        }
    }

    /// Feed bytes, returning every line completed by them
    ///
    /// Empty lines are skipped. A partial trailing line stays buffered
    /// until its newline arrives.
    pub fn push(&mut self, mut data: &[u8]) -> Vec<Result<String, ProtocolError>> {
        let mut lines = Vec::new();

        while !data.is_empty() {
            match data.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.append(&data[..pos]);
                    data.advance(pos + 1);

                    if let Some(line) = self.finish_line() {
                        lines.push(line);
                    }
                }
                None => {
                    self.append(data);
                    data = &[];
                }
            }
        }

        lines
    }

    /// Bytes of the current unfinished line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn append(&mut self, chunk: &[u8]) {
        if self.discarding {
            return;
        }

        // One byte of headroom for the `\r` of a CRLF ending
        if self.buf.len() + chunk.len() > self.limit + 1 {
            self.buf.clear();
            self.discarding = true;
            return;
        }

        self.buf.extend_from_slice(chunk);
    }

    fn finish_line(&mut self) -> Option<Result<String, ProtocolError>> {
        if self.discarding {
            self.discarding = false;
            self.buf.clear();
            return Some(Err(ProtocolError::LineTooLong { limit: self.limit }));
        }

        let mut line = self.buf.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.limit {
            return Some(Err(ProtocolError::LineTooLong { limit: self.limit }));
        }
        if line.is_empty() {
            return None;
        }

        Some(String::from_utf8(line.to_vec()).map_err(|_| ProtocolError::InvalidUtf8))
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// A line split into its fixed fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFields {
    /// `action, element, pad, property, value`
    pub fields: [String; FIELD_COUNT],
    /// Delimiters seen on the line
    pub delimiters: usize,
    /// Characters dropped past the last field
    pub dropped: usize,
}

impl CommandFields {
    /// Split `line` on `:` into at most five fields
    ///
    /// Content past the fifth field is counted and dropped.
    pub fn split(line: &str) -> Result<Self, ProtocolError> {
        let mut parsed = CommandFields::default();

        for ch in line.chars() {
            if ch == DELIMITER {
                parsed.delimiters += 1;
                continue;
            }

            match parsed.fields.get_mut(parsed.delimiters) {
                Some(field) => {
                    if field.len() + ch.len_utf8() > MAX_FIELD_LEN {
                        return Err(ProtocolError::FieldTooLong {
                            index: parsed.delimiters,
                            limit: MAX_FIELD_LEN,
                        });
                    }
                    field.push(ch);
                }
                None => parsed.dropped += 1,
            }
        }

        Ok(parsed)
    }

    pub fn action(&self) -> &str {
        &self.fields[0]
    }
}

/// Arguments of `setparam`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParam {
    /// Element instance name
    pub element: String,
    /// Pad name, `None` to target the element itself
    pub pad: Option<String>,
    /// Property name
    pub property: String,
    /// Raw value text
    pub value: String,
}

impl SetParam {
    /// Value as the single numeric type commands carry
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }

    /// Pad name as written on the wire (empty for none)
    pub fn pad_name(&self) -> &str {
        self.pad.as_deref().unwrap_or("")
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a numeric property on an element or one of its pads
    SetParam(SetParam),
    /// Dump the properties of every element in the pipeline
    PrintBin,
    /// Report session state
    Status,
}

impl Command {
    /// Parse one line (without its newline)
    ///
    /// Action keywords are case-sensitive.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let CommandFields {
            fields,
            delimiters,
            dropped,
        } = CommandFields::split(line)?;

        if dropped > 0 {
            tracing::debug!(dropped = dropped, "Extra command fields ignored");
        }

        let [action, element, pad, property, value] = fields;
        match action.as_str() {
            "" => Err(ProtocolError::EmptyCommand),
            "setparam" => {
                if delimiters < SETPARAM_DELIMITERS {
                    return Err(ProtocolError::MissingFields {
                        action: "setparam".into(),
                        required: SETPARAM_DELIMITERS,
                        found: delimiters,
                    });
                }

                Ok(Command::SetParam(SetParam {
                    element,
                    pad: if pad.is_empty() { None } else { Some(pad) },
                    property,
                    value,
                }))
            }
            "printbin" => Ok(Command::PrintBin),
            "status" => Ok(Command::Status),
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }

    /// Action keyword
    pub fn action(&self) -> &'static str {
        match self {
            Command::SetParam(_) => "setparam",
            Command::PrintBin => "printbin",
            Command::Status => "status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetParam(p) => write!(
                f,
                "setparam:{}:{}:{}:{}",
                p.element,
                p.pad_name(),
                p.property,
                p.value
            ),
            other => f.write_str(other.action()),
        }
    }
}
