//! Named-pipe transport
//!
//! Two independent byte channels:
//!
//! - the command pipe, read without blocking on every poll tick;
//! - the status pipe, opened for writing on first use. Opening a FIFO
//!   write-only blocks until a reader attaches, so it is never done at
//!   startup. When it cannot be opened, status output falls back to
//!   standard output for the rest of the process lifetime.

pub mod command_pipe;
pub mod status_pipe;

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::protocol::StatusMessage;

pub use command_pipe::CommandChannel;
pub use status_pipe::StatusChannel;

/// Permission bits for created FIFOs
const FIFO_MODE: libc::mode_t = 0o666;

/// Destination for status messages
pub trait StatusSink: Send {
    /// Deliver one message; delivery problems are handled by the sink
    fn send(&mut self, message: &StatusMessage);
}

/// Collects messages in memory
impl StatusSink for Vec<StatusMessage> {
    fn send(&mut self, message: &StatusMessage) {
        self.push(message.clone());
    }
}

/// Create a FIFO at `path` unless something already exists there
pub fn create_fifo(path: &Path) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) };
    if rc == 0 {
        tracing::debug!(path = %path.display(), "Created FIFO");
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::AlreadyExists {
        return Ok(());
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusKind;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_create_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control");

        create_fifo(&path).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());

        // Existing path is left alone
        create_fifo(&path).unwrap();
    }

    #[test]
    fn test_create_fifo_keeps_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        std::fs::write(&path, b"").unwrap();

        create_fifo(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().is_file());
    }

    #[test]
    fn test_create_fifo_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("control");

        assert!(create_fifo(&path).is_err());
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<StatusMessage> = Vec::new();
        sink.send(&StatusMessage::new(StatusKind::Status));

        assert_eq!(sink.len(), 1);
    }
}
