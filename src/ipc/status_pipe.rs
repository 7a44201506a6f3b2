//! Status pipe writer

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::protocol::StatusMessage;

use super::StatusSink;

#[derive(Debug)]
enum ChannelState {
    /// Path configured, not opened yet
    Unopened(PathBuf),
    /// Writing to the status pipe
    Open(File),
    /// Writing to the fallback stream, permanently
    Fallback,
}

/// Lazily opened status channel with a fallback stream
///
/// The fallback defaults to standard output and receives one
/// `status-reply: {...}` line per message.
#[derive(Debug)]
pub struct StatusChannel<W: Write + Send = io::Stdout> {
    state: ChannelState,
    fallback: W,
}

impl StatusChannel<io::Stdout> {
    /// Channel for `path`, or straight to standard output when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_fallback(path, io::stdout())
    }
}

impl<W: Write + Send> StatusChannel<W> {
    /// Channel with a custom fallback stream
    pub fn with_fallback(path: Option<PathBuf>, fallback: W) -> Self {
        let state = match path {
            Some(path) => ChannelState::Unopened(path),
            None => ChannelState::Fallback,
        };
        Self { state, fallback }
    }

    /// Whether the status pipe is open
    pub fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open(_))
    }

    /// Whether output has fallen back for good
    pub fn is_fallback(&self) -> bool {
        matches!(self.state, ChannelState::Fallback)
    }

    /// The fallback stream
    pub fn fallback(&self) -> &W {
        &self.fallback
    }

    /// Write one message, opening the pipe first if needed
    pub fn write_message(&mut self, message: &StatusMessage) -> io::Result<()> {
        if let ChannelState::Unopened(path) = &self.state {
            self.state = match open_writer(path) {
                Ok(file) => {
                    tracing::info!(path = %path.display(), "Status pipe opened");
                    ChannelState::Open(file)
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to open status pipe, falling back to stdout"
                    );
                    ChannelState::Fallback
                }
            };
        }

        match &mut self.state {
            ChannelState::Open(file) => {
                let encoded = message.encode();
                if let Err(e) = file.write_all(&encoded).and_then(|_| file.flush()) {
                    // Reader went away; the message still goes out on the fallback
                    tracing::warn!(error = %e, "Status pipe write failed, falling back to stdout");
                    self.state = ChannelState::Fallback;
                    return self.write_fallback(message);
                }
                Ok(())
            }
            _ => self.write_fallback(message),
        }
    }

    fn write_fallback(&mut self, message: &StatusMessage) -> io::Result<()> {
        self.fallback.write_all(message.fallback_line().as_bytes())?;
        self.fallback.flush()
    }
}

impl<W: Write + Send> StatusSink for StatusChannel<W> {
    fn send(&mut self, message: &StatusMessage) {
        if let Err(e) = self.write_message(message) {
            tracing::warn!(error = %e, kind = %message.kind(), "Status message dropped");
        }
    }
}

/// Open the status pipe write-only
///
/// Blocks until a reader has the FIFO open.
fn open_writer(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusKind;

    fn status(clients: u32) -> StatusMessage {
        let mut message = StatusMessage::new(StatusKind::Status);
        message.field("num_cli", clients);
        message
    }

    #[test]
    fn test_no_path_uses_fallback() {
        let mut channel = StatusChannel::with_fallback(None, Vec::new());
        assert!(channel.is_fallback());

        channel.write_message(&status(1)).unwrap();

        assert_eq!(channel.fallback(), b"status-reply: {num_cli:1}\n");
    }

    #[test]
    fn test_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        std::fs::write(&path, b"").unwrap();

        let mut channel = StatusChannel::with_fallback(Some(path.clone()), Vec::new());
        assert!(!channel.is_open());
        assert!(!channel.is_fallback());

        channel.write_message(&status(2)).unwrap();
        channel.write_message(&status(3)).unwrap();

        assert!(channel.is_open());
        assert!(channel.fallback().is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "msg{\ntype:status,\ndata:{\nnum_cli:2\n}}\nmsg{\ntype:status,\ndata:{\nnum_cli:3\n}}\n"
        );
    }

    #[test]
    fn test_open_failure_falls_back_for_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("status");

        let mut channel = StatusChannel::with_fallback(Some(path.clone()), Vec::new());
        channel.write_message(&status(1)).unwrap();
        assert!(channel.is_fallback());

        // The path appearing later changes nothing
        std::fs::create_dir(dir.path().join("missing")).unwrap();
        std::fs::write(&path, b"").unwrap();
        channel.write_message(&status(2)).unwrap();

        assert!(channel.is_fallback());
        assert!(std::fs::read(&path).unwrap().is_empty());
        assert_eq!(
            channel.fallback(),
            b"status-reply: {num_cli:1}\nstatus-reply: {num_cli:2}\n"
        );
    }

    #[test]
    fn test_write_failure_falls_back_for_good() {
        use std::io::Read;
        use std::os::unix::fs::OpenOptionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        crate::ipc::create_fifo(&path).unwrap();

        let mut reader = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .unwrap();

        let mut channel = StatusChannel::with_fallback(Some(path.clone()), Vec::new());
        channel.write_message(&status(1)).unwrap();
        assert!(channel.is_open());

        let expected = status(1).encode();
        let mut buf = vec![0u8; 256];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &expected[..]);

        // Reader leaves; the next write hits a broken pipe
        drop(reader);
        channel.write_message(&status(2)).unwrap();

        assert!(channel.is_fallback());
        assert_eq!(channel.fallback(), b"status-reply: {num_cli:2}\n");

        channel.write_message(&status(3)).unwrap();
        assert_eq!(
            channel.fallback(),
            b"status-reply: {num_cli:2}\nstatus-reply: {num_cli:3}\n"
        );
    }

    #[test]
    fn test_sink_swallows_errors() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "broken"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut channel = StatusChannel::with_fallback(None, Broken);
        assert!(channel.write_message(&status(1)).is_err());

        // Through the sink the failure is only logged
        channel.send(&status(1));
    }
}
