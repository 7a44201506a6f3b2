//! Command pipe reader

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::ProtocolError;
use crate::protocol::{Command, LineFramer};

/// Read chunk size for one `read` call
const READ_CHUNK: usize = 512;

/// Non-blocking reader for the command pipe
#[derive(Debug)]
pub struct CommandChannel {
    path: PathBuf,
    file: File,
    framer: LineFramer,
}

impl CommandChannel {
    /// Create the FIFO if needed and open it read-only, non-blocking
    ///
    /// Opening the read end of a FIFO non-blocking succeeds without a
    /// writer, so this never stalls startup.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        super::create_fifo(path)?;

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        tracing::info!(path = %path.display(), "Command pipe opened");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            framer: LineFramer::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain everything readable right now and parse complete lines
    ///
    /// Stops at "would block" or end of input (no writer attached). A
    /// partial line stays buffered for the next poll.
    pub fn poll(&mut self) -> Vec<Result<Command, ProtocolError>> {
        let mut commands = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    for line in self.framer.push(&chunk[..n]) {
                        commands.push(line.and_then(|line| {
                            tracing::trace!(command = %line, "Command received");
                            Command::parse(&line)
                        }));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Command pipe read failed");
                    break;
                }
            }
        }

        commands
    }
}
