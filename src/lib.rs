//! Client-count driven quality control for a shared live media session
//!
//! A single encoded stream is shared by every attached client. As clients
//! join, encoder quality steps down (quant level up, or bitrate down);
//! as they leave it steps back up. External tools observe and tune the
//! session over two named pipes:
//!
//! ```text
//!  command pipe ──► CommandChannel ──► SessionController ──► StatusChannel ──► status pipe
//!                                          ▲      │
//!  media side ──► SessionHandle ──events───┘      └──► Pipeline elements
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use variable_rtsp::{MemoryPipeline, Server, ServerConfig, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> variable_rtsp::Result<()> {
//!     let config = ServerConfig::with_session(SessionConfig::default().max_bitrate(0))
//!         .command_pipe("/tmp/variable-rtsp.ctl")
//!         .status_pipe("/tmp/variable-rtsp.status");
//!
//!     let mut server = Server::new(config)?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         handle.client_attached().await?;
//!         handle
//!             .pipeline_ready(Arc::new(MemoryPipeline::default_launch()))
//!             .await
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod ipc;
pub mod pipeline;
pub mod protocol;
pub mod quality;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{ConfigError, Error, PipelineError, ProtocolError, Result};
pub use ipc::{CommandChannel, StatusChannel, StatusSink};
pub use pipeline::{Element, MemoryElement, MemoryPad, MemoryPipeline, Pad, Pipeline};
pub use protocol::{Command, StatusKind, StatusMessage};
pub use quality::{QualityState, ScalingMode};
pub use server::{Server, ServerConfig, SessionHandle};
pub use session::{SessionConfig, SessionController, SessionEvent, SessionPhase};
pub use stats::{SessionReport, SessionStats};
