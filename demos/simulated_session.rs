//! Simulated variable-quality session
//!
//! Run with: cargo run --example simulated_session -- [OPTIONS]
//!
//! Drives a session backed by the in-memory pipeline: clients attach one
//! by one, then leave again, while quality follows the client count.
//! Point `--command-pipe` / `--status-pipe` at FIFOs to talk to it:
//!
//! ```text
//! cargo run --example simulated_session -- \
//!     --command-pipe /tmp/rtsp-control --status-pipe /tmp/rtsp-status
//!
//! cat /tmp/rtsp-status &
//! echo "status" > /tmp/rtsp-control
//! echo "setparam:enc0::bitrate:5000" > /tmp/rtsp-control
//! echo "printbin" > /tmp/rtsp-control
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use variable_rtsp::{MemoryPipeline, Server, ServerConfig, SessionConfig};

#[derive(Debug, Parser)]
#[command(name = "simulated_session")]
#[command(about = "Client-count driven quality control over a simulated pipeline")]
#[command(version)]
struct Args {
    /// Debug level, used when RUST_LOG is unset (0 = info, 1 = debug, 2+ = trace)
    #[arg(long, short = 'd', default_value_t = 0)]
    debug: u8,

    /// Input device handed to the source element
    #[arg(long, short = 'i', default_value = "/dev/video0")]
    video_in: String,

    /// Enable variable quality, 0 = off, 1 = on
    #[arg(long, short = 'e', default_value_t = 1)]
    enable_variable_mode: u8,

    /// Steps to get to the worst quality
    #[arg(long, default_value_t = 5)]
    steps: u32,

    /// Min bitrate cap in kbps
    #[arg(long, default_value_t = 1)]
    min_bitrate: u32,

    /// Max bitrate cap in kbps, 0 scales quant-param instead
    #[arg(long, short = 'b', default_value_t = 10_000)]
    max_bitrate: u32,

    /// Min quant-level cap
    #[arg(long, short = 'l', default_value_t = 0)]
    min_quant_lvl: u32,

    /// Max quant-level cap
    #[arg(long, default_value_t = 51)]
    max_quant_lvl: u32,

    /// Interval to send rtp config
    #[arg(long, short = 'c', default_value_t = 2)]
    config_interval: i32,

    /// Interval between IDR frames
    #[arg(long, short = 'a', default_value_t = 0)]
    idr: u32,

    /// Seconds between periodic reports, 0 disables
    #[arg(long, short = 'r', default_value_t = 5)]
    msg_rate: u64,

    /// Pipe for property commands
    #[arg(long)]
    command_pipe: Option<PathBuf>,

    /// Pipe for command status replies
    #[arg(long)]
    status_pipe: Option<PathBuf>,

    /// Clients to simulate
    #[arg(long, default_value_t = 4)]
    clients: u32,

    /// Seconds between simulated client events
    #[arg(long, default_value_t = 2)]
    interval: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let session = SessionConfig::default()
            .video_device(self.video_in.as_str())
            .variable_mode(self.enable_variable_mode != 0)
            .requested_steps(self.steps)
            .max_bitrate(self.max_bitrate)
            .min_bitrate(self.min_bitrate)
            .min_quant(self.min_quant_lvl)
            .max_quant(self.max_quant_lvl)
            .config_interval(self.config_interval)
            .idr_interval(self.idr)
            .status_interval(Duration::from_secs(self.msg_rate));

        let mut config = ServerConfig::with_session(session);
        if let Some(path) = &self.command_pipe {
            config = config.command_pipe(path);
        }
        if let Some(path) = &self.status_pipe {
            config = config.status_pipe(path);
        }
        config
    }

    fn default_filter(&self) -> &'static str {
        match self.debug {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut server = match Server::new(args.server_config()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let handle = server.handle();
    let clients = args.clients.max(1);
    let pause = Duration::from_secs(args.interval);

    let simulation = tokio::spawn(async move {
        let pipeline = Arc::new(MemoryPipeline::default_launch());

        handle.client_attached().await?;
        handle.pipeline_ready(pipeline).await?;

        for _ in 1..clients {
            tokio::time::sleep(pause).await;
            handle.client_attached().await?;
        }

        for _ in 0..clients {
            tokio::time::sleep(pause).await;
            handle.client_detached().await?;
        }

        tokio::time::sleep(pause).await;
        Ok::<_, variable_rtsp::Error>(())
    });

    let shutdown = async {
        tokio::select! {
            _ = simulation => println!("Simulation finished"),
            _ = tokio::signal::ctrl_c() => println!("\nShutting down..."),
        }
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
