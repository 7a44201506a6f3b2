//! Session event loop
//!
//! One task owns the controller and serializes everything that touches
//! it: session events from the media side, command-pipe polls and the
//! periodic status report.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::error::{Error, Result};
use crate::ipc::{self, CommandChannel, StatusChannel, StatusSink};
use crate::pipeline::Pipeline;
use crate::server::config::ServerConfig;
use crate::session::{SessionController, SessionEvent};

/// Cloneable handle for feeding session events into a running server
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Queue an event, waiting if the queue is full
    pub async fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::SessionClosed)
    }

    pub async fn client_attached(&self) -> Result<()> {
        self.send(SessionEvent::ClientAttached).await
    }

    pub async fn client_detached(&self) -> Result<()> {
        self.send(SessionEvent::ClientDetached).await
    }

    pub async fn pipeline_ready(&self, pipeline: Arc<dyn Pipeline>) -> Result<()> {
        self.send(SessionEvent::PipelineReady(pipeline)).await
    }
}

/// Session server
pub struct Server<S: StatusSink = StatusChannel> {
    config: ServerConfig,
    controller: SessionController<S>,
    commands: Option<CommandChannel>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl Server<StatusChannel> {
    /// Create a server writing status to the configured pipe
    ///
    /// The status FIFO is created here but only opened on the first
    /// message. A command pipe that cannot be opened is fatal.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        if let Some(path) = &config.status_pipe {
            if let Err(e) = ipc::create_fifo(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to create status pipe");
            }
        }

        let sink = StatusChannel::new(config.status_pipe.clone());
        Self::with_sink(config, sink)
    }
}

impl<S: StatusSink> Server<S> {
    /// Create a server with a custom status sink
    pub fn with_sink(config: ServerConfig, sink: S) -> Result<Self> {
        let controller = SessionController::new(config.session.clone(), sink)?;

        let commands = match &config.command_pipe {
            Some(path) => Some(CommandChannel::open(path)?),
            None => None,
        };

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);

        Ok(Self {
            config,
            controller,
            commands,
            events_tx,
            events_rx,
        })
    }

    /// Handle for delivering session events
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn controller(&self) -> &SessionController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionController<S> {
        &mut self.controller
    }

    /// Run the server
    ///
    /// This method never returns unless the loop fails.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            controller,
            commands,
            events_rx,
            ..
        } = self;

        if let Some(channel) = commands.as_ref() {
            tracing::info!(path = %channel.path().display(), "Listening for commands");
        }

        let mut poll = time::interval(config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let report_period = controller.config().status_interval;
        let mut report: Option<Interval> = None;

        tokio::pin!(shutdown);

        loop {
            sync_report_timer(&mut report, controller.is_connected(), report_period);

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(event) => controller.handle_event(event),
                    None => break,
                },
                _ = poll.tick() => {
                    if let Some(channel) = commands.as_mut() {
                        for input in channel.poll() {
                            controller.handle_input(input);
                        }
                    }
                }
                _ = next_report(&mut report) => {
                    if let Some(report) = controller.periodic_report() {
                        report.log();
                    }
                }
            }
        }

        Ok(())
    }
}

/// Start or stop the report timer to match the session
fn sync_report_timer(report: &mut Option<Interval>, connected: bool, period: Duration) {
    let wanted = connected && !period.is_zero();

    match (wanted, report.is_some()) {
        (true, false) => {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            *report = Some(interval);
            tracing::debug!(period_secs = period.as_secs_f64(), "Status timer started");
        }
        (false, true) => {
            *report = None;
            tracing::debug!("Status timer stopped");
        }
        _ => {}
    }
}

async fn next_report(report: &mut Option<Interval>) {
    match report {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
