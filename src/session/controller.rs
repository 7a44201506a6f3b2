//! Session controller
//!
//! Owns the session state and reacts to one event at a time: lifecycle
//! events from the media side and parsed commands from the command pipe.
//! Every reply and status broadcast goes to a single [`StatusSink`].

use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, PipelineError, ProtocolError};
use crate::ipc::StatusSink;
use crate::pipeline::{
    describe_element, format_value, Element, Pipeline, PropertyValue, ENCODER_ELEMENT,
    PAYLOADER_ELEMENT, SOURCE_ELEMENT,
};
use crate::protocol::{Command, SetParam, StatusKind, StatusMessage};
use crate::quality::{step_factor, QualityState, ScalingMode};
use crate::session::config::SessionConfig;
use crate::session::state::{ElementSlots, SessionPhase, SessionState};
use crate::stats::{SessionReport, SessionStats};

/// Lifecycle event delivered to the controller
pub enum SessionEvent {
    /// A client joined the shared stream
    ClientAttached,
    /// A client left the shared stream
    ClientDetached,
    /// The media pipeline for the session exists and can be configured
    PipelineReady(Arc<dyn Pipeline>),
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::ClientAttached => f.write_str("ClientAttached"),
            SessionEvent::ClientDetached => f.write_str("ClientDetached"),
            SessionEvent::PipelineReady(_) => f.write_str("PipelineReady"),
        }
    }
}

/// What triggered a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    ClientAttached,
    ClientDetached,
    StatusCommand,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSource::ClientAttached => "client-attached",
            StatusSource::ClientDetached => "client-detached",
            StatusSource::StatusCommand => "status-command",
        }
    }
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `setparam` did not take effect
#[derive(Debug)]
enum Rejection {
    NotStreaming,
    InvalidValue,
    Pipeline(PipelineError),
}

impl Rejection {
    fn reply(&self) -> &'static str {
        match self {
            Rejection::NotStreaming => "not streaming",
            Rejection::InvalidValue => "invalid value",
            Rejection::Pipeline(PipelineError::ElementNotFound(_)) => "element not found",
            Rejection::Pipeline(PipelineError::PadNotFound { .. }) => "pad not found",
            Rejection::Pipeline(PipelineError::InvalidValue { .. }) => "invalid value",
            Rejection::Pipeline(_) => "property error",
        }
    }
}

impl From<PipelineError> for Rejection {
    fn from(e: PipelineError) -> Self {
        Rejection::Pipeline(e)
    }
}

/// Drives the shared session
pub struct SessionController<S: StatusSink> {
    config: SessionConfig,
    state: SessionState,
    stats: SessionStats,
    sink: S,
}

impl<S: StatusSink> SessionController<S> {
    /// Create a controller for a validated configuration
    pub fn new(config: SessionConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            state: SessionState::new(&config),
            config,
            stats: SessionStats::new(),
            sink,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// True while at least one client is attached
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Dispatch a lifecycle event
    pub fn handle_event(&mut self, event: SessionEvent) {
        tracing::trace!(event = ?event, "Session event");

        match event {
            SessionEvent::ClientAttached => self.on_client_attached(),
            SessionEvent::ClientDetached => self.on_client_detached(),
            SessionEvent::PipelineReady(pipeline) => self.on_pipeline_ready(pipeline),
        }
    }

    pub fn on_client_attached(&mut self) {
        let clients = self.state.attach_client();
        self.stats.clients_attached += 1;

        if clients == 1 {
            self.stats.sessions += 1;
            self.state.quality = QualityState::initial(&self.config);
            tracing::info!(cycle = self.state.cycles, "First client attached, configuring pipeline");
        } else {
            tracing::info!(clients = clients, "Client attached");
        }

        if self.config.variable_mode {
            self.adapt_quality();
        }

        self.send_status(StatusSource::ClientAttached);
    }

    pub fn on_client_detached(&mut self) {
        let Some(clients) = self.state.detach_client() else {
            tracing::warn!("Client detached while no client was attached");
            return;
        };
        self.stats.clients_detached += 1;
        tracing::info!(clients = clients, "Client detached");

        if clients == 0 {
            self.teardown();
            self.send_status(StatusSource::ClientDetached);
        } else if self.config.variable_mode {
            self.adapt_quality();
        }
    }

    /// Bind the session elements and apply the starting properties
    ///
    /// Missing elements are logged and leave their slot empty. Ignored
    /// unless the session is waiting for its pipeline.
    pub fn on_pipeline_ready(&mut self, pipeline: Arc<dyn Pipeline>) {
        if self.state.phase != SessionPhase::Configuring {
            tracing::warn!(phase = %self.state.phase, "Pipeline ready outside configuration, ignored");
            return;
        }

        let slots = ElementSlots {
            source: lookup(pipeline.as_ref(), SOURCE_ELEMENT),
            encoder: lookup(pipeline.as_ref(), ENCODER_ELEMENT),
            payloader: lookup(pipeline.as_ref(), PAYLOADER_ELEMENT),
            pipeline: Some(pipeline),
        };

        self.configure(&slots);

        if self.state.bind(slots) {
            tracing::info!(clients = self.state.clients, "Pipeline ready, session active");
        }
    }

    /// Handle one line from the command pipe
    pub fn handle_input(&mut self, input: Result<Command, ProtocolError>) {
        match input {
            Ok(command) => self.handle_command(command),
            Err(e) => {
                self.stats.commands_rejected += 1;
                tracing::warn!(error = %e, "Command rejected");
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) {
        tracing::debug!(command = %command, "Dispatching command");
        self.stats.commands_handled += 1;

        match command {
            Command::SetParam(param) => self.set_param(&param),
            Command::PrintBin => self.print_bin(),
            Command::Status => self.send_status(StatusSource::StatusCommand),
        }
    }

    /// Session snapshot as a `status` message
    pub fn status_message(&self, source: StatusSource) -> StatusMessage {
        let config = &self.config;
        let mut message = StatusMessage::new(StatusKind::Status);

        message
            .field("source", source)
            .field("num_cli", self.state.clients)
            .field("connected", self.state.is_connected())
            .field("config_interval", config.config_interval)
            .field("idr", config.idr_interval)
            .field("enable_variable_mode", config.variable_mode);

        if config.variable_mode {
            message
                .field("steps", config.steps)
                .field("curr_quant_lvl", self.state.quality.quant)
                .field("min_quant_lvl", config.min_quant)
                .field("max_quant_lvl", config.max_quant)
                .field("curr_bitrate", self.state.quality.bitrate)
                .field("min_bitrate", config.min_bitrate)
                .field("max_bitrate", config.max_bitrate);
        }

        message.field("periodic_msg_rate", config.status_interval.as_secs());
        message
    }

    /// Report for the periodic status tick, `None` while idle
    pub fn periodic_report(&self) -> Option<SessionReport> {
        if !self.state.is_connected() {
            return None;
        }

        let config = &self.config;
        let mode = config.scaling_mode();
        let step = match mode {
            ScalingMode::Quant => step_factor(config.min_quant, config.max_quant, config.steps),
            ScalingMode::Bitrate => {
                step_factor(config.min_bitrate, config.max_bitrate, config.steps)
            }
        };

        let payloader_stats = self
            .state
            .payloader()
            .and_then(|payloader| payloader.property("stats"))
            .and_then(|value| match value {
                PropertyValue::String(text) => text,
                other => format_value(&other),
            });

        Some(SessionReport {
            clients: self.state.clients,
            phase: self.state.phase,
            mode,
            level: self.state.quality.value(mode),
            quant: self.state.quality.quant,
            bitrate: self.state.quality.bitrate,
            step_factor: step,
            payloader_stats,
            uptime: self.state.uptime(),
            stats: self.stats.clone(),
        })
    }

    /// Recompute the active knob and push it to the encoder if it moved
    ///
    /// Without a bound encoder the new value is only stored; it is applied
    /// when the pipeline becomes ready.
    fn adapt_quality(&mut self) {
        let clients = self.state.clients;
        let Some(change) = self.state.quality.adapt(clients, &self.config) else {
            return;
        };

        tracing::info!(
            clients = clients,
            property = change.mode.property_name(),
            from = change.from,
            to = change.to,
            "Quality adapted"
        );

        let Some(encoder) = self.state.encoder() else {
            tracing::debug!("Encoder not bound yet, deferring quality change");
            return;
        };

        match encoder.set_property_f64(change.mode.property_name(), f64::from(change.to)) {
            Ok(()) => self.stats.quality_changes += 1,
            Err(e) => tracing::warn!(error = %e, "Failed to apply quality change"),
        }
    }

    fn configure(&self, slots: &ElementSlots) {
        if let Some(source) = &slots.source {
            tracing::info!(device = %self.config.video_device, "Setting input device");
            set_logged(
                source.as_ref(),
                "device",
                PropertyValue::string(self.config.video_device.as_str()),
            );
        }

        if let Some(encoder) = &slots.encoder {
            if self.config.variable_mode {
                let quality = self.state.quality;
                tracing::info!(
                    bitrate = quality.bitrate,
                    quant = quality.quant,
                    idr = self.config.idr_interval,
                    "Setting encoder properties"
                );
                set_logged(encoder.as_ref(), "bitrate", PropertyValue::UInt(quality.bitrate));
                set_logged(encoder.as_ref(), "quant-param", PropertyValue::UInt(quality.quant));
                set_logged(
                    encoder.as_ref(),
                    "idr-interval",
                    PropertyValue::UInt(self.config.idr_interval),
                );
            } else {
                tracing::debug!("Variable mode off, encoder left untouched");
            }
        }

        if let Some(payloader) = &slots.payloader {
            tracing::info!(config_interval = self.config.config_interval, "Setting rtp config-interval");
            set_logged(
                payloader.as_ref(),
                "config-interval",
                PropertyValue::Int(self.config.config_interval),
            );
        }
    }

    /// Stop the pipeline and release every handle
    fn teardown(&mut self) {
        let uptime = self.state.uptime();

        match self.state.release() {
            Some(slots) => {
                if let Some(pipeline) = &slots.pipeline {
                    pipeline.stop();
                }
                tracing::info!(
                    session_secs = uptime.map(|d| d.as_secs()).unwrap_or(0),
                    "Last client left, session idle"
                );
            }
            None => tracing::debug!("Session already idle"),
        }
    }

    fn set_param(&mut self, param: &SetParam) {
        let result = match self.apply_set_param(param) {
            Ok(()) => {
                tracing::info!(
                    element = %param.element,
                    pad = %param.pad_name(),
                    property = %param.property,
                    value = %param.value,
                    "Property set"
                );
                "ok"
            }
            Err(rejection) => {
                tracing::warn!(
                    element = %param.element,
                    pad = %param.pad_name(),
                    property = %param.property,
                    value = %param.value,
                    reason = rejection.reply(),
                    "setparam rejected"
                );
                rejection.reply()
            }
        };

        let mut reply = StatusMessage::new(StatusKind::SetParam);
        reply.line(format!(
            "{}:{}:{}:{}:{}",
            param.element,
            param.pad_name(),
            param.property,
            param.value,
            result
        ));
        self.sink.send(&reply);
    }

    fn apply_set_param(&self, param: &SetParam) -> Result<(), Rejection> {
        let pipeline = match self.state.pipeline() {
            Some(pipeline) if self.state.is_connected() => pipeline,
            _ => return Err(Rejection::NotStreaming),
        };

        let element = pipeline
            .element_by_name(&param.element)
            .ok_or_else(|| PipelineError::ElementNotFound(param.element.clone()))?;

        let value = param.numeric_value().ok_or(Rejection::InvalidValue)?;

        match &param.pad {
            None => element.set_property_f64(&param.property, value)?,
            Some(pad_name) => {
                let pad = element.pad(pad_name).ok_or_else(|| PipelineError::PadNotFound {
                    element: param.element.clone(),
                    pad: pad_name.clone(),
                })?;
                pad.set_property_f64(&param.property, value)?;
            }
        }

        Ok(())
    }

    fn print_bin(&mut self) {
        let Some(pipeline) = self.state.pipeline().cloned() else {
            tracing::debug!("printbin while not streaming");
            return;
        };

        for element in pipeline.elements() {
            let message = describe_element(element.as_ref());
            self.sink.send(&message);
        }
    }

    fn send_status(&mut self, source: StatusSource) {
        let message = self.status_message(source);
        self.sink.send(&message);
    }
}

fn lookup(pipeline: &dyn Pipeline, name: &str) -> Option<Arc<dyn Element>> {
    let element = pipeline.element_by_name(name);
    if element.is_none() {
        tracing::warn!(element = name, "Pipeline element not found");
    }
    element
}

fn set_logged(element: &dyn Element, property: &str, value: PropertyValue) {
    if let Err(e) = element.set_property(property, value) {
        tracing::warn!(element = %element.name(), error = %e, "Failed to set property");
    }
}
