//! Session counters and periodic reports

use std::time::Duration;

use crate::quality::ScalingMode;
use crate::session::state::SessionPhase;

/// Lifetime counters of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Client attach events
    pub clients_attached: u64,
    /// Client detach events
    pub clients_detached: u64,
    /// Commands dispatched
    pub commands_handled: u64,
    /// Command lines dropped before dispatch
    pub commands_rejected: u64,
    /// Quality values pushed to the encoder after adaptation
    pub quality_changes: u64,
    /// Idle to Configuring transitions
    pub sessions: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Snapshot logged on every status tick while connected
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Attached clients
    pub clients: u32,
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Knob adapting to the client count
    pub mode: ScalingMode,
    /// Current value of that knob
    pub level: u32,
    /// Current quant level
    pub quant: u32,
    /// Current bitrate in kbps
    pub bitrate: u32,
    /// Step size of the active knob
    pub step_factor: u32,
    /// Payloader `stats` property, when readable
    pub payloader_stats: Option<String>,
    /// Time since the first client of this session
    pub uptime: Option<Duration>,
    /// Lifetime counters
    pub stats: SessionStats,
}

impl SessionReport {
    /// Emit the report through `tracing`
    pub fn log(&self) {
        tracing::info!(
            clients = self.clients,
            phase = %self.phase,
            quant = self.quant,
            bitrate = self.bitrate,
            step_factor = self.step_factor,
            mode = self.mode.property_name(),
            level = self.level,
            uptime_secs = self.uptime.map(|d| d.as_secs()).unwrap_or(0),
            quality_changes = self.stats.quality_changes,
            commands = self.stats.commands_handled,
            rejected = self.stats.commands_rejected,
            "Session report"
        );

        if let Some(stats) = &self.payloader_stats {
            tracing::info!(stats = %stats, "Payloader stats");
        }
    }
}
