//! Client-count driven quality model
//!
//! Every attached client beyond the first costs one step of quality. Two
//! knobs exist and exactly one is used per session:
//!
//! ```text
//! quant   = min_quant   + (clients - 1) * step    capped at max_quant
//! bitrate = max_bitrate - (clients - 1) * step    floored at min_bitrate
//!
//! step    = (max - min) / steps                   (integer division)
//! ```
//!
//! Lower quant means better quality, so quant rises with the client count
//! while bitrate falls. Both start at their best bound for a single client.

use crate::session::config::SessionConfig;

/// Which encoder property adapts to the client count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// Constant quality mode, scale `quant-param`
    Quant,
    /// Rate controlled mode, scale `bitrate`
    Bitrate,
}

impl ScalingMode {
    /// Encoder property driven by this mode
    pub fn property_name(&self) -> &'static str {
        match self {
            ScalingMode::Quant => "quant-param",
            ScalingMode::Bitrate => "bitrate",
        }
    }
}

/// Size of one quality step between `min` and `max`
///
/// `steps` is validated to be at least 1; zero yields a zero step rather
/// than a division fault.
pub fn step_factor(min: u32, max: u32, steps: u32) -> u32 {
    if steps == 0 {
        return 0;
    }
    max.saturating_sub(min) / steps
}

/// Quant level for `clients` attached clients
pub fn compute_quant(clients: u32, config: &SessionConfig) -> u32 {
    let step = step_factor(config.min_quant, config.max_quant, config.steps);
    let extra = u64::from(clients.saturating_sub(1)) * u64::from(step);
    let quant = u64::from(config.min_quant) + extra;

    quant.min(u64::from(config.max_quant)) as u32
}

/// Bitrate in kbps for `clients` attached clients
pub fn compute_bitrate(clients: u32, config: &SessionConfig) -> u32 {
    let step = step_factor(config.min_bitrate, config.max_bitrate, config.steps);
    let extra = u64::from(clients.saturating_sub(1)) * u64::from(step);
    let bitrate = u64::from(config.max_bitrate).saturating_sub(extra);

    bitrate.max(u64::from(config.min_bitrate)) as u32
}

/// A quality value that moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityChange {
    /// Knob that moved
    pub mode: ScalingMode,
    /// Previous value
    pub from: u32,
    /// New value
    pub to: u32,
}

/// Current quality values of the live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityState {
    /// Current quant level
    pub quant: u32,
    /// Current bitrate in kbps
    pub bitrate: u32,
}

impl QualityState {
    /// Quality for a single client
    pub fn initial(config: &SessionConfig) -> Self {
        Self {
            quant: config.min_quant,
            bitrate: config.max_bitrate,
        }
    }

    /// Recompute the active knob for `clients`
    ///
    /// Returns the change only when the value actually moved, so repeated
    /// calls with the same count are free of side effects downstream.
    pub fn adapt(&mut self, clients: u32, config: &SessionConfig) -> Option<QualityChange> {
        let mode = config.scaling_mode();
        let (slot, next) = match mode {
            ScalingMode::Quant => (&mut self.quant, compute_quant(clients, config)),
            ScalingMode::Bitrate => (&mut self.bitrate, compute_bitrate(clients, config)),
        };

        if *slot == next {
            return None;
        }

        let change = QualityChange {
            mode,
            from: *slot,
            to: next,
        };
        *slot = next;
        Some(change)
    }

    /// Value of the knob `mode` selects
    pub fn value(&self, mode: ScalingMode) -> u32 {
        match mode {
            ScalingMode::Quant => self.quant,
            ScalingMode::Bitrate => self.bitrate,
        }
    }
}
