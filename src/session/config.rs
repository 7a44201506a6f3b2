//! Session configuration

use std::time::Duration;

use crate::error::ConfigError;
use crate::quality::ScalingMode;

/// Lowest quant-param the H.264 encoder accepts (best quality)
pub const QUANT_FLOOR: u32 = 0;

/// Highest quant-param the H.264 encoder accepts (worst quality)
pub const QUANT_CEILING: u32 = 51;

/// Hardware bitrate ceiling in kbps
pub const BITRATE_CAP: u32 = u32::MAX;

/// Lowest bitrate allowed as the scaling floor
pub const BITRATE_FLOOR: u32 = 1;

/// Default number of quality levels a user asks for
pub const DEFAULT_REQUESTED_STEPS: u32 = 5;

/// Immutable per-process session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Best quant level, used for the first client
    pub min_quant: u32,

    /// Worst quant level
    pub max_quant: u32,

    /// Bitrate floor in kbps
    pub min_bitrate: u32,

    /// Starting bitrate in kbps (0 = constant quality, quant scaling)
    pub max_bitrate: u32,

    /// Upper bound accepted for either bitrate setting
    pub cap_bitrate: u32,

    /// Number of gaps between best and worst quality (at least 1)
    pub steps: u32,

    /// Interval between IDR frames (encoder `idr-interval`)
    pub idr_interval: u32,

    /// SPS/PPS insertion interval (payloader `config-interval`)
    pub config_interval: i32,

    /// Periodic status report interval (zero disables)
    pub status_interval: Duration,

    /// Adapt quality to the number of clients
    pub variable_mode: bool,

    /// Capture device handed to the source element
    pub video_device: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_quant: QUANT_FLOOR,
            max_quant: QUANT_CEILING,
            min_bitrate: BITRATE_FLOOR,
            max_bitrate: 10_000, // 10 Mbit/s
            cap_bitrate: BITRATE_CAP,
            steps: DEFAULT_REQUESTED_STEPS - 1,
            idr_interval: 0,
            config_interval: 2,
            status_interval: Duration::from_secs(5),
            variable_mode: true,
            video_device: "/dev/video0".into(),
        }
    }
}

impl SessionConfig {
    /// Set the starting bitrate, clamped to `[0, cap_bitrate]`
    pub fn max_bitrate(mut self, kbps: u32) -> Self {
        self.max_bitrate = kbps.min(self.cap_bitrate);
        self
    }

    /// Set the bitrate floor, clamped to `[1, cap_bitrate]`
    pub fn min_bitrate(mut self, kbps: u32) -> Self {
        self.min_bitrate = kbps.clamp(BITRATE_FLOOR, self.cap_bitrate);
        self
    }

    /// Set the best quant level, clamped to the encoder range
    pub fn min_quant(mut self, level: u32) -> Self {
        self.min_quant = level.min(QUANT_CEILING);
        self
    }

    /// Set the worst quant level, clamped to the encoder range
    pub fn max_quant(mut self, level: u32) -> Self {
        self.max_quant = level.min(QUANT_CEILING);
        self
    }

    /// Set the number of quality levels as a user counts them
    ///
    /// Five levels means four steps between best and worst.
    pub fn requested_steps(mut self, levels: u32) -> Self {
        self.steps = levels.saturating_sub(1);
        self
    }

    /// Set the internal step count directly
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the IDR interval
    pub fn idr_interval(mut self, interval: u32) -> Self {
        self.idr_interval = interval;
        self
    }

    /// Set the RTP config interval
    pub fn config_interval(mut self, interval: i32) -> Self {
        self.config_interval = interval;
        self
    }

    /// Set the periodic status interval
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Enable or disable client-count driven quality
    pub fn variable_mode(mut self, enabled: bool) -> Self {
        self.variable_mode = enabled;
        self
    }

    /// Set the capture device
    pub fn video_device(mut self, device: impl Into<String>) -> Self {
        self.video_device = device.into();
        self
    }

    /// Which quality knob adapts to the client count
    pub fn scaling_mode(&self) -> ScalingMode {
        if self.max_bitrate > 0 {
            ScalingMode::Bitrate
        } else {
            ScalingMode::Quant
        }
    }

    /// Check the bounds before the session starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_quant < self.min_quant {
            return Err(ConfigError::QuantRange {
                min: self.min_quant,
                max: self.max_quant,
            });
        }

        if self.variable_mode
            && self.scaling_mode() == ScalingMode::Bitrate
            && self.max_bitrate < self.min_bitrate
        {
            return Err(ConfigError::BitrateRange {
                min: self.min_bitrate,
                max: self.max_bitrate,
            });
        }

        if self.steps < 1 {
            return Err(ConfigError::Steps(self.steps));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.min_quant, 0);
        assert_eq!(config.max_quant, 51);
        assert_eq!(config.min_bitrate, 1);
        assert_eq!(config.max_bitrate, 10_000);
        assert_eq!(config.steps, 4);
        assert_eq!(config.config_interval, 2);
        assert_eq!(config.status_interval, Duration::from_secs(5));
        assert!(config.variable_mode);
        assert_eq!(config.scaling_mode(), ScalingMode::Bitrate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_requested_steps() {
        let config = SessionConfig::default().requested_steps(3);
        assert_eq!(config.steps, 2);

        // One requested level leaves nothing to step through
        let config = SessionConfig::default().requested_steps(1);
        assert_eq!(config.steps, 0);
        assert_eq!(config.validate(), Err(ConfigError::Steps(0)));
    }

    #[test]
    fn test_quant_clamped() {
        let config = SessionConfig::default().min_quant(80).max_quant(99);

        assert_eq!(config.min_quant, QUANT_CEILING);
        assert_eq!(config.max_quant, QUANT_CEILING);
    }

    #[test]
    fn test_min_bitrate_floor() {
        let config = SessionConfig::default().min_bitrate(0);
        assert_eq!(config.min_bitrate, BITRATE_FLOOR);
    }

    #[test]
    fn test_zero_max_bitrate_selects_quant() {
        let config = SessionConfig::default().max_bitrate(0);

        assert_eq!(config.scaling_mode(), ScalingMode::Quant);
        // Bitrate bounds are irrelevant in quant mode
        let config = config.min_bitrate(500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_quant_range() {
        let config = SessionConfig::default().min_quant(30).max_quant(20);

        assert_eq!(
            config.validate(),
            Err(ConfigError::QuantRange { min: 30, max: 20 })
        );
    }

    #[test]
    fn test_validate_bitrate_range() {
        let config = SessionConfig::default().max_bitrate(100).min_bitrate(200);

        assert_eq!(
            config.validate(),
            Err(ConfigError::BitrateRange { min: 200, max: 100 })
        );

        // Not checked when adaptation is off
        assert!(config.variable_mode(false).validate().is_ok());
    }

    #[test]
    fn test_builder_chaining() {
        let config = SessionConfig::default()
            .max_bitrate(8000)
            .min_bitrate(1000)
            .requested_steps(8)
            .idr_interval(30)
            .config_interval(-1)
            .status_interval(Duration::ZERO)
            .video_device("/dev/video2");

        assert_eq!(config.max_bitrate, 8000);
        assert_eq!(config.min_bitrate, 1000);
        assert_eq!(config.steps, 7);
        assert_eq!(config.idr_interval, 30);
        assert_eq!(config.config_interval, -1);
        assert_eq!(config.status_interval, Duration::ZERO);
        assert_eq!(config.video_device, "/dev/video2");
        assert!(config.validate().is_ok());
    }
}
