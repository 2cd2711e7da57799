//! Plugin Configuration

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};

/// Stream parameters the host negotiates before processing starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels (the chain is stereo)
    pub channels: u16,

    /// Largest block the host will pass to `process_block`, in frames
    pub max_block_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            max_block_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for one full block
    pub fn latency_ms(&self) -> f32 {
        (self.max_block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> PluginResult<()> {
        if self.sample_rate < 8000 || self.sample_rate > 384000 {
            return Err(PluginError::ConfigError(format!(
                "Invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.channels != 2 {
            return Err(PluginError::ConfigError(format!(
                "Unsupported channel count: {} (stereo only)",
                self.channels
            )));
        }
        if self.max_block_size == 0 || self.max_block_size > 16384 {
            return Err(PluginError::ConfigError(format!(
                "Invalid block size: {}",
                self.max_block_size
            )));
        }
        Ok(())
    }
}

/// Overall plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Stream configuration
    pub stream: StreamConfig,

    /// Capacity of the control -> audio update queue (pending chain updates)
    pub update_queue_capacity: usize,

    /// How often the control thread checks for parameter changes (Hz)
    pub control_rate_hz: u32,

    /// Spectrum analyzer refresh rate (Hz)
    pub analyzer_fps: u32,

    /// Analyzer ring capacity in samples
    pub analyzer_capacity: usize,

    /// Points sampled for the editor's response curve
    pub response_points: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            update_queue_capacity: 8,
            control_rate_hz: 60,
            analyzer_fps: 30,
            // ~170ms at 48kHz, several UI frames of slack
            analyzer_capacity: 8192,
            response_points: 512,
        }
    }
}

impl PluginConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                max_block_size: 128, // ~2.7ms latency
            },
            control_rate_hz: 120,
            ..Default::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                max_block_size: 1024, // ~21ms latency
            },
            update_queue_capacity: 16,
            control_rate_hz: 30,
            analyzer_capacity: 16384,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> PluginResult<()> {
        self.stream.validate()?;
        if self.update_queue_capacity == 0 {
            return Err(PluginError::ConfigError(
                "Update queue capacity must be at least 1".into(),
            ));
        }
        if self.control_rate_hz == 0 || self.control_rate_hz > 1000 {
            return Err(PluginError::ConfigError(format!(
                "Invalid control rate: {}Hz",
                self.control_rate_hz
            )));
        }
        if self.analyzer_fps == 0 || self.analyzer_capacity == 0 {
            return Err(PluginError::ConfigError(
                "Analyzer needs a non-zero frame rate and capacity".into(),
            ));
        }
        Ok(())
    }
}
