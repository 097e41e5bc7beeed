//! Engine configuration.

use crate::error::{Error, Result};

/// Settings the engine is built from.
///
/// Use the `with_*` builder methods to override the defaults:
///
/// ```
/// use schall::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_sample_rate(48_000)
///     .with_bpm(96.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels handed to the backend
    pub channels: usize,
    /// Frames the backend is expected to request per callback
    pub block_size: usize,
    /// Upper bound on frames held by any feedback line
    pub max_block_size: usize,
    /// Initial scheduler tempo
    pub bpm: f64,
    /// Beats per bar used by the scheduler's bar counter
    pub beats_per_bar: u32,
    /// Commands an [`EngineHandle`](crate::EngineHandle) can queue between
    /// two audio callbacks
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            block_size: 8192,
            max_block_size: 8192,
            bpm: 120.0,
            beats_per_bar: 4,
            command_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_beats_per_bar(mut self, beats_per_bar: u32) -> Self {
        self.beats_per_bar = beats_per_bar;
        self
    }

    pub fn with_command_capacity(mut self, command_capacity: usize) -> Self {
        self.command_capacity = command_capacity;
        self
    }

    /// Check the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(Error::InvalidConfig("channel count must be non-zero".into()));
        }
        if self.block_size == 0 || self.max_block_size == 0 {
            return Err(Error::InvalidConfig("block sizes must be non-zero".into()));
        }
        if self.block_size > self.max_block_size {
            return Err(Error::InvalidConfig(format!(
                "block size {} exceeds maximum block size {}",
                self.block_size, self.max_block_size
            )));
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(Error::InvalidConfig(format!("tempo {} bpm is not usable", self.bpm)));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig("command queue capacity must be non-zero".into()));
        }
        Ok(())
    }
}
