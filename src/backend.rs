//! CPAL output backend
//!
//! Opens an output device and pulls audio from an [`AudioSource`] inside the
//! stream callback. Non-float devices get the samples converted on the way
//! out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use tracing::{info, warn};

use crate::device::AudioSource;
use crate::error::{Error, Result};

/// A discovered audio output device
pub struct CpalDevice {
    device: cpal::Device,
    config: SupportedStreamConfig,
    name: String,
}

impl CpalDevice {
    /// Get the default output device
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::open(device)
    }

    /// List all available output devices
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::open).collect())
            .unwrap_or_default()
    }

    fn open(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            device,
            config,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Build and start an output stream fed by `source`.
    ///
    /// `played` is advanced by the number of frames handed to the device on
    /// every callback; pass [`Device::playback_counter`](crate::Device::playback_counter)
    /// to keep the engine's playback time current. The stream stops when the
    /// returned handle is dropped.
    pub fn start<S: AudioSource + Send + 'static>(
        &self,
        mut source: S,
        played: Arc<AtomicU64>,
    ) -> Result<cpal::Stream> {
        let channels = self.config.channels() as usize;
        let sample_format = self.config.sample_format();
        let stream_config = self.config.config();
        let on_error = |err: cpal::StreamError| warn!("CPAL stream error: {err}");

        let stream = match sample_format {
            SampleFormat::F32 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    source.fill(data, channels);
                    played.fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch = Vec::new();
                self.device.build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _| {
                        pull(&mut source, &mut scratch, data.len(), channels);
                        for (out, s) in data.iter_mut().zip(&scratch) {
                            *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        }
                        played.fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut scratch = Vec::new();
                self.device.build_output_stream(
                    &stream_config,
                    move |data: &mut [u16], _| {
                        pull(&mut source, &mut scratch, data.len(), channels);
                        for (out, s) in data.iter_mut().zip(&scratch) {
                            *out = ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16;
                        }
                        played.fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(Error::Backend(format!("unsupported sample format: {other:?}")));
            }
        }
        .map_err(|e| Error::Backend(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::Backend(format!("failed to start audio stream: {e}")))?;

        info!(
            device = %self.name,
            sample_rate = self.sample_rate(),
            channels,
            ?sample_format,
            "output stream started"
        );
        Ok(stream)
    }
}

// Render into a float scratch buffer for conversion. Resizing only allocates
// when the device asks for a bigger block than before.
fn pull<S: AudioSource>(source: &mut S, scratch: &mut Vec<f32>, len: usize, channels: usize) {
    scratch.resize(len, 0.0);
    source.fill(scratch, channels);
}
