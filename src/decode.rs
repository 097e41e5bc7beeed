//! Audio file decoding.
//!
//! [`Buffer::load`](crate::Buffer::load) accepts any [`Decoder`]. A WAV decoder
//! backed by `hound` is available with the `wav` feature.

#[cfg(feature = "wav")]
use std::io::Cursor;

use crate::error::Result;
#[cfg(feature = "wav")]
use crate::error::Error;

/// A decoded audio file, one sample vector per channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded {
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub channels: Vec<Vec<f32>>,
    /// Frames per channel
    pub length: usize,
}

/// Turns the raw bytes of an audio file into sample data.
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded>;
}

/// Decodes RIFF WAVE files (integer PCM up to 32 bits, or 32-bit float).
#[cfg(feature = "wav")]
#[derive(Clone, Copy, Debug, Default)]
pub struct WavDecoder;

#[cfg(feature = "wav")]
impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| Error::Decode(format!("failed to read WAV header: {e}")))?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(Error::Decode("WAV file declares no channels".into()));
        }
        if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
            return Err(Error::Decode(format!(
                "unsupported bit depth: {} bits",
                spec.bits_per_sample
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Decode(format!("failed to read samples: {e}")))?,
            hound::SampleFormat::Int => {
                let max_value = (1_u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_value))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| Error::Decode(format!("failed to read samples: {e}")))?
            }
        };

        let length = interleaved.len() / channels;
        let mut data = vec![Vec::with_capacity(length); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (channel, sample) in data.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        Ok(Decoded {
            sample_rate: spec.sample_rate,
            bit_depth: spec.bits_per_sample,
            channels: data,
            length,
        })
    }
}
