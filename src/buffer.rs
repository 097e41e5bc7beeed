//! Variable-size multi-channel sample storage.
//!
//! A [`Buffer`] keeps one backing vector per channel (the "unsliced" storage)
//! and exposes a window of `len()` frames starting at a shared channel offset.
//! Shrinking only moves the window, and growing reuses the backing storage when
//! asked to be lazy, so a buffer that is resized every tick does not have to
//! touch the allocator.
//!
//! # Preconditions
//!
//! Operations that combine two buffers (`set`, `add`, the `*_section` family,
//! `push`/`pop`/`shift`/`unshift`) expect `other` to have no more channels than
//! `self`, and sections to lie inside both buffers. These are not checked at
//! runtime beyond the slice bounds checks Rust performs anyway.

use itertools::{iproduct, izip};

use crate::decode::Decoder;
use crate::error::Result;

/// A resizable multi-channel buffer of `f32` samples.
#[derive(Debug, Default)]
pub struct Buffer {
    unsliced: Vec<Vec<f32>>,
    offset: usize,
    length: usize,
}

impl Buffer {
    /// Create a zeroed buffer with `num_channels` channels of `length` frames.
    pub fn new(num_channels: usize, length: usize) -> Self {
        Self {
            unsliced: vec![vec![0.0; length]; num_channels],
            offset: 0,
            length,
        }
    }

    /// Create an empty buffer whose backing storage already holds `capacity`
    /// frames per channel.
    ///
    /// `push` and `unshift` on such a buffer do not allocate until the window
    /// would outgrow `capacity`.
    pub fn with_capacity(num_channels: usize, capacity: usize) -> Self {
        Self {
            unsliced: vec![vec![0.0; capacity]; num_channels],
            offset: 0,
            length: 0,
        }
    }

    /// Build a buffer from already de-interleaved channel data.
    ///
    /// The length is taken from the shortest channel.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Self {
        let length = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            unsliced: channels,
            offset: 0,
            length,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.unsliced.len()
    }

    /// Offset of the visible window into the backing storage.
    #[inline]
    pub fn channel_offset(&self) -> usize {
        self.offset
    }

    /// Frames available in the backing storage of the first channel.
    pub fn capacity(&self) -> usize {
        self.unsliced.first().map_or(0, Vec::len)
    }

    /// Get a single channel of data.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.unsliced[channel][self.offset..self.offset + self.length]
    }

    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let (start, end) = (self.offset, self.offset + self.length);
        &mut self.unsliced[channel][start..end]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        let (start, end) = (self.offset, self.offset + self.length);
        self.unsliced.iter().map(move |c| &c[start..end])
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let (start, end) = (self.offset, self.offset + self.length);
        self.unsliced.iter_mut().map(move |c| &mut c[start..end])
    }

    /// Copy every channel of `other` into this buffer. Lengths must match.
    pub fn set(&mut self, other: &Buffer) {
        for (dst, src) in self.channels_mut().zip(other.channels()) {
            dst.copy_from_slice(src);
        }
    }

    /// Copy `length` frames of `other`, starting at `input_offset`, into this
    /// buffer starting at `output_offset`.
    pub fn set_section(
        &mut self,
        other: &Buffer,
        length: usize,
        input_offset: usize,
        output_offset: usize,
    ) {
        let src_start = other.offset + input_offset;
        let dst_start = self.offset + output_offset;
        for (dst, src) in self.unsliced.iter_mut().zip(other.unsliced.iter()) {
            dst[dst_start..dst_start + length].copy_from_slice(&src[src_start..src_start + length]);
        }
    }

    /// Add the data of `other` into this buffer, frame by frame.
    pub fn add(&mut self, other: &Buffer) {
        for (dst, src) in self.channels_mut().zip(other.channels()) {
            for (d, s) in izip!(dst.iter_mut(), src) {
                *d += *s;
            }
        }
    }

    /// Accumulate `length` frames of `other` into a section of this buffer.
    pub fn add_section(
        &mut self,
        other: &Buffer,
        length: usize,
        input_offset: usize,
        output_offset: usize,
    ) {
        let src_start = other.offset + input_offset;
        let dst_start = self.offset + output_offset;
        for (dst, src) in self.unsliced.iter_mut().zip(other.unsliced.iter()) {
            let dst = &mut dst[dst_start..dst_start + length];
            let src = &src[src_start..src_start + length];
            for (d, s) in izip!(dst.iter_mut(), src) {
                *d += *s;
            }
        }
    }

    /// Resize the buffer to `num_channels` channels of `length` frames.
    ///
    /// Growing allocates fresh zeroed storage and copies the old frames to
    /// `offset`, unless `lazy` is set and the existing backing storage is
    /// already long enough. A lazy grow reuses that storage as-is: the new
    /// frames are whatever the storage last held, not zeros. Callers that
    /// need silence after a lazy grow must call [`zero`](Self::zero).
    ///
    /// Shrinking never copies; it moves the window `offset` frames further into
    /// the backing storage.
    pub fn resize(&mut self, num_channels: usize, length: usize, lazy: bool, offset: usize) {
        let old_length = self.length;
        let old_offset = self.offset;
        let mut channel_offset = self.offset + offset;

        if length > old_length {
            for i in 0..num_channels {
                let reusable = lazy && self.unsliced.get(i).is_some_and(|c| c.len() >= length);
                if reusable {
                    continue;
                }

                let mut fresh = vec![0.0; length];
                if !lazy {
                    if let Some(old) = self.unsliced.get(i) {
                        let start = offset.min(length);
                        let count = old_length.min(length - start);
                        fresh[start..start + count]
                            .copy_from_slice(&old[old_offset..old_offset + count]);
                    }
                }

                if i < self.unsliced.len() {
                    self.unsliced[i] = fresh;
                } else {
                    self.unsliced.push(fresh);
                }
            }
            channel_offset = 0;
        } else {
            let spare = self.capacity().max(channel_offset + length);
            while self.unsliced.len() < num_channels {
                self.unsliced.push(vec![0.0; spare]);
            }
        }

        self.unsliced.truncate(num_channels);
        self.length = length;
        self.offset = channel_offset;
    }

    /// Append the frames of `other` to the end of this buffer.
    pub fn push(&mut self, other: &Buffer) {
        let extra = other.len();
        if !self.reserve_tail(extra) {
            self.resize(self.num_channels(), self.length + extra, false, 0);
        }
        self.set_section(other, extra, 0, self.length - extra);
    }

    /// Remove `other.len()` frames from the end of this buffer, moving them
    /// into `other`.
    pub fn pop(&mut self, other: &mut Buffer) {
        let extra = other.len();
        let start = self.length - extra;
        other.set_section(self, extra, start, 0);
        self.resize(self.num_channels(), start, false, 0);
    }

    /// Prepend the frames of `other` to the beginning of this buffer.
    pub fn unshift(&mut self, other: &Buffer) {
        let extra = other.len();
        if self.offset >= extra {
            self.offset -= extra;
            self.length += extra;
        } else {
            self.resize(self.num_channels(), self.length + extra, false, extra);
        }
        self.set_section(other, extra, 0, 0);
    }

    /// Remove `other.len()` frames from the beginning of this buffer, moving
    /// them into `other`.
    pub fn shift(&mut self, other: &mut Buffer) {
        let extra = other.len();
        other.set_section(self, extra, 0, 0);
        self.resize(self.num_channels(), self.length - extra, false, extra);
    }

    /// Make all values in the buffer 0
    pub fn zero(&mut self) {
        for channel in self.channels_mut() {
            channel.fill(0.0);
        }
    }

    /// Copy the buffer into a single vector, channel after channel.
    pub fn combined(&self) -> Vec<f32> {
        let mut combined = Vec::with_capacity(self.num_channels() * self.length);
        for channel in self.channels() {
            combined.extend_from_slice(channel);
        }
        combined
    }

    /// Copy the buffer into a single vector with the channels interleaved.
    pub fn interleaved(&self) -> Vec<f32> {
        iproduct!(0..self.length, 0..self.num_channels())
            .map(|(frame, channel)| self.unsliced[channel][self.offset + frame])
            .collect()
    }

    /// Return a compact copy of the visible window.
    pub fn copy(&self) -> Buffer {
        let mut buffer = Buffer::new(self.num_channels(), self.length);
        buffer.set(self);
        buffer
    }

    /// Replace the contents of this buffer with a decoded audio file.
    pub fn load<D: Decoder + ?Sized>(&mut self, decoder: &D, bytes: &[u8]) -> Result<()> {
        let decoded = decoder.decode(bytes)?;
        let shortest = decoded.channels.iter().map(Vec::len).min().unwrap_or(0);
        self.length = decoded.length.min(shortest);
        self.unsliced = decoded.channels;
        self.offset = 0;
        Ok(())
    }

    /// Try to make room for `extra` frames after the window without
    /// allocating, compacting the window to the front of the backing storage
    /// if that is what it takes.
    fn reserve_tail(&mut self, extra: usize) -> bool {
        let needed = self.length + extra;
        let (offset, length) = (self.offset, self.length);

        if self.unsliced.iter().all(|c| c.len() >= offset + needed) {
            self.length = needed;
            return true;
        }
        if self.unsliced.iter().all(|c| c.len() >= needed) {
            for channel in &mut self.unsliced {
                channel.copy_within(offset..offset + length, 0);
            }
            self.offset = 0;
            self.length = needed;
            return true;
        }
        false
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Self {
        self.copy()
    }
}
