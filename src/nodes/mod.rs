//! Built-in nodes.
//!
//! Nodes are organized into two categories:
//!
//! ## Sources ([`source`])
//!
//! Generate a signal without needing a connected input:
//! - [`Constant`] - Outputs a [`Parameter`](crate::Parameter) value
//! - [`Sine`] - Sine oscillator with a frequency parameter
//!
//! ## Effects ([`effect`])
//!
//! Process their inputs:
//! - [`Gain`] - Multiply by a gain parameter
//! - [`Add`] - Add an offset parameter
//! - [`PassThrough`] - Copy inputs to outputs unchanged (group proxies use these)
//! - [`UpMixer`] - Repeat input channels up to a fixed channel count
//! - [`Delay`] - Per-channel delay line with a delay time parameter
//! - [`BadValueDetector`] - Report NaN and infinite samples
//!
//! Parameters that can be driven by a signal live on a dedicated input; see
//! each node's documentation for which one.

pub mod effect;
pub mod source;

pub use effect::{Add, BadValueDetector, Delay, Gain, Multiply, PassThrough, UpMixer};
pub use source::{Constant, Sine};
