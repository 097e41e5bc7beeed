//! # Schall
//!
//! A sample-accurate audio graph engine with a beat-synchronised event
//! scheduler.
//!
//! Nodes live in a [`Graph`] and are wired output-to-input. A [`Device`] sits
//! at the root: whenever a backend asks for audio it ticks every node upstream
//! of itself once per frame, producers first, and copies what reaches its
//! input into the backend's buffer. Cycles are allowed; a connection that
//! closes a loop carries the previous frame's samples.
//!
//! The [`Scheduler`] runs a beat clock on the same per-frame tick and fires
//! callbacks at exact sample positions, optionally drawing values from
//! [`pattern`]s.
//!
//! [`Engine`] bundles all three:
//!
//! ```
//! use schall::{Engine, EngineConfig};
//! use schall::nodes::{Constant, Gain};
//! use schall::pattern::{Item, Sequence};
//!
//! let mut engine = Engine::new(EngineConfig::default().with_channels(1)).unwrap();
//! let source = engine.add(Constant::new(1.0));
//! let gain = engine.add(Gain::new(0.0));
//! engine.connect(&source, &gain).unwrap();
//! engine.output(&gain).unwrap();
//!
//! // Step the gain through three levels, one per beat.
//! let levels = Sequence::from_values([0.25, 0.5, 1.0], 1);
//! engine.scheduler_mut().play(vec![Item::pattern(levels)], 1.0, move |graph, _, values| {
//!     if let Some(gain) = graph.processor_mut::<Gain>(gain) {
//!         gain.set_gain(values[0] as f32);
//!     }
//! });
//!
//! let block = engine.render(4);
//! assert_eq!(block, vec![0.0, 0.25, 0.25, 0.25]);
//! ```
//!
//! Custom nodes implement [`SignalProcessor`]. Once the engine is handed to
//! an audio backend, an [`EngineHandle`] queues changes to it from other
//! threads without locking.
//!
//! ## Features
//!
//! - `wav` (default): [`WavDecoder`] for loading WAV files into a [`Buffer`]
//! - `cpal_sink`: [`CpalDevice`] output backend
//! - `serde`: serialization for [`EngineConfig`] and the MIDI types

pub mod buffer;
pub mod config;
pub mod decode;
pub mod device;
pub mod engine;
pub mod error;
pub mod graph;
pub mod group;
pub mod midi;
pub mod node;
pub mod nodes;
pub mod pattern;
pub mod pin;
pub mod queue;
pub mod scheduler;

#[cfg(feature = "cpal_sink")]
pub mod backend;

pub use buffer::Buffer;
pub use config::EngineConfig;
pub use decode::{Decoded, Decoder};
#[cfg(feature = "wav")]
pub use decode::WavDecoder;
pub use device::{AudioSource, Device};
pub use engine::{Command, Engine, EngineHandle};
pub use error::{Error, PinKind, Result};
pub use graph::{Endpoint, Graph};
pub use group::Group;
pub use node::{AsAny, NodeId, ProcessContext, SignalProcessor};
pub use pin::{Input, ListenerId, Output, Parameter, PinRef};
pub use queue::PriorityQueue;
pub use scheduler::{EventId, Scheduler};

#[cfg(feature = "cpal_sink")]
pub use backend::CpalDevice;
