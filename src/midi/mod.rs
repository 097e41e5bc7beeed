//! MIDI sequencing on top of the scheduler.
//!
//! Files arrive already parsed as a [`MidiFile`]. A [`MidiClock`] plays a
//! track by polling the scheduler at a resolution of one MIDI tick and handing
//! due messages to a [`MidiHandler`]. [`MidiInstrument`] is a handler that
//! turns notes into voices, and [`MidiPlayer`] gives every track of a file its
//! own instrument.

mod instrument;

pub use instrument::{note_frequency, sine_voice, MidiInstrument, MidiPlayer, VoiceFactory};

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::graph::Graph;
use crate::scheduler::{EventId, Scheduler};

/// Header chunk of a standard MIDI file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MidiHeader {
    pub format_type: u16,
    pub track_count: u16,
    pub ticks_per_beat: u16,
}

/// A parsed MIDI file: a header and one event list per track.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MidiFile {
    pub header: MidiHeader,
    pub tracks: Vec<Vec<MidiEvent>>,
}

/// A message and the number of ticks since the previous event on its track.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MidiEvent {
    pub delta: u32,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(delta: u32, message: MidiMessage) -> Self {
        Self { delta, message }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteAftertouch { channel: u8, note: u8, amount: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelAftertouch { channel: u8, amount: u8 },
    /// 14-bit bend, centred on 8192
    PitchBend { channel: u8, value: u16 },
    Tempo { microseconds_per_beat: u32 },
    TimeSignature { numerator: u8, denominator: u8 },
    EndOfTrack,
    /// Any other meta event, by type byte
    Meta { kind: u8, data: Vec<u8> },
}

/// Receives MIDI messages as they come due.
///
/// Every method has an empty default, so a handler only implements the
/// messages it cares about. [`tempo`](Self::tempo) retimes the scheduler
/// unless overridden.
#[allow(unused_variables)]
pub trait MidiHandler {
    fn note_on(&mut self, graph: &mut Graph, channel: u8, note: u8, velocity: u8) {}

    fn note_off(&mut self, graph: &mut Graph, channel: u8, note: u8, velocity: u8) {}

    fn note_aftertouch(&mut self, graph: &mut Graph, channel: u8, note: u8, amount: u8) {}

    fn control_change(&mut self, graph: &mut Graph, channel: u8, controller: u8, value: u8) {}

    fn program_change(&mut self, graph: &mut Graph, channel: u8, program: u8) {}

    fn channel_aftertouch(&mut self, graph: &mut Graph, channel: u8, amount: u8) {}

    fn pitch_bend(&mut self, graph: &mut Graph, channel: u8, value: u16) {}

    fn tempo(&mut self, scheduler: &mut Scheduler, microseconds_per_beat: u32) {
        let bpm = 60_000_000.0 / microseconds_per_beat as f64;
        if let Err(err) = scheduler.set_tempo(bpm) {
            warn!(microseconds_per_beat, "ignoring tempo event: {err}");
        }
    }

    fn time_signature(&mut self, scheduler: &mut Scheduler, numerator: u8, denominator: u8) {}

    fn end_of_track(&mut self, graph: &mut Graph) {}

    fn meta(&mut self, graph: &mut Graph, kind: u8, data: &[u8]) {}

    /// Route `message` to the method for its kind.
    fn handle(&mut self, graph: &mut Graph, scheduler: &mut Scheduler, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { channel, note, velocity } => {
                self.note_on(graph, channel, note, velocity)
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                self.note_off(graph, channel, note, velocity)
            }
            MidiMessage::NoteAftertouch { channel, note, amount } => {
                self.note_aftertouch(graph, channel, note, amount)
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                self.control_change(graph, channel, controller, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                self.program_change(graph, channel, program)
            }
            MidiMessage::ChannelAftertouch { channel, amount } => {
                self.channel_aftertouch(graph, channel, amount)
            }
            MidiMessage::PitchBend { channel, value } => self.pitch_bend(graph, channel, value),
            MidiMessage::Tempo { microseconds_per_beat } => {
                self.tempo(scheduler, microseconds_per_beat)
            }
            MidiMessage::TimeSignature { numerator, denominator } => {
                self.time_signature(scheduler, numerator, denominator)
            }
            MidiMessage::EndOfTrack => self.end_of_track(graph),
            MidiMessage::Meta { kind, ref data } => self.meta(graph, kind, data),
        }
    }
}

/// One handler shared by several tracks.
impl<H: MidiHandler> MidiHandler for Arc<Mutex<H>> {
    fn handle(&mut self, graph: &mut Graph, scheduler: &mut Scheduler, message: &MidiMessage) {
        self.lock().handle(graph, scheduler, message);
    }
}

/// Plays event lists against the scheduler's beat clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiClock {
    ticks_per_beat: u16,
}

impl Default for MidiClock {
    fn default() -> Self {
        Self { ticks_per_beat: 96 }
    }
}

impl MidiClock {
    pub fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat: ticks_per_beat.max(1),
        }
    }

    #[inline]
    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Length of one MIDI tick in beats.
    #[inline]
    pub fn tick_length(&self) -> f64 {
        1.0 / self.ticks_per_beat as f64
    }

    /// Start playing `events` from the next scheduler tick.
    ///
    /// Each event is handed to `handler` `delta` MIDI ticks after the one
    /// before it. The scheduled event ends itself after the last message.
    pub fn sequence(
        &self,
        scheduler: &mut Scheduler,
        events: Vec<MidiEvent>,
        mut handler: impl MidiHandler + Send + 'static,
    ) -> EventId {
        let mut position = 0;
        let mut elapsed = 0_u32;
        debug!(events = events.len(), ticks_per_beat = self.ticks_per_beat, "sequencing MIDI track");

        scheduler.play(Vec::new(), self.tick_length(), move |graph, scheduler, _| {
            while let Some(event) = events.get(position).filter(|e| e.delta <= elapsed) {
                handler.handle(graph, scheduler, &event.message);
                position += 1;
                elapsed = 0;
            }
            if position >= events.len() {
                scheduler.cancel_current();
            } else {
                elapsed += 1;
            }
        })
    }
}

impl MidiFile {
    pub fn clock(&self) -> MidiClock {
        MidiClock::new(self.header.ticks_per_beat)
    }

    /// Sequence every track at once, all feeding the same handler.
    pub fn play<H: MidiHandler + Send + 'static>(
        &self,
        scheduler: &mut Scheduler,
        handler: Arc<Mutex<H>>,
    ) -> Vec<EventId> {
        let clock = self.clock();
        self.tracks
            .iter()
            .map(|track| clock.sequence(scheduler, track.clone(), Arc::clone(&handler)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        notes: Vec<(u64, bool, u8)>,
        ended: usize,
    }

    struct Shared(Arc<Mutex<Recorder>>, Arc<Mutex<u64>>);

    impl MidiHandler for Recorder {
        fn note_on(&mut self, _graph: &mut Graph, _channel: u8, note: u8, _velocity: u8) {
            self.notes.push((0, true, note));
        }

        fn note_off(&mut self, _graph: &mut Graph, _channel: u8, note: u8, _velocity: u8) {
            self.notes.push((0, false, note));
        }

        fn end_of_track(&mut self, _graph: &mut Graph) {
            self.ended += 1;
        }
    }

    // Stamps each recorded note with the scheduler time it arrived at.
    impl MidiHandler for Shared {
        fn handle(&mut self, graph: &mut Graph, scheduler: &mut Scheduler, message: &MidiMessage) {
            *self.1.lock() = scheduler.time();
            let mut recorder = self.0.lock();
            let before = recorder.notes.len();
            recorder.handle(graph, scheduler, message);
            if let Some(note) = recorder.notes.get_mut(before) {
                note.0 = scheduler.time();
            }
        }
    }

    fn track() -> Vec<MidiEvent> {
        vec![
            MidiEvent::new(0, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 }),
            MidiEvent::new(2, MidiMessage::NoteOff { channel: 0, note: 60, velocity: 0 }),
            MidiEvent::new(0, MidiMessage::NoteOn { channel: 0, note: 64, velocity: 100 }),
            MidiEvent::new(1, MidiMessage::EndOfTrack),
        ]
    }

    #[test]
    fn events_fire_after_their_delta() {
        let mut graph = Graph::new(100, 64);
        // 60 bpm at 100 Hz with 4 ticks per beat: one MIDI tick is 25 samples.
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let last = Arc::new(Mutex::new(0));
        MidiClock::new(4).sequence(
            &mut scheduler,
            track(),
            Shared(Arc::clone(&recorder), Arc::clone(&last)),
        );

        for _ in 0..200 {
            scheduler.tick(&mut graph);
        }

        let recorder = recorder.lock();
        assert_eq!(recorder.notes, vec![(1, true, 60), (50, false, 60), (50, true, 64)]);
        assert_eq!(recorder.ended, 1);
        assert_eq!(*last.lock(), 75);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn tempo_messages_retime_the_scheduler() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let file = MidiFile {
            header: MidiHeader {
                format_type: 1,
                track_count: 2,
                ticks_per_beat: 4,
            },
            tracks: vec![
                vec![MidiEvent::new(0, MidiMessage::Tempo { microseconds_per_beat: 500_000 })],
                track(),
            ],
        };

        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let ids = file.play(&mut scheduler, Arc::clone(&recorder));
        assert_eq!(ids.len(), 2);

        scheduler.tick(&mut graph);
        assert_eq!(scheduler.bpm(), 120.0);

        for _ in 0..200 {
            scheduler.tick(&mut graph);
        }
        assert_eq!(recorder.lock().notes.len(), 3);
        assert_eq!(recorder.lock().ended, 1);
    }
}
