//! Voice-allocating instruments driven by MIDI.
//!
//! A [`MidiInstrument`] builds a fresh voice [`Group`] for every note-on and
//! deletes it again on the matching note-off. Voices are built by a factory
//! closure; program changes pick which factory is used for new notes.

use hashbrown::HashMap;
use tracing::{debug, warn};

use super::{MidiClock, MidiEvent, MidiFile, MidiHandler};
use crate::error::{Error, PinKind, Result};
use crate::graph::{Endpoint, Graph};
use crate::group::Group;
use crate::nodes::{Gain, Sine};
use crate::pin::PinRef;
use crate::scheduler::{EventId, Scheduler};

/// Builds the voice for a note from its number and velocity. The returned
/// group's output 0 is wired into the instrument.
pub type VoiceFactory = Box<dyn FnMut(&mut Graph, u8, u8) -> Result<Group> + Send>;

/// Equal-tempered frequency of a MIDI note, with A4 (note 69) at 440 Hz.
pub fn note_frequency(note: u8) -> f32 {
    440.0 * 2_f32.powf((note as f32 - 69.0) / 12.0)
}

/// A sine tone at the note's pitch, scaled by velocity.
pub fn sine_voice(graph: &mut Graph, note: u8, velocity: u8) -> Result<Group> {
    let mut voice = Group::new(graph, 0, 1);
    let osc = voice.add(graph, Sine::new(note_frequency(note)).with_amplitude(1.0));
    let level = voice.add(graph, Gain::new(velocity as f32 / 127.0));
    graph.connect(&osc, &level)?;
    let out = voice.output(0).ok_or(Error::MissingPin {
        kind: PinKind::Output,
        index: 0,
    })?;
    graph.connect(&level, &out)?;
    Ok(voice)
}

/// A polyphonic instrument with one output.
///
/// ```
/// use schall::midi::{sine_voice, MidiHandler, MidiInstrument};
/// use schall::Graph;
///
/// let mut graph = Graph::new(44_100, 1024);
/// let mut piano = MidiInstrument::new(&mut graph, sine_voice);
/// piano.note_on(&mut graph, 0, 60, 100);
/// assert_eq!(piano.active_voices(), 1);
/// piano.note_off(&mut graph, 0, 60, 0);
/// assert_eq!(piano.active_voices(), 0);
/// ```
pub struct MidiInstrument {
    output: Group,
    programs: Vec<VoiceFactory>,
    program: usize,
    voices: HashMap<u8, Vec<Group>>,
}

impl MidiInstrument {
    /// An instrument whose program 0 plays `voice`.
    pub fn new(
        graph: &mut Graph,
        voice: impl FnMut(&mut Graph, u8, u8) -> Result<Group> + Send + 'static,
    ) -> Self {
        Self {
            output: Group::new(graph, 0, 1),
            programs: vec![Box::new(voice)],
            program: 0,
            voices: HashMap::new(),
        }
    }

    /// Add `voice` as the next program number.
    pub fn with_program(
        mut self,
        voice: impl FnMut(&mut Graph, u8, u8) -> Result<Group> + Send + 'static,
    ) -> Self {
        self.programs.push(Box::new(voice));
        self
    }

    /// The group voices are mixed into.
    pub fn output(&self) -> &Group {
        &self.output
    }

    #[inline]
    pub fn program(&self) -> usize {
        self.program
    }

    #[inline]
    pub fn num_programs(&self) -> usize {
        self.programs.len()
    }

    /// Voices currently sounding, across all notes.
    pub fn active_voices(&self) -> usize {
        self.voices.values().map(Vec::len).sum()
    }

    /// Start a voice for `note` with the current program.
    pub fn press(&mut self, graph: &mut Graph, note: u8, velocity: u8) -> Result<()> {
        let out = self.output.output(0).ok_or(Error::MissingPin {
            kind: PinKind::Output,
            index: 0,
        })?;
        let Some(factory) = self.programs.get_mut(self.program) else {
            return Ok(());
        };

        let voice = factory(graph, note, velocity)?;
        if let Err(err) = graph.connect(&voice, &out) {
            voice.delete(graph);
            return Err(err);
        }
        debug!(note, velocity, program = self.program, "voice started");
        self.voices.entry(note).or_default().push(voice);
        Ok(())
    }

    /// Delete the most recent voice started for `note`. Returns whether
    /// there was one.
    pub fn release(&mut self, graph: &mut Graph, note: u8) -> bool {
        let Some(voice) = self.voices.get_mut(&note).and_then(Vec::pop) else {
            return false;
        };
        voice.delete(graph);
        debug!(note, "voice released");
        true
    }

    /// Delete every sounding voice.
    pub fn release_all(&mut self, graph: &mut Graph) {
        for (_, voices) in self.voices.drain() {
            for voice in voices {
                voice.delete(graph);
            }
        }
    }

    /// Use program `program` for new notes. Unknown programs are ignored.
    pub fn select_program(&mut self, program: usize) -> bool {
        if program >= self.programs.len() {
            warn!(program, available = self.programs.len(), "no such program");
            return false;
        }
        self.program = program;
        true
    }
}

impl MidiHandler for MidiInstrument {
    fn note_on(&mut self, graph: &mut Graph, _channel: u8, note: u8, velocity: u8) {
        // Running status encodes note-off as a silent note-on.
        if velocity == 0 {
            self.release(graph, note);
        } else if let Err(err) = self.press(graph, note, velocity) {
            warn!(note, "could not start voice: {err}");
        }
    }

    fn note_off(&mut self, graph: &mut Graph, _channel: u8, note: u8, _velocity: u8) {
        self.release(graph, note);
    }

    fn program_change(&mut self, _graph: &mut Graph, _channel: u8, program: u8) {
        self.select_program(program as usize);
    }
}

impl Endpoint for MidiInstrument {
    fn source(&self, output: usize) -> Option<PinRef> {
        self.output.source(output)
    }

    fn sink(&self, _input: usize) -> Option<PinRef> {
        None
    }
}

/// Plays a [`MidiFile`] with one instrument per track, all mixed into one
/// output.
pub struct MidiPlayer {
    clock: MidiClock,
    tracks: Vec<Vec<MidiEvent>>,
    instruments: Vec<MidiInstrument>,
    output: Group,
}

impl MidiPlayer {
    /// Build an instrument for every track of `file` with `instrument`, which
    /// is given the track index.
    pub fn new(
        graph: &mut Graph,
        file: &MidiFile,
        mut instrument: impl FnMut(&mut Graph, usize) -> MidiInstrument,
    ) -> Result<Self> {
        let output = Group::new(graph, 0, 1);
        let mix = output.output(0).ok_or(Error::MissingPin {
            kind: PinKind::Output,
            index: 0,
        })?;

        let mut instruments = Vec::with_capacity(file.tracks.len());
        for track in 0..file.tracks.len() {
            let built = instrument(graph, track);
            graph.connect(&built, &mix)?;
            instruments.push(built);
        }
        debug!(tracks = instruments.len(), "MIDI player ready");

        Ok(Self {
            clock: file.clock(),
            tracks: file.tracks.clone(),
            instruments,
            output,
        })
    }

    pub fn output(&self) -> &Group {
        &self.output
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Start every track on the scheduler. The instruments move into the
    /// scheduled events.
    pub fn play(self, scheduler: &mut Scheduler) -> Vec<EventId> {
        let clock = self.clock;
        self.tracks
            .into_iter()
            .zip(self.instruments)
            .map(|(track, instrument)| clock.sequence(scheduler, track, instrument))
            .collect()
    }
}

impl Endpoint for MidiPlayer {
    fn source(&self, output: usize) -> Option<PinRef> {
        self.output.source(output)
    }

    fn sink(&self, _input: usize) -> Option<PinRef> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{MidiHeader, MidiMessage};
    use crate::node::NodeId;
    use crate::nodes::{Constant, PassThrough};

    // A voice that outputs its note number times `scale`, so mixes are easy
    // to read.
    fn scaled_voice(graph: &mut Graph, note: u8, scale: f32) -> Result<Group> {
        let mut voice = Group::new(graph, 0, 1);
        let level = voice.add(graph, Constant::new(note as f32));
        let scaled = voice.add(graph, Gain::new(scale));
        graph.connect(&level, &scaled)?;
        graph.connect(&scaled, &voice.output(0).unwrap())?;
        Ok(voice)
    }

    fn level_voice(graph: &mut Graph, note: u8, _velocity: u8) -> Result<Group> {
        scaled_voice(graph, note, 1.0)
    }

    fn listen(graph: &mut Graph, source: &impl Endpoint) -> NodeId {
        let sink = graph.add(PassThrough::new(1));
        graph.connect(source, &sink).unwrap();
        sink
    }

    fn heard(graph: &mut Graph, sink: NodeId) -> f32 {
        for id in graph.traverse(sink).into_iter().rev() {
            graph.tick(id);
        }
        graph.input(sink, 0).unwrap().channel(0)
    }

    #[test]
    fn note_frequencies_follow_equal_temperament() {
        assert_eq!(note_frequency(69), 440.0);
        assert!((note_frequency(81) - 880.0).abs() < 1e-3);
        assert!((note_frequency(60) - 261.626).abs() < 1e-2);
    }

    #[test]
    fn notes_start_and_delete_voices() {
        let mut graph = Graph::new(44_100, 64);
        let mut instrument = MidiInstrument::new(&mut graph, level_voice);
        let sink = listen(&mut graph, &instrument);
        let before = graph.len();

        instrument.note_on(&mut graph, 0, 60, 100);
        instrument.note_on(&mut graph, 0, 64, 100);
        assert_eq!(instrument.active_voices(), 2);
        assert_eq!(heard(&mut graph, sink), 124.0);

        instrument.note_off(&mut graph, 0, 60, 0);
        assert_eq!(heard(&mut graph, sink), 64.0);
        assert_eq!(graph.len(), before + 3);

        instrument.note_on(&mut graph, 0, 64, 0);
        assert_eq!(instrument.active_voices(), 0);
        assert_eq!(graph.len(), before);
        assert!(!instrument.release(&mut graph, 64));
    }

    #[test]
    fn repeated_notes_stack_voices() {
        let mut graph = Graph::new(44_100, 64);
        let mut instrument = MidiInstrument::new(&mut graph, level_voice);
        let sink = listen(&mut graph, &instrument);

        instrument.note_on(&mut graph, 0, 10, 100);
        instrument.note_on(&mut graph, 0, 10, 100);
        assert_eq!(heard(&mut graph, sink), 20.0);
        instrument.note_off(&mut graph, 0, 10, 0);
        assert_eq!(heard(&mut graph, sink), 10.0);

        instrument.release_all(&mut graph);
        assert_eq!(instrument.active_voices(), 0);
    }

    #[test]
    fn program_change_swaps_the_voice() {
        let mut graph = Graph::new(44_100, 64);
        let mut instrument = MidiInstrument::new(&mut graph, level_voice)
            .with_program(|graph: &mut Graph, note: u8, _velocity: u8| scaled_voice(graph, note, 2.0));
        let sink = listen(&mut graph, &instrument);

        instrument.program_change(&mut graph, 0, 1);
        assert_eq!(instrument.program(), 1);
        instrument.note_on(&mut graph, 0, 5, 100);
        assert_eq!(heard(&mut graph, sink), 10.0);

        instrument.program_change(&mut graph, 0, 7);
        assert_eq!(instrument.program(), 1);
        instrument.program_change(&mut graph, 0, 0);
        instrument.note_on(&mut graph, 0, 5, 100);
        assert_eq!(heard(&mut graph, sink), 15.0);
    }

    #[test]
    fn sine_voice_scales_by_velocity() {
        let mut graph = Graph::new(400, 64);
        let voice = sine_voice(&mut graph, 69, 127).unwrap();
        let sink = listen(&mut graph, &voice);
        // 440 Hz at 400 Hz sampling: the phase steps 1.1 turns per frame.
        assert_eq!(heard(&mut graph, sink), 0.0);
        let second = heard(&mut graph, sink);
        assert!((second - (0.1 * core::f32::consts::TAU).sin()).abs() < 1e-4);
    }

    #[test]
    fn player_gives_each_track_an_instrument() {
        let mut graph = Graph::new(100, 64);
        // 60 bpm at 100 Hz with 4 ticks per beat: one MIDI tick is 25 samples.
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let note_on = |note| MidiMessage::NoteOn { channel: 0, note, velocity: 100 };
        let note_off = |note| MidiMessage::NoteOff { channel: 0, note, velocity: 0 };
        let file = MidiFile {
            header: MidiHeader {
                format_type: 1,
                track_count: 2,
                ticks_per_beat: 4,
            },
            tracks: vec![
                vec![MidiEvent::new(0, note_on(60)), MidiEvent::new(8, MidiMessage::EndOfTrack)],
                vec![MidiEvent::new(4, note_on(64)), MidiEvent::new(4, note_off(64))],
            ],
        };

        let mut built = Vec::new();
        let player = MidiPlayer::new(&mut graph, &file, |graph, track| {
            built.push(track);
            MidiInstrument::new(graph, level_voice)
        })
        .unwrap();
        assert_eq!(built, vec![0, 1]);
        assert_eq!(player.num_tracks(), 2);

        let sink = listen(&mut graph, &player);
        let ids = player.play(&mut scheduler);
        assert_eq!(ids.len(), 2);

        let mut run = |graph: &mut Graph, samples| {
            for _ in 0..samples {
                scheduler.tick(graph);
            }
        };
        run(&mut graph, 50);
        assert_eq!(heard(&mut graph, sink), 60.0);
        run(&mut graph, 100);
        assert_eq!(heard(&mut graph, sink), 124.0);
        run(&mut graph, 100);
        assert_eq!(heard(&mut graph, sink), 60.0);
    }
}
