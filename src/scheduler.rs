//! Sample-accurate event scheduling in musical time.
//!
//! The [`Scheduler`] keeps a clock that advances one sample per
//! [`tick`](Scheduler::tick) and converts beats to samples from the tempo.
//! Events are kept in a [`PriorityQueue`] keyed by the sample they are due at;
//! every tick pops and fires whatever has come due.
//!
//! Callbacks get the graph and the scheduler itself, so they can change
//! parameters, rewire nodes or schedule further events.
//!
//! ```
//! use schall::{Graph, Scheduler};
//!
//! let mut graph = Graph::new(44_100, 1024);
//! let mut scheduler = Scheduler::new(44_100, 120.0, 4);
//! scheduler.add_relative(1.0, |_graph, scheduler| {
//!     assert_eq!(scheduler.time(), 22_050);
//! });
//!
//! for _ in 0..22_050 {
//!     scheduler.tick(&mut graph);
//! }
//! assert!(scheduler.is_empty());
//! ```

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::pattern::Item;
use crate::queue::PriorityQueue;

/// Handle to a scheduled event, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId(u64);

type Callback = Box<dyn FnMut(&mut Graph, &mut Scheduler) + Send>;
type PatternCallback = Box<dyn FnMut(&mut Graph, &mut Scheduler, &[f64]) + Send>;

enum Action {
    Once(Callback),
    Repeat {
        patterns: Vec<Item<f64>>,
        duration: Item<f64>,
        callback: PatternCallback,
        values: Vec<f64>,
    },
}

struct Event {
    id: EventId,
    /// Due time in samples
    time: f64,
    action: Action,
}

fn earlier(a: &Event, b: &Event) -> bool {
    a.time < b.time
}

/// Beat clock plus a queue of timed callbacks.
pub struct Scheduler {
    queue: PriorityQueue<Event>,
    next_id: u64,
    current: Option<EventId>,
    cancel_current: bool,

    sample_rate: u32,
    bpm: f64,
    beat_length: f64,
    beats_per_bar: u32,

    time: u64,
    seconds: f64,
    beat: u64,
    beat_in_bar: u32,
    bar: u64,
    last_beat_time: f64,
}

impl Scheduler {
    pub fn new(sample_rate: u32, bpm: f64, beats_per_bar: u32) -> Self {
        Self {
            queue: PriorityQueue::with_compare(earlier as fn(&Event, &Event) -> bool),
            next_id: 0,
            current: None,
            cancel_current: false,
            sample_rate,
            bpm,
            beat_length: beat_length(bpm, sample_rate),
            beats_per_bar: beats_per_bar.max(1),
            time: 0,
            seconds: 0.0,
            beat: 0,
            beat_in_bar: 0,
            bar: 0,
            last_beat_time: 0.0,
        }
    }

    /// Samples elapsed.
    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    #[inline]
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Beats elapsed.
    #[inline]
    pub fn beat(&self) -> u64 {
        self.beat
    }

    /// Position of the current beat within its bar, from 0.
    #[inline]
    pub fn beat_in_bar(&self) -> u32 {
        self.beat_in_bar
    }

    #[inline]
    pub fn bar(&self) -> u64 {
        self.bar
    }

    #[inline]
    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Length of one beat in samples.
    #[inline]
    pub fn beat_length(&self) -> f64 {
        self.beat_length
    }

    /// Sample time at which the current beat started.
    #[inline]
    pub fn last_beat_time(&self) -> f64 {
        self.last_beat_time
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Change the tempo. Events already queued keep their sample times.
    ///
    /// A tempo that is not a positive, finite number is rejected and the
    /// clock keeps its current tempo.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidConfig(format!("tempo {bpm} bpm is not usable")));
        }
        self.bpm = bpm;
        self.beat_length = beat_length(bpm, self.sample_rate);
        debug!(bpm, beat_length = self.beat_length, "tempo changed");
        Ok(())
    }

    /// Advance the clock by one sample and fire every event that is due.
    pub fn tick(&mut self, graph: &mut Graph) {
        self.time += 1;
        self.seconds = self.time as f64 / self.sample_rate as f64;

        if self.time as f64 >= self.last_beat_time + self.beat_length {
            self.beat += 1;
            self.beat_in_bar += 1;
            if self.beat_in_bar >= self.beats_per_bar {
                self.bar += 1;
                self.beat_in_bar = 0;
            }
            self.last_beat_time += self.beat_length;
        }

        let now = self.time as f64;
        while self.queue.peek().is_some_and(|event| event.time <= now) {
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.fire(graph, event);
        }
    }

    /// Call `callback` once, `beats` beats from now.
    pub fn add_relative(
        &mut self,
        beats: f64,
        callback: impl FnMut(&mut Graph, &mut Scheduler) + Send + 'static,
    ) -> EventId {
        let time = self.time as f64 + beats * self.beat_length;
        self.push(time, Action::Once(Box::new(callback)))
    }

    /// Call `callback` once, at the start of beat number `beat`.
    ///
    /// Returns `None` if that beat has already started.
    pub fn add_absolute(
        &mut self,
        beat: f64,
        callback: impl FnMut(&mut Graph, &mut Scheduler) + Send + 'static,
    ) -> Option<EventId> {
        let time = self.absolute_time(beat)?;
        Some(self.push(time, Action::Once(Box::new(callback))))
    }

    /// Repeatedly draw one value from each of `patterns` and pass them to
    /// `callback`, starting on the next tick.
    ///
    /// After each call the next firing is `duration` beats later, where
    /// `duration` is a constant or a pattern of beat lengths. The event ends
    /// as soon as any pattern, or the duration, is exhausted; a duration of
    /// zero or less ends it too.
    pub fn play(
        &mut self,
        patterns: Vec<Item<f64>>,
        duration: impl Into<Item<f64>>,
        callback: impl FnMut(&mut Graph, &mut Scheduler, &[f64]) + Send + 'static,
    ) -> EventId {
        let time = self.time as f64;
        self.push(time, repeat(patterns, duration.into(), callback))
    }

    /// Like [`play`](Self::play), but starting at the beginning of beat
    /// `beat`. Returns `None` if that beat has already started.
    pub fn play_absolute(
        &mut self,
        beat: f64,
        patterns: Vec<Item<f64>>,
        duration: impl Into<Item<f64>>,
        callback: impl FnMut(&mut Graph, &mut Scheduler, &[f64]) + Send + 'static,
    ) -> Option<EventId> {
        let time = self.absolute_time(beat)?;
        Some(self.push(time, repeat(patterns, duration.into(), callback)))
    }

    /// Cancel an event. Returns whether anything was cancelled.
    ///
    /// Works from inside the event's own callback, in which case the event is
    /// not rescheduled.
    pub fn remove(&mut self, id: EventId) -> bool {
        let removed = self.queue.retain(|event| event.id != id) > 0;
        if self.current == Some(id) {
            self.cancel_current = true;
            return true;
        }
        removed
    }

    pub fn stop(&mut self, id: EventId) -> bool {
        self.remove(id)
    }

    /// Stop the event whose callback is running from being rescheduled.
    pub fn cancel_current(&mut self) {
        self.cancel_current = true;
    }

    /// Whether `id` is waiting in the queue, or running and not cancelled.
    pub fn is_scheduled(&self, id: EventId) -> bool {
        (self.current == Some(id) && !self.cancel_current)
            || self.queue.iter().any(|event| event.id == id)
    }

    fn absolute_time(&self, beat: f64) -> Option<f64> {
        let current = self.beat as f64;
        if beat < current || (beat == current && self.time as f64 > self.last_beat_time) {
            debug!(beat, current, "beat already started, not scheduling");
            return None;
        }
        Some(self.last_beat_time + (beat - current) * self.beat_length)
    }

    fn push(&mut self, time: f64, action: Action) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.queue.push(Event { id, time, action });
        id
    }

    fn fire(&mut self, graph: &mut Graph, event: Event) {
        let Event { id, time, action } = event;
        self.current = Some(id);
        self.cancel_current = false;

        match action {
            Action::Once(mut callback) => callback(graph, self),
            Action::Repeat {
                mut patterns,
                mut duration,
                mut callback,
                mut values,
            } => {
                values.clear();
                for pattern in &mut patterns {
                    match pattern.value() {
                        Some(value) => values.push(value),
                        None => {
                            self.current = None;
                            return;
                        }
                    }
                }

                callback(graph, self, &values);

                if !self.cancel_current {
                    if let Some(beats) = duration.value().filter(|beats| *beats > 0.0) {
                        let action = Action::Repeat {
                            patterns,
                            duration,
                            callback,
                            values,
                        };
                        self.queue.push(Event {
                            id,
                            time: time + beats * self.beat_length,
                            action,
                        });
                    }
                }
            }
        }

        self.current = None;
        self.cancel_current = false;
    }
}

fn repeat(
    patterns: Vec<Item<f64>>,
    duration: Item<f64>,
    callback: impl FnMut(&mut Graph, &mut Scheduler, &[f64]) + Send + 'static,
) -> Action {
    Action::Repeat {
        values: Vec::with_capacity(patterns.len()),
        patterns,
        duration,
        callback: Box::new(callback),
    }
}

fn beat_length(bpm: f64, sample_rate: u32) -> f64 {
    60.0 / bpm * sample_rate as f64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::pattern::{Sequence, Series};

    fn log() -> (Arc<Mutex<Vec<u64>>>, Arc<Mutex<Vec<u64>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Arc::clone(&log), log)
    }

    fn run(scheduler: &mut Scheduler, graph: &mut Graph, samples: u64) {
        for _ in 0..samples {
            scheduler.tick(graph);
        }
    }

    #[test]
    fn relative_event_fires_on_its_sample() {
        let mut graph = Graph::new(44_100, 64);
        let mut scheduler = Scheduler::new(44_100, 120.0, 4);
        let (writer, fired) = log();
        scheduler.add_relative(2.0, move |_, s| writer.lock().push(s.time()));

        run(&mut scheduler, &mut graph, 44_099);
        assert!(fired.lock().is_empty());
        run(&mut scheduler, &mut graph, 1);
        assert_eq!(*fired.lock(), vec![44_100]);
    }

    #[test]
    fn beats_roll_into_bars() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 3);
        run(&mut scheduler, &mut graph, 99);
        assert_eq!((scheduler.beat(), scheduler.bar()), (0, 0));
        run(&mut scheduler, &mut graph, 1);
        assert_eq!((scheduler.beat(), scheduler.beat_in_bar()), (1, 1));
        run(&mut scheduler, &mut graph, 200);
        assert_eq!(scheduler.beat(), 3);
        assert_eq!(scheduler.beat_in_bar(), 0);
        assert_eq!(scheduler.bar(), 1);
        assert_eq!(scheduler.seconds(), 3.0);
    }

    #[test]
    fn absolute_events_in_the_past_are_rejected() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        assert!(scheduler.add_absolute(0.0, |_, _| {}).is_some());
        run(&mut scheduler, &mut graph, 150);
        assert!(scheduler.add_absolute(0.0, |_, _| {}).is_none());
        assert!(scheduler.add_absolute(1.0, |_, _| {}).is_none());

        let (writer, fired) = log();
        assert!(scheduler
            .add_absolute(3.0, move |_, s| writer.lock().push(s.time()))
            .is_some());
        run(&mut scheduler, &mut graph, 200);
        assert_eq!(*fired.lock(), vec![300]);
    }

    #[test]
    fn play_absolute_starts_on_a_future_beat() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        run(&mut scheduler, &mut graph, 150);

        let pattern = || vec![Item::pattern(Sequence::from_values([5.0, 6.0], 1))];
        assert!(scheduler.play_absolute(0.5, pattern(), 0.5, |_, _, _| {}).is_none());
        assert!(scheduler.play_absolute(1.0, pattern(), 0.5, |_, _, _| {}).is_none());
        assert!(scheduler.is_empty());

        let fired = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&fired);
        let id = scheduler
            .play_absolute(3.0, pattern(), 0.5, move |_, s, drawn| {
                writer.lock().push((s.time(), drawn[0]));
            })
            .unwrap();

        run(&mut scheduler, &mut graph, 149);
        assert!(fired.lock().is_empty());
        run(&mut scheduler, &mut graph, 151);
        assert_eq!(*fired.lock(), vec![(300, 5.0), (350, 6.0)]);
        assert!(!scheduler.is_scheduled(id));
    }

    #[test]
    fn exhausted_pattern_ends_the_event() {
        let mut graph = Graph::new(44_100, 64);
        let mut scheduler = Scheduler::new(44_100, 120.0, 4);
        let values = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&values);
        let id = scheduler.play(
            vec![Item::pattern(Sequence::from_values([1.0, 2.0], 1))],
            1.0,
            move |_, _, drawn| writer.lock().push(drawn[0]),
        );

        run(&mut scheduler, &mut graph, 22_050 * 4);
        assert_eq!(*values.lock(), vec![1.0, 2.0]);
        assert!(!scheduler.is_scheduled(id));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn duration_pattern_sets_spacing() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let (writer, fired) = log();
        scheduler.play(
            vec![Item::Value(0.0)],
            Item::pattern(Series::from_values([1.0, 0.5], 3)),
            move |_, s, _| writer.lock().push(s.time()),
        );

        run(&mut scheduler, &mut graph, 1000);
        assert_eq!(*fired.lock(), vec![1, 100, 150, 250]);
    }

    #[test]
    fn events_can_be_cancelled() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let (writer, fired) = log();
        let id = scheduler.add_relative(1.0, move |_, s| writer.lock().push(s.time()));
        assert!(scheduler.is_scheduled(id));
        assert!(scheduler.stop(id));
        assert!(!scheduler.stop(id));
        run(&mut scheduler, &mut graph, 200);
        assert!(fired.lock().is_empty());
    }

    #[test]
    fn repeating_event_can_stop_itself() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let (writer, fired) = log();
        scheduler.play(Vec::new(), 0.1, move |_, s, _| {
            let mut fired = writer.lock();
            fired.push(s.time());
            if fired.len() == 3 {
                s.cancel_current();
            }
        });
        run(&mut scheduler, &mut graph, 500);
        assert_eq!(*fired.lock(), vec![1, 10, 20]);
    }

    #[test]
    fn callbacks_can_schedule_more_events() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let (writer, fired) = log();
        scheduler.add_relative(1.0, move |_, s| {
            let writer = Arc::clone(&writer);
            s.add_relative(0.5, move |_, s| writer.lock().push(s.time()));
        });
        run(&mut scheduler, &mut graph, 200);
        assert_eq!(*fired.lock(), vec![150]);
    }

    #[test]
    fn tempo_change_rescales_beats() {
        let mut scheduler = Scheduler::new(44_100, 120.0, 4);
        assert_eq!(scheduler.beat_length(), 22_050.0);
        scheduler.set_tempo(60.0).unwrap();
        assert_eq!(scheduler.beat_length(), 44_100.0);
    }

    #[test]
    fn unusable_tempos_are_rejected() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        for bpm in [0.0, -120.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(scheduler.set_tempo(bpm), Err(Error::InvalidConfig(_))));
        }
        assert_eq!(scheduler.bpm(), 60.0);
        assert_eq!(scheduler.beat_length(), 100.0);

        run(&mut scheduler, &mut graph, 250);
        assert_eq!(scheduler.beat(), 2);
    }
}
