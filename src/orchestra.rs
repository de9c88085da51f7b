//! Central decision loop
//!
//! The orchestra owns every track player, the per-track current pattern
//! indices, and the shared completion queue. Whenever a track reports that
//! it finished a pattern, the orchestra draws from its random source and
//! either repeats the track's pattern or steps it forward by one.

use crate::error::OrchestraError;
use crate::library::PatternLibrary;
use crate::port::{Allocation, SharedSink};
use crate::track::{CompletionEvent, TrackPlayer};
use rand::{Rng, RngCore};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, info, warn};

/// Message consumed by the orchestra's decision loop.
///
/// Tracks produce `Completed`; `Shutdown` is the sentinel posted by an
/// [`OrchestraHandle`] to unblock the loop for orderly teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestraMessage {
    Completed(CompletionEvent),
    Shutdown,
}

/// Lifecycle of the orchestra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestraState {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

/// Tunables of the advance rule.
#[derive(Debug, Clone)]
pub struct AdvanceConfig {
    /// Probability that a finishing track steps to its next pattern.
    pub step_chance: f64,
    /// Track that always repeats, acting as the steady rhythmic reference.
    /// `None` lets every track advance stochastically.
    pub pulse_track: Option<usize>,
}

impl Default for AdvanceConfig {
    fn default() -> Self {
        Self {
            step_chance: 0.1,
            pulse_track: Some(0),
        }
    }
}

/// Requests shutdown of a running orchestra from another thread.
#[derive(Clone)]
pub struct OrchestraHandle {
    sender: Sender<OrchestraMessage>,
}

impl OrchestraHandle {
    /// Post the shutdown sentinel. Idempotent; safe after the loop exited.
    pub fn shutdown(&self) {
        let _ = self.sender.send(OrchestraMessage::Shutdown);
    }
}

/// Owns the players, the pattern index state and the completion queue.
pub struct Orchestra {
    state: OrchestraState,
    library: PatternLibrary,
    players: Vec<TrackPlayer>,
    /// Current pattern index per track; `None` until seeded. May point past
    /// the end of the library, in which case the track runs dry.
    current: Vec<Option<usize>>,
    completions: Receiver<OrchestraMessage>,
    config: AdvanceConfig,
    rng: Box<dyn RngCore + Send>,
}

impl Orchestra {
    /// Build one player per granted track of `allocation`, wiring all of
    /// them to the shared completion queue.
    ///
    /// `ports` must hold at least `allocation.ports_used` opened handles,
    /// indexed the way the allocation's assignments reference them.
    pub fn new(
        library: PatternLibrary,
        allocation: Allocation,
        ports: Vec<SharedSink>,
        config: AdvanceConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<(Self, OrchestraHandle), OrchestraError> {
        if ports.len() < allocation.ports_used {
            return Err(OrchestraError::Configuration(format!(
                "allocation uses {} port(s) but only {} were opened",
                allocation.ports_used,
                ports.len()
            )));
        }
        if !(0.0..=1.0).contains(&config.step_chance) {
            return Err(OrchestraError::Configuration(format!(
                "step chance must be within 0.0..=1.0 ({} given)",
                config.step_chance
            )));
        }

        if allocation.is_short() {
            warn!(
                "Starting only {} of the {} requested tracks: {} output port(s) available, \
                 {} needed (16 channels per port)",
                allocation.granted,
                allocation.requested,
                allocation.ports_available,
                allocation.ports_needed
            );
        }

        let (sender, completions) = channel();
        let mut players = Vec::with_capacity(allocation.granted);
        for assignment in &allocation.assignments {
            players.push(TrackPlayer::spawn(
                assignment.track,
                assignment.channel,
                ports[assignment.port].clone(),
                sender.clone(),
            )?);
        }

        let current = vec![None; players.len()];
        let orchestra = Self {
            state: OrchestraState::Initializing,
            library,
            players,
            current,
            completions,
            config,
            rng,
        };
        Ok((orchestra, OrchestraHandle { sender }))
    }

    pub fn state(&self) -> OrchestraState {
        self.state
    }

    pub fn track_count(&self) -> usize {
        self.players.len()
    }

    /// The stored pattern index for `track`; may exceed the library size
    /// once the track has run dry.
    pub fn current_index(&self, track: usize) -> Option<usize> {
        self.current.get(track).copied().flatten()
    }

    /// Seed every track and transition to `Running`.
    ///
    /// Track 0 starts at pattern 0 and acts as the steady pulse; every
    /// other track starts pre-advanced at pattern 1.
    pub fn start(&mut self) {
        if self.state != OrchestraState::Initializing {
            return;
        }
        self.queue_pattern(0, 0);
        for track in 1..self.players.len() {
            self.queue_pattern(track, 1);
        }
        self.state = OrchestraState::Running;
        info!(
            "Orchestra running: {} track(s), {} pattern(s)",
            self.players.len(),
            self.library.len()
        );
    }

    /// Run the decision loop until shutdown, then drain and join every
    /// track. Returns the stopped orchestra for inspection.
    pub fn run(mut self) -> Self {
        self.start();

        while let Ok(message) = self.completions.recv() {
            match message {
                OrchestraMessage::Completed(event) => self.advance_track(event.track),
                OrchestraMessage::Shutdown => break,
            }
        }

        self.state = OrchestraState::Stopping;
        for player in &self.players {
            player.stop();
        }
        for player in &mut self.players {
            player.join();
        }
        self.state = OrchestraState::Stopped;
        info!("Orchestra stopped");
        self
    }

    /// Decide the next pattern for a track that just finished one.
    fn advance_track(&mut self, track: usize) {
        if track >= self.players.len() {
            warn!("Completion event for unknown track {}", track);
            return;
        }
        if self.config.pulse_track == Some(track) {
            self.step_track(track, 0);
            return;
        }
        if self.rng.gen::<f64>() < self.config.step_chance {
            self.step_track(track, 1);
        } else {
            self.step_track(track, 0);
        }
    }

    fn step_track(&mut self, track: usize, step: usize) {
        let current = match self.current[track] {
            Some(index) => index,
            None => {
                warn!("Track {} completed before being seeded", track);
                return;
            }
        };
        if step > 0 {
            info!("Track {}: {} > {}", track, current, current + step);
        }
        self.queue_pattern(track, current + step);
    }

    /// Record `index` as the track's current pattern and enqueue it if it
    /// exists. An out-of-range index leaves the track dry on this cycle but
    /// still advances the stored index, so later steps keep counting up
    /// from the overflow point.
    fn queue_pattern(&mut self, track: usize, index: usize) {
        self.current[track] = Some(index);
        match self.library.get(index) {
            Some(pattern) => self.players[track].enqueue(pattern.clone()),
            None => debug!(
                "Track {}: pattern index {} is past the library ({} patterns), running dry",
                track,
                index,
                self.library.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MidiEvent;
    use crate::pattern::{Pattern, TimedEvent};
    use crate::port::{allocate, MidiSink};
    use rand::rngs::mock::StepRng;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct NullSink;

    impl MidiSink for NullSink {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), OrchestraError> {
            Ok(())
        }

        fn reset(&mut self) -> Result<(), OrchestraError> {
            Ok(())
        }
    }

    fn test_library(size: usize) -> PatternLibrary {
        let patterns = (0..size)
            .map(|i| {
                Arc::new(Pattern::new(
                    format!("p{i}"),
                    vec![TimedEvent {
                        delta: Duration::ZERO,
                        event: MidiEvent::NoteOn {
                            channel: 0,
                            note: 60 + i as u8,
                            velocity: 100,
                        },
                    }],
                ))
            })
            .collect();
        PatternLibrary::from_patterns(patterns).unwrap()
    }

    fn test_orchestra(
        tracks: usize,
        library_size: usize,
        config: AdvanceConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> (Orchestra, OrchestraHandle) {
        let allocation = allocate(tracks, 1).unwrap();
        let port: SharedSink = Arc::new(Mutex::new(NullSink));
        Orchestra::new(test_library(library_size), allocation, vec![port], config, rng).unwrap()
    }

    /// Always below any positive step chance.
    fn always_step_rng() -> Box<dyn RngCore + Send> {
        Box::new(StepRng::new(0, 0))
    }

    /// Always at the top of the unit interval, never below the chance.
    fn never_step_rng() -> Box<dyn RngCore + Send> {
        Box::new(StepRng::new(u64::MAX, 0))
    }

    #[test]
    fn test_initial_state_and_seeding() {
        let (mut orchestra, _handle) =
            test_orchestra(3, 4, AdvanceConfig::default(), always_step_rng());
        assert_eq!(orchestra.state(), OrchestraState::Initializing);
        assert_eq!(orchestra.current_index(0), None);

        orchestra.start();
        assert_eq!(orchestra.state(), OrchestraState::Running);
        assert_eq!(orchestra.current_index(0), Some(0));
        assert_eq!(orchestra.current_index(1), Some(1));
        assert_eq!(orchestra.current_index(2), Some(1));
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut orchestra, _handle) =
            test_orchestra(2, 4, AdvanceConfig::default(), always_step_rng());
        orchestra.start();
        orchestra.start();
        assert_eq!(orchestra.state(), OrchestraState::Running);
    }

    #[test]
    fn test_pulse_track_always_repeats() {
        let (mut orchestra, _handle) =
            test_orchestra(2, 4, AdvanceConfig::default(), always_step_rng());
        orchestra.start();

        for _ in 0..5 {
            orchestra.advance_track(0);
        }
        assert_eq!(orchestra.current_index(0), Some(0));
    }

    #[test]
    fn test_stochastic_step_and_repeat() {
        let (mut orchestra, _handle) =
            test_orchestra(2, 4, AdvanceConfig::default(), always_step_rng());
        orchestra.start();

        orchestra.advance_track(1);
        assert_eq!(orchestra.current_index(1), Some(2));

        let (mut orchestra, _handle) =
            test_orchestra(2, 4, AdvanceConfig::default(), never_step_rng());
        orchestra.start();

        orchestra.advance_track(1);
        assert_eq!(orchestra.current_index(1), Some(1));
    }

    #[test]
    fn test_overflow_keeps_counting() {
        let config = AdvanceConfig {
            step_chance: 1.0,
            pulse_track: None,
        };
        let (mut orchestra, _handle) = test_orchestra(1, 2, config, always_step_rng());
        orchestra.start();
        assert_eq!(orchestra.current_index(0), Some(0));

        orchestra.advance_track(0);
        assert_eq!(orchestra.current_index(0), Some(1));
        // Index 2 is past the 2-pattern library: the track runs dry but the
        // stored index keeps advancing on further step decisions.
        orchestra.advance_track(0);
        assert_eq!(orchestra.current_index(0), Some(2));
        orchestra.advance_track(0);
        assert_eq!(orchestra.current_index(0), Some(3));
    }

    #[test]
    fn test_shutdown_reaches_stopped() {
        let (orchestra, handle) =
            test_orchestra(2, 4, AdvanceConfig::default(), never_step_rng());
        handle.shutdown();
        let orchestra = orchestra.run();
        assert_eq!(orchestra.state(), OrchestraState::Stopped);
    }

    #[test]
    fn test_rejects_invalid_step_chance() {
        let allocation = allocate(1, 1).unwrap();
        let port: SharedSink = Arc::new(Mutex::new(NullSink));
        let config = AdvanceConfig {
            step_chance: 1.5,
            pulse_track: None,
        };
        assert!(matches!(
            Orchestra::new(
                test_library(1),
                allocation,
                vec![port],
                config,
                always_step_rng()
            ),
            Err(OrchestraError::Configuration(_))
        ));
    }
}
