//! Timed pattern data structures
//!
//! A pattern is a fixed, ordered run of channel voice messages with relative
//! timing. Patterns are immutable after load and shared across tracks as
//! `Arc<Pattern>` — the same pattern may be queued on many tracks at once.

use crate::event::MidiEvent;
use std::time::Duration;

/// One event plus the time to wait since the previous event in the pattern.
///
/// The first event's delta is measured from the start of the pattern, which
/// makes patterns time-shiftable without renormalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub delta: Duration,
    pub event: MidiEvent,
}

/// An ordered, immutable sequence of timed events loaded from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    name: String,
    events: Vec<TimedEvent>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, events: Vec<TimedEvent>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }

    /// Source filename this pattern was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total playback time of the pattern (sum of all deltas).
    pub fn duration(&self) -> Duration {
        self.events.iter().map(|timed| timed.delta).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_duration_sums_deltas() {
        let pattern = Pattern::new(
            "test",
            vec![
                TimedEvent {
                    delta: Duration::from_millis(100),
                    event: MidiEvent::NoteOn {
                        channel: 0,
                        note: 60,
                        velocity: 100,
                    },
                },
                TimedEvent {
                    delta: Duration::from_millis(250),
                    event: MidiEvent::NoteOff {
                        channel: 0,
                        note: 60,
                        velocity: 0,
                    },
                },
            ],
        );

        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.duration(), Duration::from_millis(350));
    }

    #[test]
    fn test_empty_pattern() {
        let pattern = Pattern::new("empty", vec![]);
        assert!(pattern.is_empty());
        assert_eq!(pattern.duration(), Duration::ZERO);
    }
}
