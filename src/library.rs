//! Pattern library loader
//!
//! Loads every file of a directory as a Standard MIDI File and exposes the
//! resulting patterns by integer index. Filenames are sorted with a natural
//! (numeric-aware) comparison, so `pattern2` comes before `pattern10` — the
//! index a caller uses is load-bearing and stable for a given directory.
//!
//! Decoding merges all SMF tracks by absolute tick, applies the tempo map to
//! turn tick deltas into wall-clock durations, and strips everything that is
//! not a channel voice message. Load is all-or-nothing: one malformed file
//! aborts startup.

use crate::error::OrchestraError;
use crate::event::MidiEvent;
use crate::pattern::{Pattern, TimedEvent};
use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Microseconds per quarter note when no set-tempo event is present (120 BPM).
const DEFAULT_TEMPO_US: f64 = 500_000.0;

/// Immutable, naturally-ordered collection of patterns.
#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<Arc<Pattern>>,
}

impl PatternLibrary {
    /// Load all pattern files from `dir`.
    ///
    /// Fails with [`OrchestraError::EmptyLibrary`] when the directory holds no
    /// files, and with [`OrchestraError::MalformedPattern`] when any file does
    /// not parse as a Standard MIDI File.
    pub fn load(dir: &Path) -> Result<Self, OrchestraError> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| natural_cmp(&file_label(a), &file_label(b)));

        let mut patterns = Vec::with_capacity(paths.len());
        for path in &paths {
            let bytes = fs::read(path)?;
            let smf = Smf::parse(&bytes).map_err(|e| OrchestraError::MalformedPattern {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let events = decode_events(&smf);
            debug!(
                "Loaded pattern {:?}: {} event(s), {:.3}s",
                file_label(path),
                events.len(),
                events.iter().map(|t| t.delta.as_secs_f64()).sum::<f64>()
            );
            patterns.push(Arc::new(Pattern::new(file_label(path), events)));
        }

        if patterns.is_empty() {
            return Err(OrchestraError::EmptyLibrary(dir.to_path_buf()));
        }
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Pattern>> {
        self.patterns.get(index)
    }

    pub fn patterns(&self) -> &[Arc<Pattern>] {
        &self.patterns
    }

    /// Build a library directly from in-memory patterns.
    ///
    /// Used by tests and embedders that produce patterns without the
    /// filesystem; the given order defines the index space.
    pub fn from_patterns(patterns: Vec<Arc<Pattern>>) -> Result<Self, OrchestraError> {
        if patterns.is_empty() {
            return Err(OrchestraError::EmptyLibrary(PathBuf::new()));
        }
        Ok(Self { patterns })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// One run of a filename under natural comparison: digit runs compare by
/// value, everything else case-insensitively. Numeric runs sort before text
/// runs when a digit and a non-digit meet head-on.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u128),
    Text(String),
}

fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut rest = name;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            let (run, tail) = rest.split_at(digits);
            chunks.push(NaturalChunk::Number(
                run.parse::<u128>().unwrap_or(u128::MAX),
            ));
            rest = tail;
        } else {
            let text = rest.chars().take_while(|c| !c.is_ascii_digit()).count();
            let split = rest
                .char_indices()
                .nth(text)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (run, tail) = rest.split_at(split);
            chunks.push(NaturalChunk::Text(run.to_lowercase()));
            rest = tail;
        }
    }
    chunks
}

/// Numeric-aware filename ordering: `p2` < `p10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Merge all SMF tracks into one stream of wall-clock-timed playable events.
fn decode_events(smf: &Smf) -> Vec<TimedEvent> {
    // Absolute-tick merge across tracks, stable on ties.
    let mut merged: Vec<(u64, usize, TrackEventKind)> = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            merged.push((tick, track_index, event.kind));
        }
    }
    merged.sort_by_key(|&(tick, track_index, _)| (tick, track_index));

    // Metrical timing scales with the running tempo; SMPTE timing is fixed.
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => Some(f64::from(tpb.as_int())),
        Timing::Timecode(..) => None,
    };
    let fixed_secs_per_tick = match smf.header.timing {
        Timing::Timecode(fps, subframe) => {
            Some(1.0 / (f64::from(fps.as_f32()) * f64::from(subframe)))
        }
        Timing::Metrical(_) => None,
    };

    let mut us_per_beat = DEFAULT_TEMPO_US;
    let mut last_tick = 0u64;
    // Time accrued over stripped events carries into the next playable delta.
    let mut pending_secs = 0.0f64;
    let mut events = Vec::new();

    for (tick, _, kind) in merged {
        let delta_ticks = (tick - last_tick) as f64;
        last_tick = tick;
        let secs_per_tick = match (fixed_secs_per_tick, ticks_per_beat) {
            (Some(fixed), _) => fixed,
            (None, Some(tpb)) => us_per_beat / 1_000_000.0 / tpb,
            (None, None) => 0.0,
        };
        pending_secs += delta_ticks * secs_per_tick;

        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                us_per_beat = f64::from(tempo.as_int());
            }
            TrackEventKind::Midi { message, .. } => {
                events.push(TimedEvent {
                    delta: Duration::from_secs_f64(pending_secs),
                    event: convert_message(message),
                });
                pending_secs = 0.0;
            }
            // Other meta, SysEx and escape events are stripped; their time
            // still accrues into pending_secs above.
            _ => {}
        }
    }

    events
}

/// Playable events come out addressed to channel 0; the owning track stamps
/// its own channel at emission time.
fn convert_message(message: midly::MidiMessage) -> MidiEvent {
    match message {
        midly::MidiMessage::NoteOff { key, vel } => MidiEvent::NoteOff {
            channel: 0,
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        midly::MidiMessage::NoteOn { key, vel } => MidiEvent::NoteOn {
            channel: 0,
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        midly::MidiMessage::Aftertouch { key, vel } => MidiEvent::Aftertouch {
            channel: 0,
            note: key.as_int(),
            pressure: vel.as_int(),
        },
        midly::MidiMessage::Controller { controller, value } => MidiEvent::ControlChange {
            channel: 0,
            controller: controller.as_int(),
            value: value.as_int(),
        },
        midly::MidiMessage::ProgramChange { program } => MidiEvent::ProgramChange {
            channel: 0,
            program: program.as_int(),
        },
        midly::MidiMessage::ChannelAftertouch { vel } => MidiEvent::ChannelPressure {
            channel: 0,
            pressure: vel.as_int(),
        },
        midly::MidiMessage::PitchBend { bend } => MidiEvent::PitchBend {
            channel: 0,
            value: bend.0.as_int(),
        },
    }
}
