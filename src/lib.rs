//! # Orchestrion — a generative multi-track MIDI pattern orchestra
//!
//! Orchestrion loads a library of short MIDI patterns, assigns each logical
//! track to a channel of a physical MIDI output port, and plays patterns on
//! every track forever, deciding each track's next pattern with a stochastic
//! advance rule whenever the track finishes one.
//!
//! ## Architecture
//!
//! - [`library`] — loads and naturally sorts the pattern files; patterns are
//!   immutable and shared across tracks
//! - [`port`] — maps tracks onto output ports (16 channels each) and wraps
//!   the `midir` device layer behind the [`port::MidiSink`] trait
//! - [`track`] — one playback thread per track, consuming a private queue
//!   and reporting completions
//! - [`orchestra`] — the decision loop: seeds every track, then repeats or
//!   advances a track each time it completes a pattern
//!
//! ## Quick start
//!
//! ```no_run
//! use orchestrion::{
//!     allocate, open_ports, output_ports, AdvanceConfig, Orchestra, PatternLibrary,
//! };
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), orchestrion::OrchestraError> {
//! let library = PatternLibrary::load(Path::new("patterns"))?;
//! let descriptors = output_ports(Some("loopMIDI"))?;
//! let allocation = allocate(8, descriptors.len())?;
//! let ports = open_ports(&descriptors, allocation.ports_used)?;
//!
//! let rng = Box::new(StdRng::from_entropy());
//! let (orchestra, handle) =
//!     Orchestra::new(library, allocation, ports, AdvanceConfig::default(), rng)?;
//!
//! let runner = std::thread::spawn(move || orchestra.run());
//! // ... later:
//! handle.shutdown();
//! runner.join().unwrap();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod library;
pub mod orchestra;
pub mod pattern;
pub mod port;
pub mod track;

pub use error::OrchestraError;
pub use event::MidiEvent;
pub use library::{natural_cmp, PatternLibrary};
pub use orchestra::{
    AdvanceConfig, Orchestra, OrchestraHandle, OrchestraMessage, OrchestraState,
};
pub use pattern::{Pattern, TimedEvent};
pub use port::{
    allocate, open_ports, output_ports, Allocation, ChannelAssignment, MidiPortDescriptor,
    MidiSink, MidirSink, SharedSink, CHANNELS_PER_PORT,
};
pub use track::{CompletionEvent, TrackPlayer};
