//! Error taxonomy for the orchestra core
//!
//! Configuration and library-load failures are fatal at startup; a runtime
//! port failure is contained to the track that owns the failing channel.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the orchestra core.
#[derive(Debug, Error)]
pub enum OrchestraError {
    /// Invalid startup parameter (track count, channel number, step chance).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The pattern directory contained no loadable MIDI files.
    #[error("no MIDI patterns found in {}", .0.display())]
    EmptyLibrary(PathBuf),

    /// A pattern file failed to parse as a Standard MIDI File.
    ///
    /// Library load is all-or-nothing: one malformed file aborts startup.
    #[error("malformed pattern file {}: {message}", .path.display())]
    MalformedPattern { path: PathBuf, message: String },

    /// No physical MIDI output ports were available while tracks were requested.
    #[error("no MIDI output ports available ({requested} track(s) requested)")]
    NoOutputPorts { requested: usize },

    /// Enumerate/open/send/reset failure on a specific port.
    ///
    /// Fatal during startup; at runtime it terminates only the owning track.
    #[error("MIDI I/O failure on port {port}: {message}")]
    PortIo { port: String, message: String },

    /// Filesystem failure while reading the pattern directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
