//! MIDI output ports and track-to-channel allocation
//!
//! Each physical output port multiplexes 16 channels, so up to 16 tracks can
//! share one opened device handle. The handle is wrapped in `Arc<Mutex<..>>`
//! so concurrent sends from tracks on the same wire are serialized — MIDI
//! byte streams cannot interleave mid-message.
//!
//! The real device layer is `midir`; the [`MidiSink`] trait keeps the
//! playback engine testable against in-memory fakes.

use crate::error::OrchestraError;
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use std::sync::{Arc, Mutex};

/// Channels multiplexed onto one physical output port.
pub const CHANNELS_PER_PORT: usize = 16;

/// Destination for raw, already-channel-stamped MIDI bytes.
pub trait MidiSink: Send {
    /// Emit one complete MIDI message.
    fn send(&mut self, bytes: &[u8]) -> Result<(), OrchestraError>;

    /// Silence the port: all-notes-off and reset-controllers on every channel.
    fn reset(&mut self) -> Result<(), OrchestraError>;
}

/// A port handle shared by every track assigned to that port.
pub type SharedSink = Arc<Mutex<dyn MidiSink>>;

/// One discovered output port, by name.
#[derive(Clone)]
pub struct MidiPortDescriptor {
    pub name: String,
    port: MidiOutputPort,
}

/// Enumerate MIDI output ports, optionally keeping only those whose name
/// contains `filter` (e.g. a virtual MIDI bus product name).
pub fn output_ports(filter: Option<&str>) -> Result<Vec<MidiPortDescriptor>, OrchestraError> {
    let midi_out = MidiOutput::new("Orchestrion scanner").map_err(|e| OrchestraError::PortIo {
        port: "<none>".to_string(),
        message: e.to_string(),
    })?;

    let mut descriptors = Vec::new();
    for port in midi_out.ports() {
        let name = midi_out
            .port_name(&port)
            .map_err(|e| OrchestraError::PortIo {
                port: "<unnamed>".to_string(),
                message: e.to_string(),
            })?;
        if filter.map_or(true, |f| name.contains(f)) {
            descriptors.push(MidiPortDescriptor { name, port });
        }
    }
    Ok(descriptors)
}

/// Open the first `count` ports, one device handle per distinct port.
pub fn open_ports(
    descriptors: &[MidiPortDescriptor],
    count: usize,
) -> Result<Vec<SharedSink>, OrchestraError> {
    let mut ports: Vec<SharedSink> = Vec::with_capacity(count);
    for descriptor in descriptors.iter().take(count) {
        let sink = MidirSink::open(descriptor)?;
        ports.push(Arc::new(Mutex::new(sink)));
    }
    Ok(ports)
}

/// `midir`-backed sink: one opened connection per physical port.
pub struct MidirSink {
    name: String,
    connection: MidiOutputConnection,
}

impl MidirSink {
    pub fn open(descriptor: &MidiPortDescriptor) -> Result<Self, OrchestraError> {
        let midi_out = MidiOutput::new("Orchestrion output").map_err(|e| {
            OrchestraError::PortIo {
                port: descriptor.name.clone(),
                message: e.to_string(),
            }
        })?;
        let connection = midi_out
            .connect(&descriptor.port, "orchestrion-out")
            .map_err(|e| OrchestraError::PortIo {
                port: descriptor.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            name: descriptor.name.clone(),
            connection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), OrchestraError> {
        self.connection
            .send(bytes)
            .map_err(|e| OrchestraError::PortIo {
                port: self.name.clone(),
                message: e.to_string(),
            })
    }

    fn reset(&mut self) -> Result<(), OrchestraError> {
        for channel in 0..CHANNELS_PER_PORT as u8 {
            // CC 123: all notes off, CC 121: reset all controllers.
            self.send(&[0xB0 | channel, 123, 0])?;
            self.send(&[0xB0 | channel, 121, 0])?;
        }
        Ok(())
    }
}

/// One logical track pinned to a (port, channel) pair for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAssignment {
    pub track: usize,
    pub port: usize,
    pub channel: u8,
}

/// Result of mapping the requested track count onto the available ports.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub requested: usize,
    pub granted: usize,
    pub ports_available: usize,
    /// Ports a full grant would have needed.
    pub ports_needed: usize,
    /// Ports the granted tracks actually occupy; only these get opened.
    pub ports_used: usize,
    pub assignments: Vec<ChannelAssignment>,
}

impl Allocation {
    /// True when fewer tracks were granted than requested.
    pub fn is_short(&self) -> bool {
        self.granted < self.requested
    }
}

/// Map `requested` tracks onto `ports_available` ports, 16 channels each:
/// track i goes to port i/16, channel i%16.
///
/// A shortfall is not an error — the caller runs with fewer tracks and
/// reports the numbers. Zero available ports is an error only because at
/// least one track was requested.
pub fn allocate(requested: usize, ports_available: usize) -> Result<Allocation, OrchestraError> {
    if requested == 0 {
        return Err(OrchestraError::Configuration(
            "track count must be at least 1 (0 given)".to_string(),
        ));
    }
    if ports_available == 0 {
        return Err(OrchestraError::NoOutputPorts { requested });
    }

    let granted = requested.min(ports_available * CHANNELS_PER_PORT);
    let assignments = (0..granted)
        .map(|track| ChannelAssignment {
            track,
            port: track / CHANNELS_PER_PORT,
            channel: (track % CHANNELS_PER_PORT) as u8,
        })
        .collect();

    Ok(Allocation {
        requested,
        granted,
        ports_available,
        ports_needed: (requested - 1) / CHANNELS_PER_PORT + 1,
        ports_used: (granted - 1) / CHANNELS_PER_PORT + 1,
        assignments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_caps_at_sixteen_tracks_per_port() {
        let allocation = allocate(20, 1).unwrap();
        assert_eq!(allocation.granted, 16);
        assert!(allocation.is_short());
        assert_eq!(allocation.ports_needed, 2);
        assert_eq!(allocation.ports_used, 1);
    }

    #[test]
    fn test_allocation_uses_only_needed_ports() {
        let allocation = allocate(10, 2).unwrap();
        assert_eq!(allocation.granted, 10);
        assert!(!allocation.is_short());
        assert_eq!(allocation.ports_used, 1);
        for (i, assignment) in allocation.assignments.iter().enumerate() {
            assert_eq!(assignment.track, i);
            assert_eq!(assignment.port, 0);
            assert_eq!(assignment.channel, i as u8);
        }
    }

    #[test]
    fn test_allocation_wraps_to_second_port() {
        let allocation = allocate(18, 2).unwrap();
        assert_eq!(allocation.granted, 18);
        assert_eq!(allocation.ports_used, 2);
        assert_eq!(
            allocation.assignments[17],
            ChannelAssignment {
                track: 17,
                port: 1,
                channel: 1,
            }
        );
    }

    #[test]
    fn test_allocation_without_ports_fails() {
        match allocate(5, 0) {
            Err(OrchestraError::NoOutputPorts { requested }) => assert_eq!(requested, 5),
            other => panic!("expected NoOutputPorts, got {other:?}"),
        }
    }

    #[test]
    fn test_allocation_requires_at_least_one_track() {
        assert!(matches!(
            allocate(0, 2),
            Err(OrchestraError::Configuration(_))
        ));
    }
}
