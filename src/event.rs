//! MIDI channel voice messages
//!
//! Only sounding events live here: meta and system-exclusive content is
//! stripped at library-load time and never reaches playback.

/// A channel voice message, ready to be stamped onto a track's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    Aftertouch {
        channel: u8,
        note: u8,
        pressure: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    /// 14-bit pitch bend, 0x2000 is center.
    PitchBend {
        channel: u8,
        value: u16,
    },
}

impl MidiEvent {
    /// The channel this event is currently addressed to.
    pub fn channel(&self) -> u8 {
        match self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::Aftertouch { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::ProgramChange { channel, .. }
            | MidiEvent::ChannelPressure { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => *channel,
        }
    }

    /// Returns a copy of this event stamped onto `channel`.
    ///
    /// Patterns are shared read-only across tracks, so stamping always
    /// produces a copy instead of mutating the stored event.
    pub fn with_channel(mut self, channel: u8) -> Self {
        match &mut self {
            MidiEvent::NoteOn { channel: c, .. }
            | MidiEvent::NoteOff { channel: c, .. }
            | MidiEvent::Aftertouch { channel: c, .. }
            | MidiEvent::ControlChange { channel: c, .. }
            | MidiEvent::ProgramChange { channel: c, .. }
            | MidiEvent::ChannelPressure { channel: c, .. }
            | MidiEvent::PitchBend { channel: c, .. } => *c = channel,
        }
        self
    }

    /// Convert to raw MIDI bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => {
                vec![0x90 | (channel & 0x0F), *note & 0x7F, *velocity & 0x7F]
            }
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => {
                vec![0x80 | (channel & 0x0F), *note & 0x7F, *velocity & 0x7F]
            }
            MidiEvent::Aftertouch {
                channel,
                note,
                pressure,
            } => {
                vec![0xA0 | (channel & 0x0F), *note & 0x7F, *pressure & 0x7F]
            }
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => {
                vec![0xB0 | (channel & 0x0F), *controller & 0x7F, *value & 0x7F]
            }
            MidiEvent::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), *program & 0x7F]
            }
            MidiEvent::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), *pressure & 0x7F]
            }
            MidiEvent::PitchBend { channel, value } => {
                let value = *value & 0x3FFF;
                vec![
                    0xE0 | (channel & 0x0F),
                    (value & 0x7F) as u8,
                    ((value >> 7) & 0x7F) as u8,
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_encoding() {
        let on = MidiEvent::NoteOn {
            channel: 3,
            note: 60,
            velocity: 100,
        };
        assert_eq!(on.to_bytes(), vec![0x93, 60, 100]);

        let off = MidiEvent::NoteOff {
            channel: 3,
            note: 60,
            velocity: 0,
        };
        assert_eq!(off.to_bytes(), vec![0x83, 60, 0]);
    }

    #[test]
    fn test_control_and_program_encoding() {
        let cc = MidiEvent::ControlChange {
            channel: 0,
            controller: 123,
            value: 0,
        };
        assert_eq!(cc.to_bytes(), vec![0xB0, 123, 0]);

        let pc = MidiEvent::ProgramChange {
            channel: 9,
            program: 40,
        };
        assert_eq!(pc.to_bytes(), vec![0xC9, 40]);
    }

    #[test]
    fn test_pitch_bend_encoding() {
        let center = MidiEvent::PitchBend {
            channel: 1,
            value: 0x2000,
        };
        // LSB first, then MSB
        assert_eq!(center.to_bytes(), vec![0xE1, 0x00, 0x40]);

        let max = MidiEvent::PitchBend {
            channel: 1,
            value: 0x3FFF,
        };
        assert_eq!(max.to_bytes(), vec![0xE1, 0x7F, 0x7F]);
    }

    #[test]
    fn test_with_channel_stamps_every_variant() {
        let events = [
            MidiEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 90,
            },
            MidiEvent::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0,
            },
            MidiEvent::Aftertouch {
                channel: 0,
                note: 60,
                pressure: 30,
            },
            MidiEvent::ControlChange {
                channel: 0,
                controller: 1,
                value: 64,
            },
            MidiEvent::ProgramChange {
                channel: 0,
                program: 5,
            },
            MidiEvent::ChannelPressure {
                channel: 0,
                pressure: 10,
            },
            MidiEvent::PitchBend {
                channel: 0,
                value: 0x2000,
            },
        ];

        for event in events {
            let stamped = event.with_channel(7);
            assert_eq!(stamped.channel(), 7);
            assert_eq!(stamped.to_bytes()[0] & 0x0F, 7);
        }
    }
}
