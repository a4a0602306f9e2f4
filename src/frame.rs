//! Frame layout, command decoding, and toggle-based change detection.
//!
//! The RX2164 answers every poll with a fixed 8-byte frame whether or not a
//! new command has arrived. Byte 0 carries a 6-bit rolling counter (the
//! "toggle") that the receiver increments whenever a new radio command is
//! captured; the toggle changing is the only signal that the rest of the
//! frame is fresh.

/// Size of one control-transfer frame returned by the receiver.
pub const FRAME_SIZE: usize = 8;

/// Low six bits of byte 0 carry the rolling toggle counter.
pub const TOGGLE_MASK: u8 = 0b0011_1111;

/// Number of channels the receiver can be bound to.
pub const CHANNEL_CAPACITY: u16 = 64;

/// One raw frame as read from the receiver.
///
/// Byte 0 holds the toggle counter, byte 1 the zero-based channel index,
/// byte 2 the action code. The remaining bytes are reserved.
pub type RawFrame = [u8; FRAME_SIZE];

/// Extract the 6-bit rolling toggle counter from a frame.
///
/// Upper bits of byte 0 are used internally by the transport and masked off.
pub fn toggle(frame: &RawFrame) -> u8 {
    frame[0] & TOGGLE_MASK
}

/// A decoded receiver command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// 1-based channel of the paired transmitter.
    pub channel: u16,
    /// Opaque action code; semantics belong to the consumer.
    pub action: i8,
}

impl Command {
    /// Decode a command from a raw frame.
    ///
    /// No range validation is applied: a channel index above the receiver's
    /// declared capacity passes through unchanged.
    pub fn decode(frame: &RawFrame) -> Self {
        Self {
            channel: frame[1] as u16 + 1,
            action: frame[2] as i8,
        }
    }
}

/// Change detector over the rolling toggle counter.
///
/// Starts with no stored value, so the first observed toggle is always
/// treated as new whatever its value.
#[derive(Debug, Default)]
pub struct ToggleTracker {
    last: Option<u8>,
}

impl ToggleTracker {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Record a toggle reading.
    ///
    /// Returns true when the value differs from the previously stored one
    /// (a new command), false when unchanged. The comparison is plain
    /// inequality: wraparound from 63 to 0 counts as new, and a repeated
    /// value never does, even if the physical event repeated.
    pub fn observe(&mut self, toggle: u8) -> bool {
        if self.last == Some(toggle) {
            return false;
        }
        self.last = Some(toggle);
        true
    }

    /// Last stored toggle value, if any reading has been observed yet.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
