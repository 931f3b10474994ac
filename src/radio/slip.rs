//! SLIP framing used by the serial radio dongle.
//!
//! Each packet is wrapped as `START ... END`; occurrences of the three
//! control bytes inside the packet are escaped with `ESC` followed by a
//! substitute byte.

pub const SLIP_START: u8 = 0xA5;
pub const SLIP_END: u8 = 0xC0;
pub const SLIP_ESC: u8 = 0xDB;
pub const SLIP_ESC_END: u8 = 0xDC;
pub const SLIP_ESC_ESC: u8 = 0xDD;
pub const SLIP_ESC_START: u8 = 0xDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlipState {
    /// Waiting for a START byte
    Hunting,
    /// Inside a frame
    InFrame,
    /// Previous byte was ESC
    Escaped,
    /// Frame exceeded the limit; skipping until the next START
    Overflowed,
}

/// Incremental SLIP frame decoder
#[derive(Debug)]
pub struct SlipDecoder {
    buf: Vec<u8>,
    max_len: usize,
    state: SlipState,
    discarded: u64,
}

impl SlipDecoder {
    /// Create a decoder that discards frames longer than `max_len` bytes
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len),
            max_len,
            state: SlipState::Hunting,
            discarded: 0,
        }
    }

    /// Feed one byte; returns the unescaped frame when END completes it
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == SLIP_START {
            // START always resynchronises, even mid-frame
            self.buf.clear();
            self.state = SlipState::InFrame;
            return None;
        }

        match self.state {
            SlipState::Hunting => None,
            SlipState::Overflowed => {
                if byte == SLIP_END {
                    self.state = SlipState::Hunting;
                }
                None
            }
            SlipState::InFrame => match byte {
                SLIP_END => {
                    self.state = SlipState::Hunting;
                    Some(self.buf.as_slice())
                }
                SLIP_ESC => {
                    self.state = SlipState::Escaped;
                    None
                }
                _ => {
                    self.store(byte);
                    None
                }
            },
            SlipState::Escaped => {
                let unescaped = match byte {
                    SLIP_ESC_END => Some(SLIP_END),
                    SLIP_ESC_ESC => Some(SLIP_ESC),
                    SLIP_ESC_START => Some(SLIP_START),
                    _ => None,
                };
                match unescaped {
                    Some(b) => {
                        self.state = SlipState::InFrame;
                        self.store(b);
                    }
                    None => {
                        // Invalid escape: the frame is corrupt
                        self.discarded += 1;
                        self.buf.clear();
                        self.state = if byte == SLIP_END {
                            SlipState::Hunting
                        } else {
                            SlipState::Overflowed
                        };
                    }
                }
                None
            }
        }
    }

    /// Number of frames thrown away (too long or badly escaped)
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn store(&mut self, byte: u8) {
        if self.buf.len() >= self.max_len {
            self.discarded += 1;
            self.buf.clear();
            self.state = SlipState::Overflowed;
            return;
        }
        self.buf.push(byte);
    }
}
