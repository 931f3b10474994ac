//! # Frame Mailbox
//!
//! Single-slot, overwrite-on-conflict hand-off between the radio's receive
//! context (producer) and the foreground loop (consumer).
//!
//! The slot is guarded by a sequence counter: a producer claims it by moving
//! the counter from even to odd and makes it even again after copying, and
//! the consumer retries any copy during which the counter moved. Every byte
//! of the slot is an atomic, so there is no `unsafe` and no lock on either
//! side.
//!
//! Ordering contract:
//! - producer: claim the slot, copy data, release-store the even sequence,
//!   then set `pending` (release) as the very last step
//! - consumer: clear `pending` (acquire) first, then copy the slot out
//!
//! The radio delivers from a single receive context. A second concurrent
//! producer spins on the claim until the first finishes, so frames are never
//! interleaved. There is one consumer (the coordinator, which takes
//! `&mut self` to drain).

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::error::ReceiveError;
use crate::radio::{MacAddress, MAC_ADDRESS_LEN};

/// Payload capacity of the slot; frames must be strictly shorter
pub const FRAME_CAPACITY: usize = 256;

/// Frame payload storage
pub type FramePayload = heapless::Vec<u8, FRAME_CAPACITY>;

/// One received radio packet, copied out of the mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Sender hardware address
    pub sender: MacAddress,

    /// Raw payload bytes
    pub payload: FramePayload,

    /// Per-mailbox publish number, starting at 1 and wrapping at `u32::MAX`
    pub sequence: u32,
}

impl InboundFrame {
    /// Build a frame outside the mailbox
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::OversizedFrame`] if `data` does not fit.
    pub fn new(sender: MacAddress, data: &[u8]) -> Result<Self, ReceiveError> {
        check_capacity(data)?;
        let mut payload = FramePayload::new();
        payload.extend_from_slice(data).map_err(|_| oversized(data.len()))?;
        Ok(Self {
            sender,
            payload,
            sequence: 0,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Mailbox counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStats {
    /// Frames copied into the slot
    pub received: u32,

    /// Frames rejected because they did not fit
    pub dropped_oversized: u32,

    /// Frames overwritten before the consumer drained them, counted when
    /// the consumer sees the gap
    pub overwritten: u32,
}

/// Lock-free single-slot frame mailbox
#[derive(Debug)]
pub struct Mailbox {
    seq: AtomicU32,
    number: AtomicU32,
    len: AtomicUsize,
    sender: [AtomicU8; MAC_ADDRESS_LEN],
    data: [AtomicU8; FRAME_CAPACITY],
    pending: AtomicBool,
    delivered: AtomicU32,
    received: AtomicU32,
    dropped_oversized: AtomicU32,
    overwritten: AtomicU32,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Create an empty mailbox
    ///
    /// `const` so firmware builds can place it in a `static`.
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            number: AtomicU32::new(0),
            len: AtomicUsize::new(0),
            sender: [const { AtomicU8::new(0) }; MAC_ADDRESS_LEN],
            data: [const { AtomicU8::new(0) }; FRAME_CAPACITY],
            pending: AtomicBool::new(false),
            delivered: AtomicU32::new(0),
            received: AtomicU32::new(0),
            dropped_oversized: AtomicU32::new(0),
            overwritten: AtomicU32::new(0),
        }
    }

    /// Copy a frame into the slot and raise the pending signal
    ///
    /// Called from the receive context. It does not allocate or log, and it
    /// waits only while another producer holds the slot. An undrained frame
    /// is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::OversizedFrame`] if `data.len() >= FRAME_CAPACITY`;
    /// the slot and signal are left untouched.
    pub fn publish(&self, sender: MacAddress, data: &[u8]) -> Result<(), ReceiveError> {
        if let Err(e) = check_capacity(data) {
            self.dropped_oversized.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let seq = self.claim();
        fence(Ordering::Release);

        let number = self.received.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.number.store(number, Ordering::Relaxed);

        for (slot, &byte) in self.sender.iter().zip(sender.0.iter()) {
            slot.store(byte, Ordering::Relaxed);
        }
        for (slot, &byte) in self.data.iter().zip(data) {
            slot.store(byte, Ordering::Relaxed);
        }
        self.len.store(data.len(), Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);

        // Signal last
        self.pending.store(true, Ordering::Release);
        Ok(())
    }

    /// Take the pending frame, if any
    ///
    /// Returns `None` immediately, with no side effects, when nothing is
    /// pending. The signal is cleared before the copy so a frame arriving
    /// mid-copy raises it again for the next poll. A frame is never returned
    /// twice and never returned torn.
    pub fn take(&self) -> Option<InboundFrame> {
        if !self.pending.swap(false, Ordering::Acquire) {
            return None;
        }

        let frame = self.snapshot();

        // A frame published while the previous take was copying is picked up
        // by that take and then signals once more
        let last = self.delivered.load(Ordering::Relaxed);
        if frame.sequence == last {
            return None;
        }

        // Every skipped sequence number is a frame overwritten in the slot
        let lost = frame.sequence.wrapping_sub(last).wrapping_sub(1);
        self.overwritten.fetch_add(lost, Ordering::Relaxed);
        self.delivered.store(frame.sequence, Ordering::Relaxed);
        Some(frame)
    }

    /// Whether a frame is waiting to be drained
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            received: self.received.load(Ordering::Relaxed),
            dropped_oversized: self.dropped_oversized.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
        }
    }

    /// Move the sequence from even to odd, returning the even value
    fn claim(&self) -> u32 {
        loop {
            let seq = self.seq.load(Ordering::Relaxed);
            if seq & 1 == 0
                && self
                    .seq
                    .compare_exchange_weak(
                        seq,
                        seq.wrapping_add(1),
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return seq;
            }
            std::hint::spin_loop();
        }
    }

    fn snapshot(&self) -> InboundFrame {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                // Producer mid-copy
                std::hint::spin_loop();
                continue;
            }

            let number = self.number.load(Ordering::Relaxed);
            let len = self.len.load(Ordering::Relaxed).min(FRAME_CAPACITY - 1);
            let mut sender = [0u8; MAC_ADDRESS_LEN];
            for (octet, slot) in sender.iter_mut().zip(self.sender.iter()) {
                *octet = slot.load(Ordering::Relaxed);
            }
            let mut payload = FramePayload::new();
            payload.extend(self.data[..len].iter().map(|slot| slot.load(Ordering::Relaxed)));

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return InboundFrame {
                    sender: MacAddress(sender),
                    payload,
                    sequence: number,
                };
            }
        }
    }
}

fn check_capacity(data: &[u8]) -> Result<(), ReceiveError> {
    if data.len() >= FRAME_CAPACITY {
        return Err(oversized(data.len()));
    }
    Ok(())
}

fn oversized(len: usize) -> ReceiveError {
    ReceiveError::OversizedFrame {
        len,
        capacity: FRAME_CAPACITY,
    }
}
