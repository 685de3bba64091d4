//! Interrupt-to-task input signalling.
//!
//! Events are produced by the encoder and button ISRs and consumed by the
//! control loop.  Each kind owns one bit of an atomic flag set; the ISR
//! sets its bit and the consumer clears it with an atomic test-and-clear,
//! so an edge landing between the consumer's check and its clear is never
//! lost.  Repeated edges of the same kind before the consumer runs
//! coalesce into a single pending event.
//!
//! ```text
//! ┌─────────────┐  fetch_or   ┌──────────────┐  fetch_and(!bit)  ┌───────────┐
//! │ Encoder ISR │────────────▶│  InputFlags  │──────────────────▶│ Main loop │
//! │ Button ISR  │────────────▶│   (AtomicU8) │                   │ (consumer)│
//! └─────────────┘             └──────────────┘                   └───────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Input event kinds, one flag bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputEvent {
    /// Encoder push-button pressed.
    Button = 0b0000_0001,
    /// Encoder turned clockwise (B low when A fell).
    RotateUp = 0b0000_0010,
    /// Encoder turned counter-clockwise (B high when A fell).
    RotateDown = 0b0000_0100,
}

impl InputEvent {
    /// Return the bitmask for this event.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

// ── Lock-free flag set ────────────────────────────────────────

/// Single-producer / single-consumer latched event flags.
#[derive(Debug)]
pub struct InputFlags {
    bits: AtomicU8,
}

impl InputFlags {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Latch `event`.  Safe to call from interrupt context.
    pub fn raise(&self, event: InputEvent) {
        self.bits.fetch_or(event.mask(), Ordering::AcqRel);
    }

    /// Atomically test and clear `event`.  Returns `true` if it was pending.
    pub fn take(&self, event: InputEvent) -> bool {
        self.bits.fetch_and(!event.mask(), Ordering::AcqRel) & event.mask() != 0
    }

    /// Check whether `event` is pending without consuming it.
    pub fn is_pending(&self, event: InputEvent) -> bool {
        self.bits.load(Ordering::Acquire) & event.mask() != 0
    }

    /// Raw pending bitmask (diagnostics only).
    pub fn pending_bits(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }
}

impl Default for InputFlags {
    fn default() -> Self {
        Self::new()
    }
}
