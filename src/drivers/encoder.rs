//! Quadrature encoder and push-button input service.
//!
//! ## Hardware
//!
//! Phase A and the push-button fire falling-edge interrupts.  Phase B is
//! not interrupt-driven: its level is sampled at the instant A falls and
//! that single sample is the direction discriminator.  No debounce
//! filtering is applied; contact bounce shows up as extra detents.
//!
//! | B when A falls | Event        | Counter |
//! |----------------|--------------|---------|
//! | low            | `RotateUp`   | +1      |
//! | high           | `RotateDown` | −1      |
//!
//! The ISR entry points are constant-time: one atomic RMW on the flag set
//! and one on the rotation counter.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::events::{InputEvent, InputFlags};

/// Direction of one encoder detent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Up,
    Down,
}

/// Events drained by the control loop in one pass.
///
/// At most one button press and one rotation are consumed per pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassEvents {
    pub button: bool,
    pub rotation: Option<Rotation>,
}

impl PassEvents {
    pub const NONE: Self = Self {
        button: false,
        rotation: None,
    };

    pub fn is_empty(&self) -> bool {
        !self.button && self.rotation.is_none()
    }
}

/// Shared state between the encoder/button ISRs and the control loop.
///
/// Lives for the whole program (leaked once at boot) so the ISR can hold a
/// `&'static` to it.
#[derive(Debug)]
pub struct EncoderInput {
    flags: InputFlags,
    counter: AtomicI32,
}

impl EncoderInput {
    pub const fn new() -> Self {
        Self {
            flags: InputFlags::new(),
            counter: AtomicI32::new(0),
        }
    }

    // ── ISR side ──────────────────────────────────────────────

    /// Phase A falling edge.  `phase_b_low` is B's level sampled in the ISR.
    pub fn on_phase_a_fall(&self, phase_b_low: bool) {
        if phase_b_low {
            self.counter.fetch_add(1, Ordering::Relaxed);
            self.flags.raise(InputEvent::RotateUp);
        } else {
            self.counter.fetch_sub(1, Ordering::Relaxed);
            self.flags.raise(InputEvent::RotateDown);
        }
    }

    /// Push-button falling edge.
    pub fn on_button_fall(&self) {
        self.flags.raise(InputEvent::Button);
    }

    // ── Consumer side ─────────────────────────────────────────

    /// Drain at most one button press and one rotation.
    ///
    /// Up is taken first, then Down; when both were pending, Down wins.
    /// Both rotation flags are cleared either way.
    pub fn take_pass(&self) -> PassEvents {
        let button = self.flags.take(InputEvent::Button);

        let mut rotation = None;
        if self.flags.take(InputEvent::RotateUp) {
            rotation = Some(Rotation::Up);
        }
        if self.flags.take(InputEvent::RotateDown) {
            rotation = Some(Rotation::Down);
        }

        PassEvents { button, rotation }
    }

    /// Net detents since boot (up positive).
    pub fn position(&self) -> i32 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn flags(&self) -> &InputFlags {
        &self.flags
    }
}

impl Default for EncoderInput {
    fn default() -> Self {
        Self::new()
    }
}
