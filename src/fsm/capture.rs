//! Calibration capture sub-protocol.
//!
//! ```text
//!  SetReference ──[btn]──▶ Confirm ──[btn, OK]──▶ Stabilize ──[settled]──▶ SaveConfirm
//!                             │                       │                        │
//!                      [btn, NOT OK]               [btn]                    [btn]
//!                             ▼                       ▼                        ▼
//!                        NotConfirmed             Cancelled           Commit / Discarded
//! ```
//!
//! The session is pure: it consumes one pass of input events plus an
//! optional batch of reads and reports where it ended up.  Committing a
//! point to the calibration engine is left to the caller.

use crate::config::MeterConfig;
use crate::drivers::encoder::{PassEvents, Rotation};
use crate::sensors::ph::{CalibrationMode, CalibrationPoint, REFERENCE_FULL_SCALE};
use crate::sensors::stability::{SampleBatch, StabilityGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    SetReference,
    Confirm,
    Stabilize,
    SaveConfirm,
}

/// How a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// User chose DA; the point is ready to commit.
    Commit(CalibrationPoint),
    /// User chose NE at save confirmation.
    Discarded,
    /// User left the confirm toggle at NOT OK.
    NotConfirmed,
    /// Button pressed while waiting for a stable reading.
    Cancelled,
}

/// Result of one [`CaptureSession::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    /// Still running; `cleared` asks the caller to blank the display.
    Running { cleared: bool },
    Finished(CaptureOutcome),
}

#[derive(Debug, Clone)]
pub struct CaptureSession {
    mode: CalibrationMode,
    index: usize,
    phase: CapturePhase,
    reference: u16,
    reference_step: u16,
    confirmed: bool,
    save: bool,
    gate: StabilityGate,
    captured: Option<u16>,
}

impl CaptureSession {
    /// Start a capture for slot `index`, editing from `initial_reference`.
    pub fn new(
        mode: CalibrationMode,
        index: usize,
        initial_reference: u16,
        cfg: &MeterConfig,
    ) -> Self {
        Self {
            mode,
            index,
            phase: CapturePhase::SetReference,
            reference: initial_reference.min(REFERENCE_FULL_SCALE),
            reference_step: cfg.reference_step,
            confirmed: false,
            save: false,
            gate: StabilityGate::from_config(cfg),
            captured: None,
        }
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    /// 0-based slot being captured.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn reference(&self) -> u16 {
        self.reference
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn save(&self) -> bool {
        self.save
    }

    pub fn stability_counter(&self) -> u16 {
        self.gate.counter()
    }

    pub fn captured(&self) -> Option<u16> {
        self.captured
    }

    /// `true` while the caller should supply a batch of reads each pass.
    pub fn wants_batch(&self) -> bool {
        self.phase == CapturePhase::Stabilize
    }

    /// Advance by one pass.
    pub fn step(&mut self, input: PassEvents, batch: Option<&SampleBatch>) -> CaptureStep {
        match self.phase {
            CapturePhase::SetReference => {
                match input.rotation {
                    Some(Rotation::Up) => {
                        self.reference = self
                            .reference
                            .saturating_add(self.reference_step)
                            .min(REFERENCE_FULL_SCALE);
                    }
                    Some(Rotation::Down) => {
                        self.reference = self.reference.saturating_sub(self.reference_step);
                    }
                    None => {}
                }
                if input.button {
                    self.phase = CapturePhase::Confirm;
                }
                CaptureStep::Running { cleared: false }
            }
            CapturePhase::Confirm => {
                if input.rotation.is_some() {
                    self.confirmed = !self.confirmed;
                }
                if !input.button {
                    return CaptureStep::Running { cleared: false };
                }
                if self.confirmed {
                    self.phase = CapturePhase::Stabilize;
                    CaptureStep::Running { cleared: true }
                } else {
                    CaptureStep::Finished(CaptureOutcome::NotConfirmed)
                }
            }
            CapturePhase::Stabilize => {
                if input.button {
                    return CaptureStep::Finished(CaptureOutcome::Cancelled);
                }
                if let Some(raw) = batch.and_then(|b| self.gate.feed(b)) {
                    self.captured = Some(raw);
                    self.phase = CapturePhase::SaveConfirm;
                }
                CaptureStep::Running { cleared: false }
            }
            CapturePhase::SaveConfirm => {
                if input.rotation.is_some() {
                    self.save = !self.save;
                }
                if !input.button {
                    return CaptureStep::Running { cleared: false };
                }
                match (self.save, self.captured) {
                    (true, Some(raw)) => CaptureStep::Finished(CaptureOutcome::Commit(
                        CalibrationPoint::new(raw, self.reference),
                    )),
                    _ => CaptureStep::Finished(CaptureOutcome::Discarded),
                }
            }
        }
    }
}
