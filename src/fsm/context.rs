//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: this pass's input events and raw sample, the calibration
//! engine, the running capture session, the screen buffer, and the
//! notices the service turns into events and storage writes.  Think of it
//! as the "blackboard" in a blackboard architecture.

use crate::config::MeterConfig;
use crate::drivers::encoder::PassEvents;
use crate::error::CalibrationError;
use crate::sensors::ph::{CalibrationEngine, CalibrationMode, CalibrationPoint, CalibrationSet, SLOTS};
use crate::sensors::stability::SampleBatch;

use super::capture::{CaptureOutcome, CaptureSession};
use super::screen::Screen;

/// Pending queue depth for [`Notice`]s between two service ticks.
pub const NOTICE_CAP: usize = 4;

// ---------------------------------------------------------------------------
// Notices (written by state handlers; drained by the service)
// ---------------------------------------------------------------------------

/// Something a handler did that the outside world should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    CaptureStarted {
        mode: CalibrationMode,
        index: usize,
    },
    CaptureFinished {
        index: usize,
        outcome: CaptureOutcome,
    },
    /// The engine accepted a point; `changed` lists the slots to persist.
    Committed {
        mode: CalibrationMode,
        index: usize,
        point: CalibrationPoint,
        changed: heapless::Vec<(usize, CalibrationPoint), SLOTS>,
    },
    Rejected(CalibrationError),
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Inputs for this pass --
    /// Events drained from the encoder for this pass.
    pub input: PassEvents,
    /// Latest raw ADC code.
    pub raw: u16,
    /// Stability batch, present only while a capture asks for one.
    pub batch: Option<SampleBatch>,

    // -- Calibration --
    pub engine: CalibrationEngine,
    /// Running capture, if any.
    pub capture: Option<CaptureSession>,
    /// Last commit was rejected; shown as `CAL!` until a commit succeeds.
    pub calibration_fault: bool,

    // -- Outputs --
    pub screen: Screen,
    pub notices: heapless::Vec<Notice, NOTICE_CAP>,

    // -- Configuration --
    pub config: MeterConfig,
}

impl FsmContext {
    /// Create a new context with the given configuration and active set.
    pub fn new(config: MeterConfig, calibration: CalibrationSet) -> Self {
        Self {
            input: PassEvents::NONE,
            raw: 0,
            batch: None,
            engine: CalibrationEngine::new(calibration),
            capture: None,
            calibration_fault: false,
            screen: Screen::new(config.display_cols, config.display_rows),
            notices: heapless::Vec::new(),
            config,
        }
    }

    /// Live reading in centi-pH.
    pub fn ph(&self) -> u16 {
        self.engine.convert(self.raw)
    }

    /// `true` while the running capture needs a batch of reads.
    pub fn wants_batch(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureSession::wants_batch)
    }

    /// Queue a notice for the service.
    pub fn notify(&mut self, notice: Notice) {
        if let Err(dropped) = self.notices.push(notice) {
            log::warn!("fsm: notice queue full, dropping {:?}", dropped);
        }
    }

    /// Take queued notices, oldest first.
    pub fn drain_notices(&mut self) -> heapless::Vec<Notice, NOTICE_CAP> {
        core::mem::take(&mut self.notices)
    }
}
