//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::error::CalibrationError;
use crate::fsm::StateId;
use crate::fsm::capture::CaptureOutcome;
use crate::sensors::ph::{CalibrationMode, CalibrationPoint};

use super::ports::StorageError;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A capture began for `index` (0-based slot).
    CaptureStarted { mode: CalibrationMode, index: usize },

    /// A capture ended.
    CaptureFinished { index: usize, outcome: CaptureOutcome },

    /// A captured point replaced slot `index` of the active set.
    CalibrationSaved {
        mode: CalibrationMode,
        index: usize,
        point: CalibrationPoint,
    },

    /// A commit was refused; the previous set stays active.
    CalibrationRejected(CalibrationError),

    /// Writing slot `index` to storage failed.  The active set already
    /// holds the new point.
    PersistFailed { index: usize, error: StorageError },
}
