//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::CaptureStarted { mode, index } => {
                info!("CAPTURE | start {:?} P{}", mode, index + 1);
            }
            AppEvent::CaptureFinished { index, outcome } => {
                info!("CAPTURE | P{} {:?}", index + 1, outcome);
            }
            AppEvent::CalibrationSaved { mode, index, point } => {
                info!(
                    "CAL | {:?} P{} raw={} ref={}",
                    mode,
                    index + 1,
                    point.raw_code,
                    point.reference_value
                );
            }
            AppEvent::CalibrationRejected(e) => {
                warn!("CAL | rejected: {}", e);
            }
            AppEvent::PersistFailed { index, error } => {
                warn!("CAL | slot {} not persisted: {}", index + 1, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalibrationError;
    use crate::fsm::StateId;

    #[test]
    fn every_event_is_accepted() {
        let mut sink = LogEventSink::new();
        sink.emit(&AppEvent::Started(StateId::Measure));
        sink.emit(&AppEvent::StateChanged {
            from: StateId::Measure,
            to: StateId::MenuCal2,
        });
        sink.emit(&AppEvent::CalibrationRejected(
            CalibrationError::Degenerate { segment: 1 },
        ));
    }
}
