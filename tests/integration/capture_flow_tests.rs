//! End-to-end calibration flows through AppService.
//!
//! Input arrives the way it does on the device: ISR entry points on a
//! shared [`EncoderInput`], drained once per pass by the service.

use crate::mock_hw::{MockDisplay, MockSamples, MockStore, RecordingSink};

use phmeter::app::events::AppEvent;
use phmeter::app::ports::{CalibrationPort, StorageError};
use phmeter::app::service::AppService;
use phmeter::config::MeterConfig;
use phmeter::drivers::encoder::EncoderInput;
use phmeter::error::CalibrationError;
use phmeter::fsm::StateId;
use phmeter::fsm::capture::CaptureOutcome;
use phmeter::sensors::ph::{CalibrationMode, CalibrationPoint, CalibrationSet};

struct Rig {
    app: AppService,
    input: EncoderInput,
    samples: MockSamples,
    display: MockDisplay,
    store: MockStore,
    sink: RecordingSink,
}

impl Rig {
    fn new(code: u16) -> Self {
        Self::with_store(code, MockStore::new())
    }

    fn with_store(code: u16, store: MockStore) -> Self {
        let config = MeterConfig {
            stability_batch_len: 8,
            stability_required_batches: 2,
            ..MeterConfig::default()
        };
        let display = MockDisplay::ready(config.display_cols, config.display_rows);
        let mut rig = Self {
            app: AppService::new(config, CalibrationSet::factory_default()),
            input: EncoderInput::new(),
            samples: MockSamples::new(code),
            display,
            store,
            sink: RecordingSink::new(),
        };
        rig.app.start(&mut rig.sink);
        rig
    }

    fn pass(&mut self) {
        self.app.tick(
            &self.input,
            &mut self.samples,
            &mut self.display,
            &mut self.store,
            &mut self.sink,
        );
    }

    fn button(&mut self) {
        self.input.on_button_fall();
        self.pass();
    }

    fn up(&mut self) {
        self.input.on_phase_a_fall(true);
        self.pass();
    }

    fn down(&mut self) {
        self.input.on_phase_a_fall(false);
        self.pass();
    }

    /// Idle passes until the stability wait captures a code.
    fn settle(&mut self) {
        for _ in 0..10 {
            self.pass();
            if self.display.row(1) == "NE" {
                return;
            }
        }
        panic!("capture never settled, display shows {:?}", self.display.row(0));
    }

    /// Measure → 3-point menu → point `n` (1-based) → capture.
    fn enter_cal3_capture(&mut self, n: usize) {
        self.button();
        self.down();
        self.button();
        for _ in 1..n {
            self.down();
        }
        self.button();
        assert_eq!(self.app.state(), StateId::Capture);
    }
}

// ── Measurement ──────────────────────────────────────────────

#[test]
fn measure_shows_reading_for_latest_code() {
    let mut rig = Rig::new(33_000);
    rig.pass();
    assert_eq!(rig.display.row(0), "pH:7.00");
    assert_eq!(rig.display.row(1), "AD:33000");

    rig.samples.code = 13_000;
    rig.pass();
    assert_eq!(rig.display.row(0), "pH:0.00");
    assert_eq!(rig.app.ph(), 0);
}

#[test]
fn splash_gives_way_to_first_reading() {
    let mut rig = Rig::new(33_000);
    AppService::show_splash(&mut rig.display);
    assert_eq!(rig.display.row(0), "pH meter....");
    assert_eq!(rig.display.row(1), "   ... init...");

    rig.pass();
    assert_eq!(rig.display.row(0), "pH:7.00");
    assert_eq!(rig.display.row(1), "AD:33000");
}

#[test]
fn unchanged_screen_is_not_rewritten() {
    let mut rig = Rig::new(33_000);
    rig.pass();
    let writes = rig.display.calls.len();
    rig.pass();
    rig.pass();
    assert_eq!(rig.display.calls.len(), writes);
}

#[test]
fn menu_walk_emits_state_changes() {
    let mut rig = Rig::new(33_000);
    rig.button();
    rig.down();
    rig.down();
    rig.button();

    assert_eq!(rig.app.state(), StateId::Measure);
    let path: Vec<StateId> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        path,
        [
            StateId::MenuCal2,
            StateId::MenuCal3,
            StateId::MenuExit,
            StateId::Measure
        ]
    );
}

#[test]
fn bursts_of_edges_coalesce_into_one_step() {
    let mut rig = Rig::new(33_000);
    rig.button();
    for _ in 0..5 {
        rig.input.on_phase_a_fall(false);
    }
    rig.pass();
    assert_eq!(rig.app.state(), StateId::MenuCal3);
    assert_eq!(rig.input.position(), -5);
}

// ── Capture ──────────────────────────────────────────────────

#[test]
fn three_point_capture_commits_and_persists_one_slot() {
    let mut rig = Rig::new(33_000);
    rig.enter_cal3_capture(2);
    rig.pass();
    assert_eq!(rig.display.row(0), "Ref. pH(2)");
    assert_eq!(rig.display.row(1), "7.00");

    rig.up();
    rig.up();
    assert_eq!(rig.display.row(1), "7.02");
    rig.button();
    assert_eq!(rig.display.row(1), "7.02 NOT OK");
    rig.up();
    assert_eq!(rig.display.row(1), "7.02 OK");

    rig.samples.code = 32_500;
    rig.button();
    assert_eq!(rig.display.clears(), 1);
    rig.settle();
    assert_eq!(rig.display.row(0), "P2 32500");

    rig.down();
    assert_eq!(rig.display.row(1), "DA");
    rig.button();

    assert_eq!(rig.app.state(), StateId::MenuCal3);
    let expected = CalibrationPoint::new(32_500, 7_020);
    assert_eq!(rig.app.calibration().point(1), Some(expected));
    assert_eq!(rig.store.writes, [(1, expected)]);
    assert!(rig.sink.events.contains(&AppEvent::CalibrationSaved {
        mode: CalibrationMode::ThreePoint,
        index: 1,
        point: expected,
    }));
}

#[test]
fn two_point_capture_retires_slot_three() {
    let mut rig = Rig::new(20_000);
    rig.button();
    rig.button();
    assert_eq!(rig.app.state(), StateId::Cal2Point1);
    rig.button();
    rig.button();
    rig.up();
    rig.button();
    rig.settle();
    rig.up();
    rig.button();

    assert_eq!(rig.app.state(), StateId::MenuCal2);
    assert!(rig.app.calibration().is_two_point());
    assert_eq!(
        rig.store.writes,
        [
            (0, CalibrationPoint::new(20_000, 0)),
            (2, CalibrationPoint::UNUSED)
        ]
    );

    let reloaded = rig.store.load_set().unwrap().unwrap();
    assert_eq!(reloaded, *rig.app.calibration());
}

#[test]
fn declining_the_reference_leaves_calibration_untouched() {
    let mut rig = Rig::new(33_000);
    let before = *rig.app.calibration();
    rig.enter_cal3_capture(1);
    rig.button();
    rig.button();

    assert_eq!(rig.app.state(), StateId::MenuCal3);
    assert_eq!(*rig.app.calibration(), before);
    assert!(rig.store.writes.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::CaptureFinished {
        index: 0,
        outcome: CaptureOutcome::NotConfirmed,
    }));
}

#[test]
fn declining_the_save_discards_the_capture() {
    let mut rig = Rig::new(12_000);
    rig.enter_cal3_capture(1);
    rig.button();
    rig.up();
    rig.button();
    rig.settle();
    rig.button();

    assert_eq!(rig.app.state(), StateId::MenuCal3);
    assert_eq!(rig.app.calibration(), &CalibrationSet::factory_default());
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::CaptureFinished {
                outcome: CaptureOutcome::Discarded,
                ..
            }
        )),
        1
    );
}

#[test]
fn button_during_stability_wait_cancels() {
    let mut rig = Rig::new(33_000);
    rig.enter_cal3_capture(3);
    rig.button();
    rig.up();
    rig.button();
    rig.pass();
    assert!(rig.display.row(0).starts_with("Stabilizing 3"));
    let batches = rig.samples.batches;
    assert!(batches > 0);

    rig.button();
    assert_eq!(rig.app.state(), StateId::MenuCal3);
    rig.pass();
    assert_eq!(rig.samples.batches, batches + 1);
    rig.pass();
    assert_eq!(rig.samples.batches, batches + 1);
}

#[test]
fn degenerate_capture_is_rejected_and_flagged() {
    // Same code as the factory slot 2.
    let mut rig = Rig::new(33_000);
    rig.enter_cal3_capture(1);
    rig.button();
    rig.up();
    rig.button();
    rig.settle();
    rig.up();
    rig.button();

    assert_eq!(rig.app.calibration(), &CalibrationSet::factory_default());
    assert!(rig.app.calibration_fault());
    assert!(rig.store.writes.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::CalibrationRejected(
        CalibrationError::Degenerate { segment: 0 }
    )));

    // Back out to the reading.
    rig.down();
    rig.button();
    assert_eq!(rig.app.state(), StateId::Measure);
    rig.pass();
    assert!(rig.display.row(1).ends_with("CAL!"));
}

#[test]
fn backwards_third_point_is_rejected() {
    // Below the factory slot 2 code of 33000.
    let mut rig = Rig::new(20_000);
    rig.enter_cal3_capture(3);
    rig.button();
    rig.up();
    rig.button();
    rig.settle();
    rig.up();
    rig.button();

    assert_eq!(rig.app.state(), StateId::MenuCal3);
    assert_eq!(rig.app.calibration(), &CalibrationSet::factory_default());
    assert!(rig.app.calibration_fault());
    assert!(rig.store.writes.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::CalibrationRejected(
        CalibrationError::OutOfOrder { segment: 1 }
    )));
}

#[test]
fn failed_persist_keeps_the_new_calibration_active() {
    let mut rig = Rig::with_store(52_500, MockStore::failing());
    rig.enter_cal3_capture(3);
    rig.button();
    rig.up();
    rig.button();
    rig.settle();
    rig.up();
    rig.button();

    assert_eq!(
        rig.app.calibration().point(2),
        Some(CalibrationPoint::new(52_500, 13_500))
    );
    assert!(rig.sink.events.contains(&AppEvent::PersistFailed {
        index: 2,
        error: StorageError::IoError,
    }));
}
