//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the FSM and its shared context.  It exposes a
//! clean, hardware-agnostic API.  All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  EncoderInput ──▶ ┌────────────────────────┐ ──▶ DisplayPort
//!  SampleSource ──▶ │      AppService        │ ──▶ CalibrationPort
//!                   │  FSM · Capture · Cal   │ ──▶ EventSink
//!                   └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::MeterConfig;
use crate::drivers::encoder::EncoderInput;
use crate::fsm::context::{FsmContext, Notice};
use crate::fsm::screen::Screen;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::sensors::ph::CalibrationSet;

use super::events::AppEvent;
use super::ports::{CalibrationPort, DisplayPort, EventSink, SampleSource};

/// Boot banner rows.
const SPLASH: [&str; 2] = ["pH meter....", "... init..."];

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
}

impl AppService {
    /// Construct the service from configuration and the calibration set
    /// loaded at boot.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: MeterConfig, calibration: CalibrationSet) -> Self {
        let ctx = FsmContext::new(config, calibration);
        let fsm = Fsm::new(build_state_table(), StateId::Measure);
        Self { fsm, ctx }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in its initial state (Measure).
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    /// Poll-then-yield until `display` reports ready.
    pub fn wait_for_display(display: &impl DisplayPort, mut yield_now: impl FnMut()) {
        while !display.is_ready() {
            yield_now();
        }
    }

    /// Boot banner, shown until the first pass redraws the screen.
    pub fn show_splash(display: &mut impl DisplayPort) {
        display.write(0, 0, SPLASH[0]);
        display.write(3, 1, SPLASH[1]);
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// Run one pass: drain input → read samples → FSM → display → storage.
    pub fn tick(
        &mut self,
        input: &EncoderInput,
        samples: &mut impl SampleSource,
        display: &mut impl DisplayPort,
        store: &mut impl CalibrationPort,
        sink: &mut impl EventSink,
    ) {
        let prev_state = self.fsm.current_state();

        // 1. Inputs for this pass
        self.ctx.input = input.take_pass();
        self.ctx.raw = samples.latest();
        if self.ctx.wants_batch() {
            self.ctx.batch = samples.read_batch(self.ctx.config.stability_batch_len);
        }

        // 2. FSM tick (pure state logic)
        self.fsm.tick(&mut self.ctx);

        // 3. Screen
        if display.is_ready() {
            self.ctx.screen.flush(display);
        }

        // 4. Emit state change if the FSM moved
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        // 5. Handler notices → events and storage writes
        for notice in self.ctx.drain_notices() {
            Self::handle_notice(notice, store, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Active calibration set.
    pub fn calibration(&self) -> &CalibrationSet {
        self.ctx.engine.set()
    }

    /// Latest reading in centi-pH.
    pub fn ph(&self) -> u16 {
        self.ctx.ph()
    }

    /// `true` after a rejected commit, until the next successful one.
    pub fn calibration_fault(&self) -> bool {
        self.ctx.calibration_fault
    }

    pub fn screen(&self) -> &Screen {
        &self.ctx.screen
    }

    pub fn config(&self) -> &MeterConfig {
        &self.ctx.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle_notice(
        notice: Notice,
        store: &mut impl CalibrationPort,
        sink: &mut impl EventSink,
    ) {
        match notice {
            Notice::CaptureStarted { mode, index } => {
                sink.emit(&AppEvent::CaptureStarted { mode, index });
            }
            Notice::CaptureFinished { index, outcome } => {
                sink.emit(&AppEvent::CaptureFinished { index, outcome });
            }
            Notice::Committed {
                mode,
                index,
                point,
                changed,
            } => {
                sink.emit(&AppEvent::CalibrationSaved { mode, index, point });
                for (slot, p) in changed {
                    if let Err(error) = store.save_point(slot, p) {
                        warn!("Calibration slot {} not persisted: {}", slot + 1, error);
                        sink.emit(&AppEvent::PersistFailed { index: slot, error });
                    }
                }
            }
            Notice::Rejected(e) => {
                sink.emit(&AppEvent::CalibrationRejected(e));
            }
        }
    }
}
