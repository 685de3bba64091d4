//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Measure    │ fn(ctx)   │    -     │ fn(ctx)->Option<> │ │
//! │  │ MenuCal2   │    -      │    -     │ fn(ctx)->Option<> │ │
//! │  │ ...        │           │          │                   │ │
//! │  │ Capture    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └────────────┴───────────┴──────────┴───────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext` which
//! holds the pass's input events, the raw sample, the calibration
//! engine, the capture session and the screen buffer.

pub mod capture;
pub mod context;
pub mod screen;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all meter states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Measure = 0,
    MenuCal2 = 1,
    MenuCal3 = 2,
    MenuExit = 3,
    Cal2Point1 = 4,
    Cal2Point2 = 5,
    Cal2Exit = 6,
    Cal3Point1 = 7,
    Cal3Point2 = 8,
    Cal3Point3 = 9,
    Cal3Exit = 10,
    Capture = 11,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 12;

    /// Every state in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Measure,
        Self::MenuCal2,
        Self::MenuCal3,
        Self::MenuExit,
        Self::Cal2Point1,
        Self::Cal2Point2,
        Self::Cal2Exit,
        Self::Cal3Point1,
        Self::Cal3Point2,
        Self::Cal3Point3,
        Self::Cal3Exit,
        Self::Capture,
    ];

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Measure` in release.
    pub fn from_index(idx: usize) -> Self {
        if let Some(&id) = Self::ALL.get(idx) {
            id
        } else {
            debug_assert!(false, "invalid state index: {idx}");
            Self::Measure
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array with no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and a mutable
/// [`FsmContext`] that is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump straight to `next`, running the usual exit and enter actions.
    #[cfg(test)]
    pub(crate) fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::capture::{CaptureOutcome, CapturePhase};
    use super::context::{FsmContext, Notice};
    use super::*;
    use crate::config::MeterConfig;
    use crate::drivers::encoder::{PassEvents, Rotation};
    use crate::error::CalibrationError;
    use crate::sensors::ph::{CalibrationPoint, CalibrationSet};
    use crate::sensors::stability::SampleBatch;

    const BUTTON: PassEvents = PassEvents {
        button: true,
        rotation: None,
    };
    const UP: PassEvents = PassEvents {
        button: false,
        rotation: Some(Rotation::Up),
    };
    const DOWN: PassEvents = PassEvents {
        button: false,
        rotation: Some(Rotation::Down),
    };

    fn make_ctx() -> FsmContext {
        let config = MeterConfig {
            stability_required_batches: 2,
            ..MeterConfig::default()
        };
        FsmContext::new(config, CalibrationSet::factory_default())
    }

    fn make_fsm() -> Fsm {
        Fsm::new(states::build_state_table(), StateId::Measure)
    }

    fn press(fsm: &mut Fsm, ctx: &mut FsmContext, input: PassEvents) {
        ctx.input = input;
        fsm.tick(ctx);
        ctx.input = PassEvents::NONE;
    }

    /// Drive the stability wait with identical batches until it settles.
    fn settle(fsm: &mut Fsm, ctx: &mut FsmContext, raw: u16) {
        ctx.raw = raw;
        for _ in 0..10 {
            if !ctx.wants_batch() {
                break;
            }
            ctx.batch = SampleBatch::from_samples(&[raw; 8]);
            fsm.tick(ctx);
        }
    }

    #[test]
    fn starts_in_measure() {
        let fsm = make_fsm();
        assert_eq!(fsm.current_state(), StateId::Measure);
    }

    #[test]
    fn idle_ticks_stay_in_measure() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Measure);
        assert!(ctx.drain_notices().is_empty());
    }

    #[test]
    fn measure_renders_reading() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        ctx.raw = 33_000;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.screen.line(0).trim_end(), "pH:7.00");
        assert_eq!(ctx.screen.line(1).trim_end(), "AD:33000");
    }

    #[test]
    fn menu_navigation() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);

        press(&mut fsm, &mut ctx, BUTTON);
        assert_eq!(fsm.current_state(), StateId::MenuCal2);
        press(&mut fsm, &mut ctx, DOWN);
        assert_eq!(fsm.current_state(), StateId::MenuCal3);
        press(&mut fsm, &mut ctx, UP);
        assert_eq!(fsm.current_state(), StateId::MenuCal2);
        press(&mut fsm, &mut ctx, UP);
        assert_eq!(fsm.current_state(), StateId::MenuExit);
        press(&mut fsm, &mut ctx, DOWN);
        assert_eq!(fsm.current_state(), StateId::MenuCal2);
    }

    #[test]
    fn menu_exit_returns_to_measure() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::MenuExit, &mut ctx);
        press(&mut fsm, &mut ctx, BUTTON);
        assert_eq!(fsm.current_state(), StateId::Measure);
    }

    #[test]
    fn two_point_ring_wraps_both_ways() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal2Point1, &mut ctx);

        for expected in [StateId::Cal2Point2, StateId::Cal2Exit, StateId::Cal2Point1] {
            press(&mut fsm, &mut ctx, DOWN);
            assert_eq!(fsm.current_state(), expected);
        }
        press(&mut fsm, &mut ctx, UP);
        assert_eq!(fsm.current_state(), StateId::Cal2Exit);
    }

    #[test]
    fn three_point_ring_wraps_both_ways() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal3Point1, &mut ctx);

        press(&mut fsm, &mut ctx, UP);
        assert_eq!(fsm.current_state(), StateId::Cal3Exit);
        for expected in [
            StateId::Cal3Point1,
            StateId::Cal3Point2,
            StateId::Cal3Point3,
            StateId::Cal3Exit,
        ] {
            press(&mut fsm, &mut ctx, DOWN);
            assert_eq!(fsm.current_state(), expected);
        }
    }

    #[test]
    fn exit_states_return_to_owning_menu() {
        for (exit, menu) in [
            (StateId::Cal2Exit, StateId::MenuCal2),
            (StateId::Cal3Exit, StateId::MenuCal3),
        ] {
            let mut fsm = make_fsm();
            let mut ctx = make_ctx();
            fsm.start(&mut ctx);
            fsm.force_transition(exit, &mut ctx);
            press(&mut fsm, &mut ctx, BUTTON);
            assert_eq!(fsm.current_state(), menu);
        }
    }

    #[test]
    fn capture_starts_from_stored_reference() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal3Point2, &mut ctx);
        press(&mut fsm, &mut ctx, BUTTON);

        assert_eq!(fsm.current_state(), StateId::Capture);
        let session = ctx.capture.as_ref().unwrap();
        assert_eq!(session.index(), 1);
        assert_eq!(session.reference(), 7_000);
        assert_eq!(
            ctx.drain_notices().as_slice(),
            &[Notice::CaptureStarted {
                mode: crate::sensors::ph::CalibrationMode::ThreePoint,
                index: 1
            }]
        );
    }

    #[test]
    fn three_point_capture_commits_and_returns_to_menu() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal3Point3, &mut ctx);

        press(&mut fsm, &mut ctx, BUTTON); // start capture
        press(&mut fsm, &mut ctx, DOWN); // 13.490
        press(&mut fsm, &mut ctx, BUTTON); // -> confirm
        assert_eq!(ctx.screen.line(0).trim_end(), "Ref. pH(3)");
        press(&mut fsm, &mut ctx, UP); // OK
        assert_eq!(ctx.screen.line(1).trim_end(), "13.49 OK");
        press(&mut fsm, &mut ctx, BUTTON); // -> stabilize
        assert_eq!(
            ctx.capture.as_ref().map(|s| s.phase()),
            Some(CapturePhase::Stabilize)
        );

        settle(&mut fsm, &mut ctx, 52_000);
        assert_eq!(ctx.screen.line(0).trim_end(), "P3 52000");
        assert_eq!(ctx.screen.line(1).trim_end(), "NE");

        press(&mut fsm, &mut ctx, DOWN); // DA
        press(&mut fsm, &mut ctx, BUTTON);
        assert_eq!(fsm.current_state(), StateId::MenuCal3);
        assert!(ctx.capture.is_none());
        assert_eq!(
            ctx.engine.set().point(2),
            Some(CalibrationPoint::new(52_000, 13_490))
        );
        assert!(ctx.drain_notices().iter().any(|n| matches!(
            n,
            Notice::Committed { index: 2, .. }
        )));
    }

    #[test]
    fn two_point_commit_switches_to_two_point_mode() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal2Point1, &mut ctx);

        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, UP);
        press(&mut fsm, &mut ctx, BUTTON);
        settle(&mut fsm, &mut ctx, 14_000);
        press(&mut fsm, &mut ctx, UP);
        press(&mut fsm, &mut ctx, BUTTON);

        assert_eq!(fsm.current_state(), StateId::MenuCal2);
        assert!(ctx.engine.set().is_two_point());
        assert_eq!(ctx.engine.set().point(0), Some(CalibrationPoint::new(14_000, 0)));
    }

    #[test]
    fn not_confirmed_capture_changes_nothing() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal2Point2, &mut ctx);
        let before = *ctx.engine.set();

        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        assert_eq!(fsm.current_state(), StateId::MenuCal2);
        assert_eq!(*ctx.engine.set(), before);
        assert!(ctx.drain_notices().iter().any(|n| matches!(
            n,
            Notice::CaptureFinished {
                outcome: CaptureOutcome::NotConfirmed,
                ..
            }
        )));
    }

    #[test]
    fn button_cancels_stability_wait() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal3Point1, &mut ctx);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, UP);
        press(&mut fsm, &mut ctx, BUTTON);
        assert!(ctx.wants_batch());

        press(&mut fsm, &mut ctx, BUTTON);
        assert_eq!(fsm.current_state(), StateId::MenuCal3);
        assert!(!ctx.wants_batch());
    }

    #[test]
    fn degenerate_commit_is_rejected_and_flagged() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        let before = *ctx.engine.set();
        fsm.force_transition(StateId::Cal3Point1, &mut ctx);

        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, UP);
        press(&mut fsm, &mut ctx, BUTTON);
        // Same raw code as slot 2.
        settle(&mut fsm, &mut ctx, 33_000);
        press(&mut fsm, &mut ctx, UP);
        press(&mut fsm, &mut ctx, BUTTON);

        assert_eq!(*ctx.engine.set(), before);
        assert!(ctx.calibration_fault);
        assert!(ctx.drain_notices().contains(&Notice::Rejected(
            CalibrationError::Degenerate { segment: 0 }
        )));

        fsm.force_transition(StateId::Measure, &mut ctx);
        fsm.tick(&mut ctx);
        assert!(ctx.screen.line(1).contains("CAL!"));
    }

    #[test]
    fn confirm_requests_display_clear() {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        fsm.force_transition(StateId::Cal2Point1, &mut ctx);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, BUTTON);
        press(&mut fsm, &mut ctx, UP);

        #[derive(Default)]
        struct Count(usize);
        impl crate::app::ports::DisplayPort for Count {
            fn init(&mut self, _: u8, _: u8) {}
            fn clear(&mut self) {
                self.0 += 1;
            }
            fn write(&mut self, _: u8, _: u8, _: &str) {}
            fn is_ready(&self) -> bool {
                true
            }
        }
        let mut lcd = Count::default();
        ctx.screen.flush(&mut lcd);
        assert_eq!(lcd.0, 0);
        press(&mut fsm, &mut ctx, BUTTON);
        ctx.screen.flush(&mut lcd);
        assert_eq!(lcd.0, 1);
    }

    #[test]
    fn state_id_from_index_roundtrip() {
        for i in 0..StateId::COUNT {
            let id = StateId::from_index(i);
            assert_eq!(id as usize, i);
        }
    }

    #[test]
    fn table_matches_state_ids() {
        for (i, desc) in states::build_state_table().iter().enumerate() {
            assert_eq!(desc.id as usize, i, "{} out of place", desc.name);
        }
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn state_id_from_invalid_index_returns_measure() {
        let id = StateId::from_index(99);
        assert_eq!(id, StateId::Measure);
    }
}
