//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!  MEASURE ──[btn]──▶ MENU_CAL2 ◀──▶ MENU_CAL3 ◀──▶ MENU_EXIT ──[btn]──▶ MEASURE
//!                         │              │
//!                       [btn]          [btn]
//!                         ▼              ▼
//!            CAL2_P1 ⇄ CAL2_P2 ⇄ CAL2_EXIT     CAL3_P1 ⇄ CAL3_P2 ⇄ CAL3_P3 ⇄ CAL3_EXIT
//!                 │                                 │
//!               [btn on a point]                  [btn on a point]
//!                 ▼                                 ▼
//!              CAPTURE ──[done]──▶ owning menu
//! ```
//!
//! Every pass a state renders its label plus the live reading, then acts
//! on the drained input.  Rotation down moves forward through a ring and
//! rotation up moves backward.

use super::capture::{CaptureOutcome, CapturePhase, CaptureSession, CaptureStep};
use super::context::{FsmContext, Notice};
use super::{StateDescriptor, StateId};
use crate::drivers::encoder::Rotation;
use crate::sensors::ph::{CalibrationMode, CentiPh, reference_as_centi};
use log::{info, warn};

const CAL2_RING: [StateId; 3] = [StateId::Cal2Point1, StateId::Cal2Point2, StateId::Cal2Exit];
const CAL3_RING: [StateId; 4] = [
    StateId::Cal3Point1,
    StateId::Cal3Point2,
    StateId::Cal3Point3,
    StateId::Cal3Exit,
];

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Measure
        StateDescriptor {
            id: StateId::Measure,
            name: "Measure",
            on_enter: Some(measure_enter),
            on_exit: None,
            on_update: measure_update,
        },
        // Index 1: MenuCal2
        StateDescriptor {
            id: StateId::MenuCal2,
            name: "MenuCal2",
            on_enter: None,
            on_exit: None,
            on_update: menu_cal2_update,
        },
        // Index 2: MenuCal3
        StateDescriptor {
            id: StateId::MenuCal3,
            name: "MenuCal3",
            on_enter: None,
            on_exit: None,
            on_update: menu_cal3_update,
        },
        // Index 3: MenuExit
        StateDescriptor {
            id: StateId::MenuExit,
            name: "MenuExit",
            on_enter: None,
            on_exit: None,
            on_update: menu_exit_update,
        },
        // Index 4: Cal2Point1
        StateDescriptor {
            id: StateId::Cal2Point1,
            name: "Cal2Point1",
            on_enter: None,
            on_exit: None,
            on_update: cal2_point1_update,
        },
        // Index 5: Cal2Point2
        StateDescriptor {
            id: StateId::Cal2Point2,
            name: "Cal2Point2",
            on_enter: None,
            on_exit: None,
            on_update: cal2_point2_update,
        },
        // Index 6: Cal2Exit
        StateDescriptor {
            id: StateId::Cal2Exit,
            name: "Cal2Exit",
            on_enter: None,
            on_exit: None,
            on_update: cal2_exit_update,
        },
        // Index 7: Cal3Point1
        StateDescriptor {
            id: StateId::Cal3Point1,
            name: "Cal3Point1",
            on_enter: None,
            on_exit: None,
            on_update: cal3_point1_update,
        },
        // Index 8: Cal3Point2
        StateDescriptor {
            id: StateId::Cal3Point2,
            name: "Cal3Point2",
            on_enter: None,
            on_exit: None,
            on_update: cal3_point2_update,
        },
        // Index 9: Cal3Point3
        StateDescriptor {
            id: StateId::Cal3Point3,
            name: "Cal3Point3",
            on_enter: None,
            on_exit: None,
            on_update: cal3_point3_update,
        },
        // Index 10: Cal3Exit
        StateDescriptor {
            id: StateId::Cal3Exit,
            name: "Cal3Exit",
            on_enter: None,
            on_exit: None,
            on_update: cal3_exit_update,
        },
        // Index 11: Capture
        StateDescriptor {
            id: StateId::Capture,
            name: "Capture",
            on_enter: Some(capture_enter),
            on_exit: Some(capture_exit),
            on_update: capture_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  MEASURE state
// ═══════════════════════════════════════════════════════════════════════════

fn measure_enter(ctx: &mut FsmContext) {
    info!(
        "MEASURE: {}-point calibration active",
        if ctx.engine.set().is_two_point() { 2 } else { 3 }
    );
}

fn measure_update(ctx: &mut FsmContext) -> Option<StateId> {
    let ph = CentiPh(ctx.ph());
    ctx.screen.set_line(0, format_args!("pH:{}", ph));
    let flag = if ctx.calibration_fault { " CAL!" } else { "" };
    ctx.screen.set_line(1, format_args!("AD:{}{}", ctx.raw, flag));

    if ctx.input.button {
        return Some(StateId::MenuCal2);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  MENU states: pick 2-point, 3-point or leave
// ═══════════════════════════════════════════════════════════════════════════

fn render_menu(ctx: &mut FsmContext, label: &str) {
    let ph = CentiPh(ctx.ph());
    ctx.screen.set_line(0, format_args!("{}", label));
    ctx.screen.set_line(1, format_args!("pH:{}", ph));
}

/// Shared menu logic: button enters, up/down move between the three entries.
fn menu_step(ctx: &FsmContext, enter: StateId, up: StateId, down: StateId) -> Option<StateId> {
    if ctx.input.button {
        return Some(enter);
    }
    match ctx.input.rotation {
        Some(Rotation::Up) => Some(up),
        Some(Rotation::Down) => Some(down),
        None => None,
    }
}

fn menu_cal2_update(ctx: &mut FsmContext) -> Option<StateId> {
    render_menu(ctx, "Cal 2 point");
    menu_step(ctx, StateId::Cal2Point1, StateId::MenuExit, StateId::MenuCal3)
}

fn menu_cal3_update(ctx: &mut FsmContext) -> Option<StateId> {
    render_menu(ctx, "Cal 3 point");
    menu_step(ctx, StateId::Cal3Point1, StateId::MenuCal2, StateId::MenuExit)
}

fn menu_exit_update(ctx: &mut FsmContext) -> Option<StateId> {
    render_menu(ctx, "Exit");
    menu_step(ctx, StateId::Measure, StateId::MenuCal3, StateId::MenuCal2)
}

// ═══════════════════════════════════════════════════════════════════════════
//  POINT / EXIT states: choose which slot to capture
// ═══════════════════════════════════════════════════════════════════════════

/// Static description of one point or exit state.
struct PointState {
    label: &'static str,
    mode: CalibrationMode,
    /// Slot to capture; `None` for the exit entry.
    index: Option<usize>,
}

fn point_state(id: StateId) -> PointState {
    let (label, mode, index) = match id {
        StateId::Cal2Point1 => ("Cal2 P1", CalibrationMode::TwoPoint, Some(0)),
        StateId::Cal2Point2 => ("Cal2 P2", CalibrationMode::TwoPoint, Some(1)),
        StateId::Cal2Exit => ("Cal2 exit", CalibrationMode::TwoPoint, None),
        StateId::Cal3Point1 => ("Cal3 P1", CalibrationMode::ThreePoint, Some(0)),
        StateId::Cal3Point2 => ("Cal3 P2", CalibrationMode::ThreePoint, Some(1)),
        StateId::Cal3Point3 => ("Cal3 P3", CalibrationMode::ThreePoint, Some(2)),
        _ => ("Cal3 exit", CalibrationMode::ThreePoint, None),
    };
    PointState { label, mode, index }
}

/// Menu state that owns a calibration flow.
pub fn owning_menu(mode: CalibrationMode) -> StateId {
    match mode {
        CalibrationMode::TwoPoint => StateId::MenuCal2,
        CalibrationMode::ThreePoint => StateId::MenuCal3,
    }
}

/// Neighbour of `current` in `ring`: down is forward, up is backward.
fn cycle(ring: &[StateId], current: StateId, rotation: Rotation) -> Option<StateId> {
    let pos = ring.iter().position(|&s| s == current)?;
    let len = ring.len();
    let next = match rotation {
        Rotation::Down => (pos + 1) % len,
        Rotation::Up => (pos + len - 1) % len,
    };
    Some(ring[next])
}

fn point_update(ctx: &mut FsmContext, id: StateId) -> Option<StateId> {
    let point = point_state(id);
    ctx.screen.set_line(0, format_args!("{}", point.label));
    ctx.screen.set_line(1, format_args!("AD:{}", ctx.raw));

    if ctx.input.button {
        let Some(index) = point.index else {
            return Some(owning_menu(point.mode));
        };
        let initial = ctx
            .engine
            .set()
            .point(index)
            .map_or(0, |p| p.reference_value);
        ctx.capture = Some(CaptureSession::new(point.mode, index, initial, &ctx.config));
        return Some(StateId::Capture);
    }

    let ring: &[StateId] = match point.mode {
        CalibrationMode::TwoPoint => &CAL2_RING,
        CalibrationMode::ThreePoint => &CAL3_RING,
    };
    ctx.input.rotation.and_then(|r| cycle(ring, id, r))
}

fn cal2_point1_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal2Point1)
}

fn cal2_point2_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal2Point2)
}

fn cal2_exit_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal2Exit)
}

fn cal3_point1_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal3Point1)
}

fn cal3_point2_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal3Point2)
}

fn cal3_point3_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal3Point3)
}

fn cal3_exit_update(ctx: &mut FsmContext) -> Option<StateId> {
    point_update(ctx, StateId::Cal3Exit)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CAPTURE state: runs the capture sub-protocol for one slot
// ═══════════════════════════════════════════════════════════════════════════

fn capture_enter(ctx: &mut FsmContext) {
    let Some((mode, index)) = ctx.capture.as_ref().map(|s| (s.mode(), s.index())) else {
        return;
    };
    info!("CAPTURE: {:?} point {} started", mode, index + 1);
    ctx.notify(Notice::CaptureStarted { mode, index });
}

fn capture_exit(ctx: &mut FsmContext) {
    ctx.capture = None;
    ctx.batch = None;
}

fn capture_update(ctx: &mut FsmContext) -> Option<StateId> {
    let Some(session) = ctx.capture.as_mut() else {
        warn!("CAPTURE: no session, returning to Measure");
        return Some(StateId::Measure);
    };
    let batch = ctx.batch.take();
    let (mode, index) = (session.mode(), session.index());

    match session.step(ctx.input, batch.as_ref()) {
        CaptureStep::Running { cleared } => {
            if cleared {
                ctx.screen.request_clear();
            }
            render_capture(ctx);
            None
        }
        CaptureStep::Finished(outcome) => {
            finish_capture(ctx, mode, index, outcome);
            Some(owning_menu(mode))
        }
    }
}

fn render_capture(ctx: &mut FsmContext) {
    let Some(session) = ctx.capture.as_ref() else {
        return;
    };
    let n = session.index() + 1;
    let reference = reference_as_centi(session.reference());
    let screen = &mut ctx.screen;
    match session.phase() {
        CapturePhase::SetReference => {
            screen.set_line(0, format_args!("Ref. pH({})", n));
            screen.set_line(1, format_args!("{}", reference));
        }
        CapturePhase::Confirm => {
            let choice = if session.confirmed() { "OK" } else { "NOT OK" };
            screen.set_line(0, format_args!("Ref. pH({})", n));
            screen.set_line(1, format_args!("{} {}", reference, choice));
        }
        CapturePhase::Stabilize => {
            screen.set_line(0, format_args!("Stabilizing {}", n));
            screen.set_line(
                1,
                format_args!("AD:{} {}", ctx.raw, session.stability_counter()),
            );
        }
        CapturePhase::SaveConfirm => {
            let choice = if session.save() { "DA" } else { "NE" };
            screen.set_line(0, format_args!("P{} {}", n, session.captured().unwrap_or(0)));
            screen.set_line(1, format_args!("{}", choice));
        }
    }
}

fn finish_capture(
    ctx: &mut FsmContext,
    mode: CalibrationMode,
    index: usize,
    outcome: CaptureOutcome,
) {
    info!("CAPTURE: point {} finished: {:?}", index + 1, outcome);
    ctx.notify(Notice::CaptureFinished { index, outcome });

    let CaptureOutcome::Commit(point) = outcome else {
        return;
    };
    match ctx.engine.commit_point(mode, index, point) {
        Ok(changed) => {
            ctx.calibration_fault = false;
            info!(
                "CAPTURE: slot {} = raw {} / ref {}",
                index + 1,
                point.raw_code,
                point.reference_value
            );
            ctx.notify(Notice::Committed {
                mode,
                index,
                point,
                changed,
            });
        }
        Err(e) => {
            ctx.calibration_fault = true;
            warn!("CAPTURE: commit rejected ({}), keeping previous calibration", e);
            ctx.notify(Notice::Rejected(e));
        }
    }
}
