//! Calibration engine: raw AD7715 codes to pH.
//!
//! A calibration set holds three `(raw_code, reference_value)` slots.
//! Reference values are thousandths of a pH unit with full scale
//! [`REFERENCE_FULL_SCALE`]; [`CalibrationSet::convert`] returns hundredths
//! (centi-pH).  Slot 3 holding [`CalibrationPoint::UNUSED`] puts the set in
//! 2-point mode.
//!
//! ## Segment selection
//!
//! ```text
//!   slot 3 unused, or raw < p2.raw  ──▶  interpolate p1..p2
//!   otherwise                        ──▶  interpolate p2..p3
//! ```
//!
//! The result is clamped to `[0, REFERENCE_FULL_SCALE]` before scaling, so
//! extrapolation past either end never leaves the displayable range.

use core::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Number of calibration slots.
pub const SLOTS: usize = 3;

/// Upper clamp for interpolated reference values (pH 14.000).
pub const REFERENCE_FULL_SCALE: u16 = 14_000;

/// Reference units per displayed centi-pH.
const REFERENCE_PER_CENTI: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub raw_code: u16,
    pub reference_value: u16,
}

impl CalibrationPoint {
    /// Marker for an unused slot 3.
    pub const UNUSED: Self = Self::new(0, 0);

    pub const fn new(raw_code: u16, reference_value: u16) -> Self {
        Self {
            raw_code,
            reference_value,
        }
    }

    pub const fn is_unused(&self) -> bool {
        self.raw_code == 0 && self.reference_value == 0
    }
}

/// Which capture flow a commit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    TwoPoint,
    ThreePoint,
}

impl CalibrationMode {
    /// Number of capturable points in this mode.
    pub const fn points(self) -> usize {
        match self {
            Self::TwoPoint => 2,
            Self::ThreePoint => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSet {
    points: [CalibrationPoint; SLOTS],
}

impl CalibrationSet {
    pub const fn new(points: [CalibrationPoint; SLOTS]) -> Self {
        Self { points }
    }

    /// Shipped calibration: pH 0, 7 and 13.5.
    pub const fn factory_default() -> Self {
        Self::new([
            CalibrationPoint::new(13_000, 0),
            CalibrationPoint::new(33_000, 7_000),
            CalibrationPoint::new(53_000, 13_500),
        ])
    }

    pub const fn points(&self) -> &[CalibrationPoint; SLOTS] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<CalibrationPoint> {
        self.points.get(index).copied()
    }

    pub const fn is_two_point(&self) -> bool {
        self.points[2].is_unused()
    }

    /// Copy of this set with `index` replaced.
    pub fn with_point(
        &self,
        index: usize,
        point: CalibrationPoint,
    ) -> Result<Self, CalibrationError> {
        let mut next = *self;
        let slot = next
            .points
            .get_mut(index)
            .ok_or(CalibrationError::SlotOutOfRange(index))?;
        *slot = point;
        Ok(next)
    }

    /// Reject sets whose used segments are not strictly increasing in raw
    /// code.  Segment selection in [`convert`](Self::convert) assumes it.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let [p1, p2, p3] = self.points;
        check_segment(0, p1, p2)?;
        if !self.is_two_point() {
            check_segment(1, p2, p3)?;
        }
        Ok(())
    }

    /// Raw code to centi-pH.
    pub fn convert(&self, raw: u16) -> u16 {
        let [p1, p2, p3] = self.points;
        if p3.is_unused() || raw < p2.raw_code {
            interpolate(p1, p2, raw)
        } else {
            interpolate(p2, p3, raw)
        }
    }
}

impl Default for CalibrationSet {
    fn default() -> Self {
        Self::factory_default()
    }
}

fn check_segment(
    segment: u8,
    a: CalibrationPoint,
    b: CalibrationPoint,
) -> Result<(), CalibrationError> {
    match a.raw_code.cmp(&b.raw_code) {
        core::cmp::Ordering::Less => Ok(()),
        core::cmp::Ordering::Equal => Err(CalibrationError::Degenerate { segment }),
        core::cmp::Ordering::Greater => Err(CalibrationError::OutOfOrder { segment }),
    }
}

fn interpolate(a: CalibrationPoint, b: CalibrationPoint, raw: u16) -> u16 {
    let y0 = f64::from(a.reference_value);
    let y = if a.raw_code == b.raw_code {
        y0
    } else {
        let dx = f64::from(b.raw_code) - f64::from(a.raw_code);
        let dy = f64::from(b.reference_value) - y0;
        y0 + dy / dx * (f64::from(raw) - f64::from(a.raw_code))
    };
    let clamped = y.clamp(0.0, f64::from(REFERENCE_FULL_SCALE));
    (clamped / REFERENCE_PER_CENTI) as u16
}

/// Owns the active calibration set.
///
/// The set is only ever swapped as a whole, so a reader never sees a
/// half-updated calibration.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    active: CalibrationSet,
}

impl CalibrationEngine {
    pub fn new(active: CalibrationSet) -> Self {
        Self { active }
    }

    pub fn set(&self) -> &CalibrationSet {
        &self.active
    }

    pub fn convert(&self, raw: u16) -> u16 {
        self.active.convert(raw)
    }

    /// Install `next` if it passes [`CalibrationSet::validate`].
    pub fn replace(&mut self, next: CalibrationSet) -> Result<(), CalibrationError> {
        if let Err(e) = next.validate() {
            warn!("ph: keeping active calibration, {}: {:?}", e, next.points());
            return Err(e);
        }
        self.active = next;
        Ok(())
    }

    /// Commit a captured point.
    ///
    /// A 2-point commit also clears slot 3.  Returns the slots that changed
    /// so the caller can persist them.  On error the active set is
    /// untouched.  Slot 3 refuses `(0, 0)`, the unused marker.
    pub fn commit_point(
        &mut self,
        mode: CalibrationMode,
        index: usize,
        point: CalibrationPoint,
    ) -> Result<heapless::Vec<(usize, CalibrationPoint), SLOTS>, CalibrationError> {
        if index >= mode.points() {
            return Err(CalibrationError::SlotOutOfRange(index));
        }
        if index == 2 && point.is_unused() {
            return Err(CalibrationError::ReservedPoint);
        }

        let mut next = self.active.with_point(index, point)?;
        let mut changed = heapless::Vec::new();
        changed
            .push((index, point))
            .map_err(|_| CalibrationError::SlotOutOfRange(index))?;
        if mode == CalibrationMode::TwoPoint {
            next = next.with_point(2, CalibrationPoint::UNUSED)?;
            changed
                .push((2, CalibrationPoint::UNUSED))
                .map_err(|_| CalibrationError::SlotOutOfRange(2))?;
        }
        self.replace(next)?;
        Ok(changed)
    }
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(CalibrationSet::factory_default())
    }
}

/// Fixed-point pH formatter: centi-pH `700` renders as `7.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentiPh(pub u16);

impl fmt::Display for CentiPh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Reference value (thousandths) shown at centi-pH resolution.
pub fn reference_as_centi(reference_value: u16) -> CentiPh {
    CentiPh(reference_value / 10)
}
