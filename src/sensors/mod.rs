//! Sensor subsystem: the AD7715 acquisition loop, the latest-sample slot
//! it publishes into, and the calibration and stability logic that turns
//! raw codes into a pH reading.
//!
//! ```text
//!  Ad7715 ──▶ SamplePublisher ──▶ SampleCell ──▶ SampleSource ──▶ FSM
//!                (adc task)      (AtomicU16)     (main task)
//! ```

pub mod ph;
pub mod sampler;
pub mod stability;

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

/// Single-slot, last-writer-wins holder for the newest ADC code.
///
/// One writer (the acquisition task), any number of readers.  Reads
/// between two publishes return the same value.
#[derive(Debug, Default)]
pub struct SampleCell {
    latest: AtomicU16,
    published: AtomicU32,
}

impl SampleCell {
    pub const fn new() -> Self {
        Self {
            latest: AtomicU16::new(0),
            published: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, code: u16) {
        self.latest.store(code, Ordering::Release);
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latest(&self) -> u16 {
        self.latest.load(Ordering::Acquire)
    }

    /// Number of conversions published since boot (wraps).
    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Relaxed)
    }
}
