//! Stability wait for calibration capture.
//!
//! Readings are taken in batches.  A batch is stable when the sum of
//! absolute differences between consecutive reads stays under a threshold.
//! Every stable batch bumps a counter and any unstable batch zeroes it;
//! once the counter exceeds the required run, the last raw code of that
//! batch is the captured value.

use crate::config::MeterConfig;

/// Summary of one batch of consecutive reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleBatch {
    pub sum_abs_diff: u32,
    pub last: u16,
    pub len: u16,
}

impl SampleBatch {
    /// Fold a run of reads.  `None` for an empty run.
    pub fn collect(samples: impl IntoIterator<Item = u16>) -> Option<Self> {
        let mut iter = samples.into_iter();
        let first = iter.next()?;
        let mut batch = Self {
            sum_abs_diff: 0,
            last: first,
            len: 1,
        };
        for s in iter {
            batch.sum_abs_diff = batch
                .sum_abs_diff
                .saturating_add(u32::from(s.abs_diff(batch.last)));
            batch.last = s;
            batch.len = batch.len.saturating_add(1);
        }
        Some(batch)
    }

    pub fn from_samples(samples: &[u16]) -> Option<Self> {
        Self::collect(samples.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub struct StabilityGate {
    counter: u16,
    threshold: u32,
    required: u16,
}

impl StabilityGate {
    pub const fn new(threshold: u32, required: u16) -> Self {
        Self {
            counter: 0,
            threshold,
            required,
        }
    }

    pub fn from_config(cfg: &MeterConfig) -> Self {
        Self::new(cfg.stability_threshold, cfg.stability_required_batches)
    }

    /// Account one batch; `Some(raw)` once the reading has settled.
    pub fn feed(&mut self, batch: &SampleBatch) -> Option<u16> {
        if batch.sum_abs_diff < self.threshold {
            self.counter = self.counter.saturating_add(1);
        } else {
            self.counter = 0;
        }
        (self.counter > self.required).then_some(batch.last)
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::from_config(&MeterConfig::default())
    }
}
