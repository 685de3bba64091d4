//! Hardware adapter: bridges the acquisition task to the sample port.
//!
//! [`SharedSampleReader`] reads the [`SampleCell`] the AD7715 task
//! publishes into.  Batches yield between reads so the acquisition task
//! gets to publish fresh conversions while a stability wait is running.

use std::sync::Arc;

use crate::app::ports::SampleSource;
use crate::sensors::SampleCell;
use crate::sensors::stability::SampleBatch;

/// [`SampleSource`] over a shared latest-sample slot.
pub struct SharedSampleReader<Y> {
    cell: Arc<SampleCell>,
    yield_now: Y,
}

impl<Y: FnMut()> SharedSampleReader<Y> {
    /// `yield_now` is called between the reads of a batch.
    pub fn new(cell: Arc<SampleCell>, yield_now: Y) -> Self {
        Self { cell, yield_now }
    }

    /// Conversions published since boot.
    pub fn published(&self) -> u32 {
        self.cell.published()
    }
}

impl<Y: FnMut()> SampleSource for SharedSampleReader<Y> {
    fn latest(&mut self) -> u16 {
        self.cell.latest()
    }

    fn read_batch(&mut self, len: u16) -> Option<SampleBatch> {
        let cell = &self.cell;
        let yield_now = &mut self.yield_now;
        SampleBatch::collect((0..len).map(|i| {
            if i > 0 {
                yield_now();
            }
            cell.latest()
        }))
    }
}
