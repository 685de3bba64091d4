//! Continuous AD7715 acquisition.
//!
//! Startup: reset the serial interface, write the setup register in
//! self-calibration mode, let the calibration settle, then rewrite setup in
//! normal mode.  After that the loop polls DRDY, reads a finished
//! conversion into the shared [`SampleCell`], and yields.  Conversions that
//! arrive faster than readers look are simply overwritten.

use std::sync::Arc;

use log::{debug, info};

use super::SampleCell;
use crate::drivers::ad7715::{Ad7715, Mode, SetupReg};
use crate::drivers::bitbang::ByteTransport;

pub struct SamplePublisher<T> {
    adc: Ad7715<T>,
    cell: Arc<SampleCell>,
}

impl<T: ByteTransport> SamplePublisher<T> {
    pub fn new(adc: Ad7715<T>, cell: Arc<SampleCell>) -> Self {
        Self { adc, cell }
    }

    /// Bring the converter up in the meter's fixed configuration.
    pub fn start(&mut self, settle_ms: u32) {
        self.adc.reset();
        self.adc.write_setup(SetupReg::meter(Mode::SelfCalibration));
        self.adc.delay_ms(settle_ms);
        self.adc.write_setup(SetupReg::meter(Mode::Normal));
        info!(
            "sampler: AD7715 up (bipolar, unbuffered, 2.4576 MHz, 50 Hz, settle {} ms)",
            settle_ms
        );
    }

    /// One acquisition step.  Returns the code if a conversion was read.
    pub fn poll(&mut self) -> Option<u16> {
        if !self.adc.data_ready() {
            return None;
        }
        let code = self.adc.read_data();
        self.cell.publish(code);
        debug!("sampler: code {}", code);
        Some(code)
    }

    /// Start the converter and publish forever, yielding after every step.
    pub fn run(mut self, settle_ms: u32, mut yield_now: impl FnMut()) -> ! {
        self.start(settle_ms);
        loop {
            self.poll();
            yield_now();
        }
    }

    pub fn adc_mut(&mut self) -> &mut Ad7715<T> {
        &mut self.adc
    }
}
