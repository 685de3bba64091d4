//! Fuzz target: encoder/button sequences through the application service
//!
//! Each input byte is one pass: bits 0..1 pick rotation, bit 2 presses
//! the button, the upper bits perturb the ADC code.  Verifies:
//! - No panics under arbitrary input
//! - The active calibration set stays valid
//! - The reading stays within 0.00..=14.00
//!
//! cargo fuzz run fuzz_input_sequence

#![no_main]

use libfuzzer_sys::fuzz_target;
use phmeter::app::events::AppEvent;
use phmeter::app::ports::{CalibrationPort, DisplayPort, EventSink, SampleSource, StorageError};
use phmeter::app::service::AppService;
use phmeter::config::MeterConfig;
use phmeter::drivers::encoder::EncoderInput;
use phmeter::sensors::ph::{CalibrationPoint, CalibrationSet};

struct Code(u16);

impl SampleSource for Code {
    fn latest(&mut self) -> u16 {
        self.0
    }
}

struct NullDisplay;

impl DisplayPort for NullDisplay {
    fn init(&mut self, _cols: u8, _rows: u8) {}
    fn clear(&mut self) {}
    fn write(&mut self, _col: u8, _row: u8, _text: &str) {}
    fn is_ready(&self) -> bool {
        true
    }
}

struct NullStore;

impl CalibrationPort for NullStore {
    fn save_point(&mut self, _index: usize, _point: CalibrationPoint) -> Result<(), StorageError> {
        Ok(())
    }

    fn load_set(&self) -> Result<Option<CalibrationSet>, StorageError> {
        Ok(None)
    }
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let config = MeterConfig {
        stability_batch_len: 4,
        stability_required_batches: 1,
        ..MeterConfig::default()
    };
    let input = EncoderInput::new();
    let mut samples = Code(33_000);
    let mut app = AppService::new(config, CalibrationSet::factory_default());
    app.start(&mut NullSink);

    for &b in data {
        match b & 0b11 {
            1 => input.on_phase_a_fall(true),
            2 => input.on_phase_a_fall(false),
            _ => {}
        }
        if b & 0b100 != 0 {
            input.on_button_fall();
        }
        samples.0 = samples.0.wrapping_add(u16::from(b >> 3) * 997);

        app.tick(&input, &mut samples, &mut NullDisplay, &mut NullStore, &mut NullSink);

        assert!(app.calibration().validate().is_ok(), "active set degenerate");
        assert!(app.ph() <= 1400, "reading out of range");
    }
});
