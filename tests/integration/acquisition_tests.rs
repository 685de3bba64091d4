//! Acquisition pipeline: AD7715 framing → SampleCell → SampleSource → FSM.

use std::sync::Arc;

use crate::mock_hw::{MockDisplay, MockStore, RecordingSink, SimulatedAdc};

use phmeter::adapters::hardware::SharedSampleReader;
use phmeter::app::ports::SampleSource;
use phmeter::app::service::AppService;
use phmeter::config::MeterConfig;
use phmeter::drivers::ad7715::{Ad7715, Mode, SetupReg};
use phmeter::drivers::encoder::EncoderInput;
use phmeter::sensors::SampleCell;
use phmeter::sensors::ph::CalibrationSet;
use phmeter::sensors::sampler::SamplePublisher;

#[test]
fn start_runs_self_calibration_then_normal_mode() {
    let cell = Arc::new(SampleCell::new());
    let mut publisher = SamplePublisher::new(Ad7715::new(SimulatedAdc::new(0)), cell);
    publisher.start(7);

    let adc = publisher.adc_mut().bus_mut();
    assert_eq!(
        adc.setup_writes,
        [
            SetupReg::meter(Mode::SelfCalibration).bits(),
            SetupReg::meter(Mode::Normal).bits()
        ]
    );
    assert_eq!(adc.delays, [7]);
}

#[test]
fn conversions_are_published_only_when_ready() {
    let cell = Arc::new(SampleCell::new());
    let mut publisher = SamplePublisher::new(Ad7715::new(SimulatedAdc::new(41_234)), cell.clone());
    publisher.start(1);

    publisher.adc_mut().bus_mut().ready = false;
    assert_eq!(publisher.poll(), None);
    assert_eq!(cell.published(), 0);

    publisher.adc_mut().bus_mut().ready = true;
    assert_eq!(publisher.poll(), Some(41_234));
    assert_eq!(cell.latest(), 41_234);
    assert_eq!(cell.published(), 1);
}

#[test]
fn published_code_reaches_the_display() {
    let cell = Arc::new(SampleCell::new());
    let mut publisher = SamplePublisher::new(Ad7715::new(SimulatedAdc::new(53_000)), cell.clone());
    publisher.start(1);
    publisher.poll();

    let config = MeterConfig::default();
    let mut display = MockDisplay::ready(config.display_cols, config.display_rows);
    let mut samples = SharedSampleReader::new(cell, || {});
    let mut store = MockStore::new();
    let mut sink = RecordingSink::new();
    let input = EncoderInput::new();

    let mut app = AppService::new(config, CalibrationSet::factory_default());
    app.start(&mut sink);
    app.tick(&input, &mut samples, &mut display, &mut store, &mut sink);

    assert_eq!(display.row(0), "pH:13.50");
    assert_eq!(display.row(1), "AD:53000");
}

#[test]
fn batches_pick_up_conversions_published_while_waiting() {
    let cell = Arc::new(SampleCell::new());
    let publisher = std::cell::RefCell::new(SamplePublisher::new(
        Ad7715::new(SimulatedAdc::new(30_000)),
        cell.clone(),
    ));
    publisher.borrow_mut().start(1);
    publisher.borrow_mut().poll();

    let mut samples = SharedSampleReader::new(cell, || {
        let mut p = publisher.borrow_mut();
        let next = p.adc_mut().bus_mut().code + 3;
        p.adc_mut().bus_mut().code = next;
        p.poll();
    });

    let batch = samples.read_batch(5).unwrap();
    assert_eq!(batch.last, 30_012);
    assert_eq!(batch.sum_abs_diff, 12);
}
