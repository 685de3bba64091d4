//! pH Meter Firmware: Main Entry Point
//!
//! Hexagonal architecture: the acquisition task publishes conversions,
//! the main task runs the state machine against port adapters.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SharedSampleReader   Hd44780        NvsAdapter   LogEventSink │
//! │  (SampleSource)       (DisplayPort)  (Config+Cal) (EventSink)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Capture · Calibration                           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Core 1: SamplePublisher (AD7715 over bit-banged link)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::delay::Ets;
use log::{info, warn};

use phmeter::adapters::hardware::SharedSampleReader;
use phmeter::adapters::log_sink::LogEventSink;
use phmeter::adapters::nvs::NvsAdapter;
use phmeter::app::ports::{CalibrationPort, ConfigPort, DisplayPort};
use phmeter::app::service::AppService;
use phmeter::config::MeterConfig;
use phmeter::drivers::ad7715::Ad7715;
use phmeter::drivers::bitbang::BitBangSpi;
use phmeter::drivers::encoder::EncoderInput;
use phmeter::drivers::hd44780::Hd44780;
use phmeter::drivers::hw_init::{self, GpioPin};
use phmeter::drivers::task_pin::{self, Core};
use phmeter::pins;
use phmeter::sensors::SampleCell;
use phmeter::sensors::ph::CalibrationSet;
use phmeter::sensors::sampler::SamplePublisher;

const ADC_TASK_PRIORITY: u8 = 5;
const ADC_TASK_STACK_KB: usize = 4;

/// Give up the CPU for exactly one scheduler tick.
fn yield_tick() {
    // SAFETY: vTaskDelay only blocks the calling task.
    unsafe { esp_idf_svc::sys::vTaskDelay(1) };
}

/// Stored calibration if present and usable, factory default if absent.
fn load_calibration(nvs: &NvsAdapter) -> phmeter::error::Result<CalibrationSet> {
    let Some(set) = nvs.load_set()? else {
        info!("No stored calibration, using factory default");
        return Ok(CalibrationSet::factory_default());
    };
    set.validate()?;
    info!("Calibration loaded from NVS: {:?}", set.points());
    Ok(set)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  pH Meter v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware peripherals ───────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        log::error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 3. Config + calibration from NVS (or defaults) ────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            MeterConfig::default()
        }
    };
    let calibration = match load_calibration(&nvs) {
        Ok(set) => set,
        Err(e) => {
            warn!("Stored calibration unusable ({}), using factory default", e);
            CalibrationSet::factory_default()
        }
    };

    // ── 4. Encoder + button interrupts ────────────────────────
    let input: &'static EncoderInput = Box::leak(Box::new(EncoderInput::new()));
    if let Err(e) = hw_init::init_isr_service(input) {
        log::error!("ISR service init failed: {}, continuing without input", e);
    }

    // ── 5. Acquisition task on the APP core ───────────────────
    let cell = Arc::new(SampleCell::new());
    let publisher_cell = cell.clone();
    let settle_ms = config.adc_settle_ms;
    task_pin::spawn_on_core(
        Core::App,
        ADC_TASK_PRIORITY,
        ADC_TASK_STACK_KB,
        "adc\0",
        move || {
            let link = BitBangSpi::new(
                GpioPin::new(pins::ADC_SCLK_GPIO),
                GpioPin::new(pins::ADC_DIN_GPIO),
                GpioPin::new(pins::ADC_DOUT_GPIO),
                GpioPin::new(pins::ADC_CS_GPIO),
                Ets,
                pins::ADC_HALF_PERIOD_US,
            );
            SamplePublisher::new(Ad7715::new(link), publisher_cell).run(settle_ms, yield_tick)
        },
    )?;

    // ── 6. Display ────────────────────────────────────────────
    let mut lcd = Hd44780::new(
        GpioPin::new(pins::LCD_RS_GPIO),
        GpioPin::new(pins::LCD_EN_GPIO),
        GpioPin::new(pins::LCD_D4_GPIO),
        GpioPin::new(pins::LCD_D5_GPIO),
        GpioPin::new(pins::LCD_D6_GPIO),
        GpioPin::new(pins::LCD_D7_GPIO),
        Ets,
    );
    lcd.init(config.display_cols, config.display_rows);
    AppService::wait_for_display(&lcd, yield_tick);
    AppService::show_splash(&mut lcd);

    // ── 7. Application service ────────────────────────────────
    let mut samples = SharedSampleReader::new(cell, yield_tick);
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(config, calibration);
    app.start(&mut sink);

    info!("Entering main loop");

    // ── 8. Main loop ──────────────────────────────────────────
    loop {
        app.tick(input, &mut samples, &mut lcd, &mut nvs, &mut sink);
        yield_tick();
    }
}
