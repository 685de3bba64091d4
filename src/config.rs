//! Meter configuration parameters
//!
//! All tunable parameters for the pH meter.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core meter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterConfig {
    // --- Display ---
    /// Character columns on the display
    pub display_cols: u8,
    /// Character rows on the display
    pub display_rows: u8,

    // --- ADC ---
    /// Delay between the self-calibration setup write and the normal-mode write (ms)
    pub adc_settle_ms: u32,

    // --- Calibration ---
    /// Reference value change per encoder detent (thousandths of pH)
    pub reference_step: u16,
    /// Raw reads per stability batch
    pub stability_batch_len: u16,
    /// A batch is stable when the sum of absolute differences stays below this
    pub stability_threshold: u32,
    /// Capture succeeds once the run of stable batches exceeds this
    pub stability_required_batches: u16,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            // Display (HD44780 16x2)
            display_cols: 16,
            display_rows: 2,

            // ADC
            adc_settle_ms: 5,

            // Calibration
            reference_step: 10, // 0.01 pH per detent
            stability_batch_len: 100,
            stability_threshold: 5,
            stability_required_batches: 100,
        }
    }
}
