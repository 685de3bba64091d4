//! GPIO pin assignments for the pH meter main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// AD7715 front end (bit-banged serial link)
// ---------------------------------------------------------------------------

/// Serial clock output, idles high.
pub const ADC_SCLK_GPIO: i32 = 4;
/// Data into the ADC (DIN).
pub const ADC_DIN_GPIO: i32 = 5;
/// Data out of the ADC (DOUT).
pub const ADC_DOUT_GPIO: i32 = 6;
/// Chip select, active low.
pub const ADC_CS_GPIO: i32 = 7;

/// Half period of the bit-banged clock in microseconds.
pub const ADC_HALF_PERIOD_US: u32 = 2;

// ---------------------------------------------------------------------------
// Rotary encoder with push-button (active-low, pull-ups enabled)
// ---------------------------------------------------------------------------

/// Phase A: falling edge interrupt.
pub const ENCODER_A_GPIO: i32 = 15;
/// Phase B: sampled inside the phase A interrupt.
pub const ENCODER_B_GPIO: i32 = 16;
/// Push-button: falling edge interrupt.
pub const ENCODER_BUTTON_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// HD44780 character display (4-bit bus, write only)
// ---------------------------------------------------------------------------

pub const LCD_RS_GPIO: i32 = 8;
pub const LCD_EN_GPIO: i32 = 9;
pub const LCD_D4_GPIO: i32 = 10;
pub const LCD_D5_GPIO: i32 = 11;
pub const LCD_D6_GPIO: i32 = 12;
pub const LCD_D7_GPIO: i32 = 13;
