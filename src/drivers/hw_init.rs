//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions and the per-pin ISR service using raw
//! ESP-IDF sys calls, and wraps GPIO numbers in [`GpioPin`] so the
//! bit-banged drivers can use the `embedded-hal` digital traits.  Called
//! once from `main()` before the acquisition task starts.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::drivers::encoder::EncoderInput;
#[cfg(any(target_os = "espidf", test))]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrHandlerFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrHandlerFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // (pin, idle level)
    let output_pins = [
        (pins::ADC_SCLK_GPIO, 1),
        (pins::ADC_DIN_GPIO, 1),
        (pins::ADC_CS_GPIO, 1),
        (pins::LCD_RS_GPIO, 0),
        (pins::LCD_EN_GPIO, 0),
        (pins::LCD_D4_GPIO, 0),
        (pins::LCD_D5_GPIO, 0),
        (pins::LCD_D6_GPIO, 0),
        (pins::LCD_D7_GPIO, 0),
    ];

    for &(pin, level) in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, level) };
    }

    info!("hw_init: GPIO outputs configured (ADC link, LCD bus)");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // Polled inputs.
    for &pin in &[pins::ADC_DOUT_GPIO, pins::ENCODER_B_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    // Falling-edge interrupt inputs (active-low with pull-up).
    for &pin in &[pins::ENCODER_A_GPIO, pins::ENCODER_BUTTON_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: GPIO inputs configured (ADC DOUT, encoder A/B, button)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs(); each pin is owned by exactly one driver.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── embedded-hal pin wrapper ──────────────────────────────────

/// A configured GPIO, addressed by number.
///
/// Construct one per physical line and hand it to exactly one driver.
#[derive(Debug)]
pub struct GpioPin(i32);

impl GpioPin {
    pub const fn new(gpio: i32) -> Self {
        Self(gpio)
    }

    pub const fn gpio(&self) -> i32 {
        self.0
    }
}

impl ErrorType for GpioPin {
    type Error = Infallible;
}

impl OutputPin for GpioPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, true);
        Ok(())
    }
}

impl InputPin for GpioPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(gpio_read(self.0))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!gpio_read(self.0))
    }
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn encoder_a_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static EncoderInput` registered below.
    let input = unsafe { &*(arg as *const EncoderInput) };
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let b_low = unsafe { gpio_get_level(pins::ENCODER_B_GPIO) } == 0;
    input.on_phase_a_fall(b_low);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static EncoderInput` registered below.
    let input = unsafe { &*(arg as *const EncoderInput) };
    input.on_button_fall();
}

/// Install the per-pin GPIO ISR service and register the encoder and
/// button handlers.  The ISR service acknowledges each pin's interrupt
/// status before the handler runs, so a fresh edge re-triggers.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(input: &'static EncoderInput) -> Result<(), HwInitError> {
    let arg = core::ptr::from_ref(input).cast_mut().cast::<core::ffi::c_void>();

    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handlers only touch atomics in
    // the leaked EncoderInput.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Encoder phase A: falling edge, B sampled inside the handler
        gpio_set_intr_type(pins::ENCODER_A_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        let ret = gpio_isr_handler_add(pins::ENCODER_A_GPIO, Some(encoder_a_isr), arg);
        if ret != ESP_OK as i32 { return Err(HwInitError::IsrHandlerFailed(ret)); }
        gpio_intr_enable(pins::ENCODER_A_GPIO);

        // Push-button: falling edge
        gpio_set_intr_type(pins::ENCODER_BUTTON_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        let ret = gpio_isr_handler_add(pins::ENCODER_BUTTON_GPIO, Some(button_isr), arg);
        if ret != ESP_OK as i32 { return Err(HwInitError::IsrHandlerFailed(ret)); }
        gpio_intr_enable(pins::ENCODER_BUTTON_GPIO);

        info!("hw_init: ISR service installed (encoder A, button)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_input: &'static EncoderInput) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
