//! Bit-banged serial transport for the AD7715.
//!
//! Four GPIO lines: SCLK (idles high), DIN into the converter, DOUT out of
//! it, and an active-low chip select.  Bytes shift MSB first.  For every
//! bit the clock drops, DIN is driven, and the clock rises; the converter
//! latches DIN on the rising edge and DOUT is sampled right after it.
//!
//! ```text
//! SCLK  ‾‾‾\___/‾‾‾\___/‾‾‾ … ‾‾‾
//! DIN   ====X b7 ==X b6 ==  …
//! DOUT  sampled   ^       ^
//! ```
//!
//! There is no fault detection on this link: a timing fault only shows up
//! as a wrong sample further up the stack.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Number of clock pulses with DIN held high that resets the serial
/// interface of the AD7715.
pub const RESET_PULSES: u32 = 32;

/// Byte-level access to the converter's serial port.
///
/// [`BitBangSpi`] is the GPIO implementation; tests substitute a recorder.
pub trait ByteTransport {
    /// Assert chip select.
    fn select(&mut self);
    /// Release chip select.
    fn deselect(&mut self);
    /// Shift one byte out and one byte in, MSB first.
    fn transfer_byte(&mut self, out: u8) -> u8;
    /// Resynchronise the serial interface (no data exchanged).
    fn reset(&mut self);
    /// Coarse millisecond wait.
    fn delay_ms(&mut self, ms: u32);
}

/// GPIO bit-bang implementation of [`ByteTransport`].
///
/// Pin errors are `Infallible`; every pin the firmware hands in is a plain
/// register write that cannot fail.
pub struct BitBangSpi<SCLK, DIN, DOUT, CS, D> {
    sclk: SCLK,
    din: DIN,
    dout: DOUT,
    cs: CS,
    delay: D,
    half_period_us: u32,
}

impl<SCLK, DIN, DOUT, CS, D> BitBangSpi<SCLK, DIN, DOUT, CS, D>
where
    SCLK: OutputPin<Error = Infallible>,
    DIN: OutputPin<Error = Infallible>,
    DOUT: InputPin<Error = Infallible>,
    CS: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    /// Take ownership of the pins and park the bus: clock high, deselected.
    pub fn new(sclk: SCLK, din: DIN, dout: DOUT, cs: CS, delay: D, half_period_us: u32) -> Self {
        let mut bus = Self {
            sclk,
            din,
            dout,
            cs,
            delay,
            half_period_us,
        };
        let Ok(()) = bus.sclk.set_high();
        let Ok(()) = bus.cs.set_high();
        bus
    }

    /// Give the pins back.
    pub fn release(self) -> (SCLK, DIN, DOUT, CS, D) {
        (self.sclk, self.din, self.dout, self.cs, self.delay)
    }

    fn clock_pulse(&mut self) {
        let Ok(()) = self.sclk.set_low();
        self.delay.delay_us(self.half_period_us);
        let Ok(()) = self.sclk.set_high();
        self.delay.delay_us(self.half_period_us);
    }
}

impl<SCLK, DIN, DOUT, CS, D> ByteTransport for BitBangSpi<SCLK, DIN, DOUT, CS, D>
where
    SCLK: OutputPin<Error = Infallible>,
    DIN: OutputPin<Error = Infallible>,
    DOUT: InputPin<Error = Infallible>,
    CS: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    fn select(&mut self) {
        let Ok(()) = self.cs.set_low();
    }

    fn deselect(&mut self) {
        let Ok(()) = self.cs.set_high();
    }

    fn transfer_byte(&mut self, out: u8) -> u8 {
        let mut input = 0u8;
        for bit in (0..8).rev() {
            let Ok(()) = self.sclk.set_low();
            let Ok(()) = self.din.set_state(PinState::from(out & (1 << bit) != 0));
            self.delay.delay_us(self.half_period_us);
            let Ok(()) = self.sclk.set_high();
            self.delay.delay_us(self.half_period_us);
            let Ok(high) = self.dout.is_high();
            input = (input << 1) | u8::from(high);
        }
        input
    }

    fn reset(&mut self) {
        let Ok(()) = self.cs.set_low();
        let Ok(()) = self.din.set_high();
        for _ in 0..RESET_PULSES {
            self.clock_pulse();
        }
        let Ok(()) = self.cs.set_high();
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
