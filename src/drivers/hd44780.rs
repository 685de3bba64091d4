//! HD44780 character display, 4-bit bus, write only.
//!
//! ## Init sequence
//!
//! | Step | Nibble / command          | Wait   |
//! |------|---------------------------|--------|
//! | 1    | (power-up settle)         | 45 ms  |
//! | 2-4  | `0x3` three times         | 5 ms   |
//! | 5    | `0x2` (enter 4-bit)       | 1 ms   |
//! | 6    | function set, display on, clear, entry mode | 5 ms |
//!
//! Text layout follows the usual LCD conventions: running off the last
//! column wraps to the next row, `\n` moves down a row keeping the column,
//! `\r` returns to column 0, and a row past the bottom wraps to row 0.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use heapless::Vec;
use log::info;

use crate::app::ports::DisplayPort;

// ── Command set ───────────────────────────────────────────────

const CMD_CLEAR_DISPLAY: u8 = 0x01;
const CMD_ENTRY_MODE_SET: u8 = 0x04;
const CMD_DISPLAY_CONTROL: u8 = 0x08;
const CMD_FUNCTION_SET: u8 = 0x20;
const CMD_SET_DDRAM_ADDR: u8 = 0x80;

const ENTRY_LEFT: u8 = 0x02;
const DISPLAY_ON: u8 = 0x04;
const FUNCTION_2LINE: u8 = 0x08;

/// DDRAM address of column 0 for each row.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// Largest geometry the row offset table covers.
pub const MAX_ROWS: u8 = 4;

/// E pulse width and hold time (µs).
const ENABLE_PULSE_US: u32 = 20;

// ── Cursor bookkeeping ────────────────────────────────────────

/// What the controller must be told for one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Move the DDRAM address.
    Goto(u8),
    /// Write a character at the current address.
    Char(u8),
}

/// Software cursor mirroring the controller's DDRAM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCursor {
    cols: u8,
    rows: u8,
    col: u8,
    row: u8,
}

impl TextCursor {
    pub fn new(cols: u8, rows: u8) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.clamp(1, MAX_ROWS),
            col: 0,
            row: 0,
        }
    }

    /// Place the cursor and return its DDRAM address.
    pub fn set(&mut self, col: u8, row: u8) -> u8 {
        self.row = if row >= self.rows { 0 } else { row };
        self.col = col;
        ROW_OFFSETS[self.row as usize].wrapping_add(self.col)
    }

    pub fn position(&self) -> (u8, u8) {
        (self.col, self.row)
    }

    /// Advance over one input byte.
    pub fn step(&mut self, byte: u8) -> Vec<Glyph, 2> {
        let mut out = Vec::new();
        if self.col >= self.cols {
            let addr = self.set(0, self.row + 1);
            let _ = out.push(Glyph::Goto(addr));
        }
        match byte {
            b'\n' => {
                let addr = self.set(self.col, self.row + 1);
                let _ = out.push(Glyph::Goto(addr));
            }
            b'\r' => {
                let addr = self.set(0, self.row);
                let _ = out.push(Glyph::Goto(addr));
            }
            _ => {
                let _ = out.push(Glyph::Char(byte));
                self.col += 1;
            }
        }
        out
    }
}

// ── Driver ────────────────────────────────────────────────────

/// 4-bit HD44780 driver over plain output pins.
pub struct Hd44780<RS, EN, D4, D5, D6, D7, D> {
    rs: RS,
    en: EN,
    d4: D4,
    d5: D5,
    d6: D6,
    d7: D7,
    delay: D,
    cursor: TextCursor,
    ready: bool,
}

impl<RS, EN, D4, D5, D6, D7, D> Hd44780<RS, EN, D4, D5, D6, D7, D>
where
    RS: OutputPin<Error = Infallible>,
    EN: OutputPin<Error = Infallible>,
    D4: OutputPin<Error = Infallible>,
    D5: OutputPin<Error = Infallible>,
    D6: OutputPin<Error = Infallible>,
    D7: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(rs: RS, en: EN, d4: D4, d5: D5, d6: D6, d7: D7, delay: D) -> Self {
        Self {
            rs,
            en,
            d4,
            d5,
            d6,
            d7,
            delay,
            cursor: TextCursor::new(16, 2),
            ready: false,
        }
    }

    fn nibble(&mut self, value: u8) {
        let Ok(()) = self.d7.set_state(PinState::from(value & 0x08 != 0));
        let Ok(()) = self.d6.set_state(PinState::from(value & 0x04 != 0));
        let Ok(()) = self.d5.set_state(PinState::from(value & 0x02 != 0));
        let Ok(()) = self.d4.set_state(PinState::from(value & 0x01 != 0));
        let Ok(()) = self.en.set_high();
        self.delay.delay_us(ENABLE_PULSE_US);
        let Ok(()) = self.en.set_low();
        self.delay.delay_us(ENABLE_PULSE_US);
    }

    fn command(&mut self, cmd: u8) {
        let Ok(()) = self.rs.set_low();
        self.nibble(cmd >> 4);
        self.nibble(cmd & 0x0F);
    }

    fn data(&mut self, byte: u8) {
        let Ok(()) = self.rs.set_high();
        self.nibble(byte >> 4);
        self.nibble(byte & 0x0F);
    }

    fn emit(&mut self, glyph: Glyph) {
        match glyph {
            Glyph::Goto(addr) => self.command(CMD_SET_DDRAM_ADDR | addr),
            Glyph::Char(c) => self.data(c),
        }
    }
}

impl<RS, EN, D4, D5, D6, D7, D> DisplayPort for Hd44780<RS, EN, D4, D5, D6, D7, D>
where
    RS: OutputPin<Error = Infallible>,
    EN: OutputPin<Error = Infallible>,
    D4: OutputPin<Error = Infallible>,
    D5: OutputPin<Error = Infallible>,
    D6: OutputPin<Error = Infallible>,
    D7: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    fn init(&mut self, cols: u8, rows: u8) {
        self.delay.delay_ms(45);
        self.cursor = TextCursor::new(cols, rows);

        let mut function = 0;
        if rows > 1 {
            function |= FUNCTION_2LINE;
        }

        let Ok(()) = self.rs.set_low();
        for _ in 0..3 {
            self.nibble(0x03);
            self.delay.delay_ms(5);
        }
        self.nibble(0x02);
        self.delay.delay_ms(1);

        self.command(CMD_FUNCTION_SET | function);
        self.command(CMD_DISPLAY_CONTROL | DISPLAY_ON);
        self.clear();
        self.command(CMD_ENTRY_MODE_SET | ENTRY_LEFT);
        self.delay.delay_ms(5);

        self.ready = true;
        info!("hd44780: {}x{} display ready", cols, rows);
    }

    fn clear(&mut self) {
        self.command(CMD_CLEAR_DISPLAY);
        self.delay.delay_ms(3);
        self.cursor.set(0, 0);
    }

    fn write(&mut self, col: u8, row: u8, text: &str) {
        let addr = self.cursor.set(col, row);
        self.emit(Glyph::Goto(addr));
        for byte in text.bytes() {
            for glyph in self.cursor.step(byte) {
                self.emit(glyph);
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
