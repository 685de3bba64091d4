//! Shadow frame buffer between state handlers and the display port.
//!
//! Handlers compose whole lines each pass; [`Screen::flush`] pads them to
//! the display width and only rewrites rows whose text changed since the
//! last flush.

use core::fmt::{self, Write};

use crate::app::ports::DisplayPort;
use crate::drivers::hd44780::MAX_ROWS;

/// Widest supported display line.
pub const LINE_CAP: usize = 40;

pub type Line = heapless::String<LINE_CAP>;

/// Formatter target that silently drops output past `limit` bytes.
struct Clipped<'a> {
    line: &'a mut Line,
    limit: usize,
}

impl Write for Clipped<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.line.len() + ch.len_utf8() > self.limit {
                break;
            }
            // Bounded by limit <= LINE_CAP above.
            let _ = self.line.push(ch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Screen {
    cols: u8,
    rows: u8,
    lines: [Line; MAX_ROWS as usize],
    shown: [Option<Line>; MAX_ROWS as usize],
    clear_pending: bool,
}

impl Screen {
    pub fn new(cols: u8, rows: u8) -> Self {
        Self {
            cols: cols.min(LINE_CAP as u8),
            rows: rows.clamp(1, MAX_ROWS),
            lines: Default::default(),
            shown: Default::default(),
            clear_pending: false,
        }
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Replace row `row` with formatted text, clipped and space-padded to
    /// the display width.  Rows past the display height are ignored.
    pub fn set_line(&mut self, row: u8, args: fmt::Arguments<'_>) {
        let Some(line) = self.lines.get_mut(usize::from(row)) else {
            return;
        };
        if row >= self.rows {
            return;
        }
        line.clear();
        let limit = usize::from(self.cols);
        let mut out = Clipped { line, limit };
        let _ = out.write_fmt(args);
        while out.line.len() < limit {
            let _ = out.line.push(' ');
        }
    }

    /// Current composed text of `row` (padded).
    pub fn line(&self, row: u8) -> &str {
        self.lines.get(usize::from(row)).map_or("", |l| l.as_str())
    }

    /// Blank the physical display before the next flush.
    pub fn request_clear(&mut self) {
        self.clear_pending = true;
    }

    /// Push changed rows to `display`.  Returns how many rows were written.
    pub fn flush(&mut self, display: &mut impl DisplayPort) -> usize {
        if self.clear_pending {
            display.clear();
            self.shown = Default::default();
            self.clear_pending = false;
        }
        let mut written = 0;
        for row in 0..self.rows {
            let idx = usize::from(row);
            if self.shown[idx].as_ref() == Some(&self.lines[idx]) {
                continue;
            }
            display.write(0, row, &self.lines[idx]);
            self.shown[idx] = Some(self.lines[idx].clone());
            written += 1;
        }
        written
    }
}
