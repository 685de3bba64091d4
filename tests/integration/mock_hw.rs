//! Mock adapters for integration tests.
//!
//! Each mock records what the service did to it so tests can assert on
//! the full history without touching real GPIO or flash.

use std::collections::VecDeque;

use phmeter::app::events::AppEvent;
use phmeter::app::ports::{CalibrationPort, DisplayPort, EventSink, SampleSource, StorageError};
use phmeter::drivers::bitbang::ByteTransport;
use phmeter::sensors::ph::{CalibrationPoint, CalibrationSet, SLOTS};

// ── MockDisplay ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Init { cols: u8, rows: u8 },
    Clear,
    Write { col: u8, row: u8, text: String },
}

pub struct MockDisplay {
    pub calls: Vec<DisplayCall>,
    rows: Vec<String>,
    ready: bool,
}

#[allow(dead_code)]
impl MockDisplay {
    /// A display that has already been initialised.
    pub fn ready(cols: u8, rows: u8) -> Self {
        let mut d = Self::new();
        d.init(cols, rows);
        d.calls.clear();
        d
    }

    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            rows: Vec::new(),
            ready: false,
        }
    }

    /// What row `row` currently shows, trailing padding removed.
    pub fn row(&self, row: u8) -> &str {
        self.rows
            .get(row as usize)
            .map(|s| s.trim_end())
            .unwrap_or("")
    }

    pub fn clears(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DisplayCall::Clear))
            .count()
    }
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayPort for MockDisplay {
    fn init(&mut self, cols: u8, rows: u8) {
        self.calls.push(DisplayCall::Init { cols, rows });
        self.rows = vec![String::new(); rows as usize];
        self.ready = true;
    }

    fn clear(&mut self) {
        self.calls.push(DisplayCall::Clear);
        for r in &mut self.rows {
            r.clear();
        }
    }

    fn write(&mut self, col: u8, row: u8, text: &str) {
        self.calls.push(DisplayCall::Write {
            col,
            row,
            text: text.to_string(),
        });
        if let Some(line) = self.rows.get_mut(row as usize) {
            line.truncate(col as usize);
            while line.len() < col as usize {
                line.push(' ');
            }
            line.push_str(text);
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

// ── MockSamples ───────────────────────────────────────────────

/// Fixed ADC code, changeable between passes.
pub struct MockSamples {
    pub code: u16,
    pub batches: usize,
}

impl MockSamples {
    pub fn new(code: u16) -> Self {
        Self { code, batches: 0 }
    }
}

impl SampleSource for MockSamples {
    fn latest(&mut self) -> u16 {
        self.code
    }

    fn read_batch(&mut self, len: u16) -> Option<phmeter::sensors::stability::SampleBatch> {
        self.batches += 1;
        phmeter::sensors::stability::SampleBatch::collect((0..len).map(|_| self.code))
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// In-memory calibration slots with an injectable write failure.
pub struct MockStore {
    pub slots: [Option<CalibrationPoint>; SLOTS],
    pub writes: Vec<(usize, CalibrationPoint)>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            slots: [None; SLOTS],
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationPort for MockStore {
    fn save_point(&mut self, index: usize, point: CalibrationPoint) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let slot = self.slots.get_mut(index).ok_or(StorageError::IoError)?;
        *slot = Some(point);
        self.writes.push((index, point));
        Ok(())
    }

    fn load_set(&self) -> Result<Option<CalibrationSet>, StorageError> {
        if self.slots.iter().all(Option::is_none) {
            return Ok(None);
        }
        let defaults = *CalibrationSet::factory_default().points();
        let mut points = defaults;
        for (p, stored) in points.iter_mut().zip(self.slots) {
            if let Some(s) = stored {
                *p = s;
            }
        }
        Ok(Some(CalibrationSet::new(points)))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── SimulatedAdc ──────────────────────────────────────────────

/// Byte-level AD7715 stand-in: answers status reads with DRDY low and
/// data reads with `code`, high byte first.
pub struct SimulatedAdc {
    pub code: u16,
    pub ready: bool,
    pub setup_writes: Vec<u8>,
    pub delays: Vec<u32>,
    selected: bool,
    awaiting_comm: bool,
    expect_setup: bool,
    pending: VecDeque<u8>,
}

#[allow(dead_code)]
impl SimulatedAdc {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            ready: true,
            setup_writes: Vec::new(),
            delays: Vec::new(),
            selected: false,
            awaiting_comm: false,
            expect_setup: false,
            pending: VecDeque::new(),
        }
    }
}

impl ByteTransport for SimulatedAdc {
    fn select(&mut self) {
        self.selected = true;
        self.awaiting_comm = true;
        self.pending.clear();
    }

    fn deselect(&mut self) {
        self.selected = false;
        self.expect_setup = false;
    }

    fn transfer_byte(&mut self, out: u8) -> u8 {
        if !self.selected {
            return 0xFF;
        }
        if self.awaiting_comm {
            self.awaiting_comm = false;
            let register = out >> 4;
            let read = out & 0b0000_1000 != 0;
            match (register, read) {
                (0, true) => self.pending.push_back(if self.ready { 0x00 } else { 0x80 }),
                (3, true) => self.pending.extend(self.code.to_be_bytes()),
                (1, false) => self.expect_setup = true,
                _ => {}
            }
            return 0xFF;
        }
        if self.expect_setup {
            self.setup_writes.push(out);
            self.expect_setup = false;
        }
        self.pending.pop_front().unwrap_or(0xFF)
    }

    fn reset(&mut self) {
        self.pending.clear();
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

