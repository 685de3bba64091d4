//! AD7715 16-bit sigma-delta ADC: register framing.
//!
//! Every access starts with a write to the communications register that
//! names the target register and the direction of the following transfer.
//!
//! ```text
//! Communications   7     6    5   4    3     2     1  0
//!                 DRDY   0   RS1 RS0  R/W  STBY   G1 G0
//!
//! Setup            7   6    5    4   3    2     1      0
//!                 MD1 MD0  CLK  FS1 FS0  B/U   BUF   FSYNC
//! ```
//!
//! `DRDY` reads 0 while an unread conversion result is waiting.  The data
//! register returns the result high byte first.

use super::bitbang::ByteTransport;

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Register selected by RS1..RS0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Communications = 0,
    Setup = 1,
    Test = 2,
    Data = 3,
}

impl Register {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Communications,
            1 => Self::Setup,
            2 => Self::Test,
            _ => Self::Data,
        }
    }
}

/// PGA gain, G1..G0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X32 = 2,
    X128 = 3,
}

impl Gain {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::X1,
            1 => Self::X2,
            2 => Self::X32,
            _ => Self::X128,
        }
    }
}

/// Operating mode, MD1..MD0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Normal = 0,
    SelfCalibration = 1,
    ZeroScaleCalibration = 2,
    FullScaleCalibration = 3,
}

impl Mode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Normal,
            1 => Self::SelfCalibration,
            2 => Self::ZeroScaleCalibration,
            _ => Self::FullScaleCalibration,
        }
    }
}

/// Output update rate.  The FS code means a different rate depending on the
/// CLK bit, so both are folded into one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRate {
    // 1 MHz master clock (CLK = 0)
    Hz20,
    Hz25,
    Hz100,
    Hz200,
    // 2.4576 MHz master clock (CLK = 1)
    Hz50,
    Hz60,
    Hz250,
    Hz500,
}

impl OutputRate {
    /// `(clk, fs)` bit pair.
    const fn bits(self) -> (u8, u8) {
        match self {
            Self::Hz20 => (0, 0),
            Self::Hz25 => (0, 1),
            Self::Hz100 => (0, 2),
            Self::Hz200 => (0, 3),
            Self::Hz50 => (1, 0),
            Self::Hz60 => (1, 1),
            Self::Hz250 => (1, 2),
            Self::Hz500 => (1, 3),
        }
    }

    fn from_bits(clk: u8, fs: u8) -> Self {
        match (clk & 1, fs & 0b11) {
            (0, 0) => Self::Hz20,
            (0, 1) => Self::Hz25,
            (0, 2) => Self::Hz100,
            (0, _) => Self::Hz200,
            (_, 0) => Self::Hz50,
            (_, 1) => Self::Hz60,
            (_, 2) => Self::Hz250,
            (_, _) => Self::Hz500,
        }
    }
}

// ---------------------------------------------------------------------------
// Communications register
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommReg {
    pub register: Register,
    pub read: bool,
    pub standby: bool,
    pub gain: Gain,
    /// Decoded from DRDY (active low).  Always written as 0.
    pub data_ready: bool,
}

impl CommReg {
    /// Powered-up, gain 1 access to `register`.
    pub const fn read(register: Register) -> Self {
        Self {
            register,
            read: true,
            standby: false,
            gain: Gain::X1,
            data_ready: false,
        }
    }

    pub const fn write(register: Register) -> Self {
        Self {
            read: false,
            ..Self::read(register)
        }
    }

    pub const fn bits(self) -> u8 {
        ((self.register as u8) << 4)
            | ((self.read as u8) << 3)
            | ((self.standby as u8) << 2)
            | self.gain as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            register: Register::from_bits(bits >> 4),
            read: bits & 0b0000_1000 != 0,
            standby: bits & 0b0000_0100 != 0,
            gain: Gain::from_bits(bits),
            data_ready: bits & 0b1000_0000 == 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Setup register
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupReg {
    pub mode: Mode,
    pub rate: OutputRate,
    pub unipolar: bool,
    pub buffered: bool,
    pub fsync: bool,
}

impl SetupReg {
    /// The meter's one fixed front-end configuration: bipolar, buffer
    /// bypassed, 2.4576 MHz master clock, 50 Hz output rate.
    pub const fn meter(mode: Mode) -> Self {
        Self {
            mode,
            rate: OutputRate::Hz50,
            unipolar: false,
            buffered: false,
            fsync: false,
        }
    }

    pub const fn bits(self) -> u8 {
        let (clk, fs) = self.rate.bits();
        ((self.mode as u8) << 6)
            | (clk << 5)
            | (fs << 3)
            | ((self.unipolar as u8) << 2)
            | ((self.buffered as u8) << 1)
            | self.fsync as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            mode: Mode::from_bits(bits >> 6),
            rate: OutputRate::from_bits(bits >> 5, bits >> 3),
            unipolar: bits & 0b0000_0100 != 0,
            buffered: bits & 0b0000_0010 != 0,
            fsync: bits & 0b0000_0001 != 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Fill byte clocked out while reading.
const READ_FILL: u8 = 0xFF;

/// Register-level AD7715 access over any [`ByteTransport`].
pub struct Ad7715<T> {
    bus: T,
}

impl<T: ByteTransport> Ad7715<T> {
    pub fn new(bus: T) -> Self {
        Self { bus }
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    pub fn release(self) -> T {
        self.bus
    }

    /// Resynchronise the serial interface.
    pub fn reset(&mut self) {
        self.bus.reset();
    }

    /// Write `payload` to the register named by a write-direction `comm`.
    pub fn write_register(&mut self, comm: CommReg, payload: &[u8]) {
        self.bus.select();
        self.bus.transfer_byte(comm.bits());
        for &byte in payload {
            self.bus.transfer_byte(byte);
        }
        self.bus.deselect();
    }

    /// Read `buf.len()` bytes from the register named by a read-direction `comm`.
    pub fn read_register(&mut self, comm: CommReg, buf: &mut [u8]) {
        self.bus.select();
        self.bus.transfer_byte(comm.bits());
        for byte in buf.iter_mut() {
            *byte = self.bus.transfer_byte(READ_FILL);
        }
        self.bus.deselect();
    }

    pub fn write_setup(&mut self, setup: SetupReg) {
        self.write_register(CommReg::write(Register::Setup), &[setup.bits()]);
    }

    pub fn read_setup(&mut self) -> SetupReg {
        let mut buf = [0u8; 1];
        self.read_register(CommReg::read(Register::Setup), &mut buf);
        SetupReg::from_bits(buf[0])
    }

    /// Read back the communications register.
    pub fn read_status(&mut self) -> CommReg {
        let mut buf = [0u8; 1];
        self.read_register(CommReg::read(Register::Communications), &mut buf);
        CommReg::from_bits(buf[0])
    }

    /// `true` when an unread conversion result is waiting.
    pub fn data_ready(&mut self) -> bool {
        self.read_status().data_ready
    }

    /// Read the 16-bit conversion result (high byte first on the wire).
    pub fn read_data(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        self.read_register(CommReg::read(Register::Data), &mut buf);
        u16::from_be_bytes(buf)
    }

    /// Coarse wait on the bus's delay source.
    pub fn delay_ms(&mut self, ms: u32) {
        self.bus.delay_ms(ms);
    }
}
