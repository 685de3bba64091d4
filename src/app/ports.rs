//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sample reader, display, storage, event sinks) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware directly.
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **CalibrationPort** writes are per slot; a failed write leaves the
//!   other slots untouched.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::config::MeterConfig;
use crate::sensors::ph::{CalibrationPoint, CalibrationSet};
use crate::sensors::stability::SampleBatch;

// ───────────────────────────────────────────────────────────────
// Sample port (driven adapter: acquisition task → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for ADC codes.
pub trait SampleSource {
    /// Newest published code.  Repeated calls without a new conversion
    /// return the same value.
    fn latest(&mut self) -> u16;

    /// Take `len` consecutive reads and summarise them.
    ///
    /// The default reads back-to-back; adapters backed by a live
    /// acquisition task should yield between reads so new conversions
    /// land in the batch.
    fn read_batch(&mut self, len: u16) -> Option<SampleBatch> {
        SampleBatch::collect((0..len).map(|_| self.latest()))
    }
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → character LCD)
// ───────────────────────────────────────────────────────────────

/// Character display with 0-based `(col, row)` addressing.
///
/// Text past the last column wraps to the next row, `\n` advances the
/// row and `\r` returns to column 0.
pub trait DisplayPort {
    fn init(&mut self, cols: u8, rows: u8);

    fn clear(&mut self);

    fn write(&mut self, col: u8, row: u8, text: &str);

    /// `true` once [`init`](Self::init) has completed.
    fn is_ready(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists meter configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`MeterConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<MeterConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Calibration port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Durable storage for the calibration set, one record per slot.
pub trait CalibrationPort {
    /// Persist a single slot.
    fn save_point(&mut self, index: usize, point: CalibrationPoint) -> Result<(), StorageError>;

    /// Stored set, or `Ok(None)` when nothing has been saved yet.
    fn load_set(&self) -> Result<Option<CalibrationSet>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic, with no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] and [`CalibrationPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// A stored blob did not decode.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored value corrupted"),
        }
    }
}
