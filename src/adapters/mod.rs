//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `hardware`     | SampleSource       | AD7715 task `SampleCell` |
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `nvs`          | ConfigPort         | NVS / in-memory store    |
//! |                | StoragePort        |                          |
//! |                | CalibrationPort    |                          |
//!
//! The display port is implemented directly by
//! [`Hd44780`](crate::drivers::hd44780::Hd44780).

pub mod hardware;
pub mod log_sink;
pub mod nvs;
