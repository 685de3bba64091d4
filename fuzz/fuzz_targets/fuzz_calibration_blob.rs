//! Fuzz target: stored calibration and config blobs
//!
//! Writes arbitrary bytes into the NVS slots and loads them back,
//! verifying:
//! - No panics on corrupt or truncated blobs
//! - A set that loads and validates always reads within 0.00..=14.00
//!
//! cargo fuzz run fuzz_calibration_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use phmeter::adapters::nvs::{CAL_KEYS, CAL_NAMESPACE, NvsAdapter};
use phmeter::app::ports::{CalibrationPort, ConfigPort, StoragePort};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut nvs = NvsAdapter::default();

    // First byte picks which slots get a blob, the rest is split between them.
    let mask = data[0];
    let body = &data[1..];
    let chunk = body.len() / 4 + 1;
    for (i, key) in CAL_KEYS.iter().enumerate() {
        if mask & (1 << i) == 0 {
            continue;
        }
        let start = (i * chunk).min(body.len());
        let end = (start + chunk).min(body.len());
        let _ = nvs.write(CAL_NAMESPACE, key, &body[start..end]);
    }

    if let Ok(Some(set)) = nvs.load_set() {
        if set.validate().is_ok() {
            for raw in [0u16, 1, 0x7FFF, 0x8000, u16::MAX] {
                assert!(set.convert(raw) <= 1400, "reading out of range");
            }
        }
    }

    // Config blob: load must either decode or report, never panic.
    let _ = nvs.write("phmeter", "metercfg", body);
    let _ = nvs.load();
});
