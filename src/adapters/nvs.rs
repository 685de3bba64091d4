//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`], [`StoragePort`] and [`CalibrationPort`] for
//! the pH meter.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Namespace isolation: config lives in `phmeter`, calibration slots in
//!   `phcal` under keys `cal0`..`cal2`.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!
//! On host builds the same semantics are provided by an in-memory map.

use crate::app::ports::{
    CalibrationPort, ConfigError, ConfigPort, StorageError, StoragePort,
};
use crate::config::MeterConfig;
use crate::sensors::ph::{CalibrationPoint, CalibrationSet, SLOTS};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "phmeter";
const CONFIG_KEY: &str = "metercfg";

pub const CAL_NAMESPACE: &str = "phcal";
pub const CAL_KEYS: [&str; SLOTS] = ["cal0", "cal1", "cal2"];

/// Largest blob this adapter will read back.
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (15 chars max).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns_buf.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a whole blob.  `Ok(None)` when the key is absent.
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            Ok(self.store.borrow().get(&composite).cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                // SAFETY: a null out-pointer asks NVS for the blob length only.
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr().cast(), core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_INVALID_SIZE as esp_err_t);
                }

                let mut buf = vec![0u8; size];
                // SAFETY: buf holds exactly `size` writable bytes.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr().cast(),
                        buf.as_mut_ptr().cast(),
                        &mut size,
                    )
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });
            match result {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(None),
                Err(e) => {
                    warn!("NvsAdapter: read {}::{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    /// Write and commit a blob.
    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: data is a valid slice for the duration of the call.
                let ret = unsafe {
                    nvs_set_blob(handle, key_buf.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

fn validate_config(cfg: &MeterConfig) -> Result<(), ConfigError> {
    if !(8..=40).contains(&cfg.display_cols) {
        return Err(ConfigError::ValidationFailed("display_cols must be 8–40"));
    }
    if !(1..=4).contains(&cfg.display_rows) {
        return Err(ConfigError::ValidationFailed("display_rows must be 1–4"));
    }
    if !(1..=1000).contains(&cfg.adc_settle_ms) {
        return Err(ConfigError::ValidationFailed("adc_settle_ms must be 1–1000"));
    }
    if !(1..=1000).contains(&cfg.reference_step) {
        return Err(ConfigError::ValidationFailed(
            "reference_step must be 1–1000",
        ));
    }
    if !(2..=1000).contains(&cfg.stability_batch_len) {
        return Err(ConfigError::ValidationFailed(
            "stability_batch_len must be 2–1000",
        ));
    }
    if cfg.stability_threshold == 0 {
        return Err(ConfigError::ValidationFailed(
            "stability_threshold must be > 0",
        ));
    }
    if cfg.stability_required_batches == 0 {
        return Err(ConfigError::ValidationFailed(
            "stability_required_batches must be > 0",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        match self.get_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(Some(bytes)) => {
                let cfg: MeterConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(MeterConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error {}, using defaults", e);
                Ok(MeterConfig::default())
            }
        }
    }

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.set_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|e| match e {
                StorageError::Full => ConfigError::StorageFull,
                _ => ConfigError::IoError,
            })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .get_blob(namespace, key)?
            .ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.set_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: key_buf is NUL-terminated.
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr().cast()) };
                if ret != ESP_OK as esp_err_t && ret != ESP_ERR_NVS_NOT_FOUND as esp_err_t {
                    return Err(ret);
                }
                // SAFETY: handle is open for writing.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        matches!(self.get_blob(namespace, key), Ok(Some(_)))
    }
}

impl CalibrationPort for NvsAdapter {
    fn save_point(&mut self, index: usize, point: CalibrationPoint) -> Result<(), StorageError> {
        let key = CAL_KEYS.get(index).ok_or(StorageError::NotFound)?;
        let bytes = postcard::to_allocvec(&point).map_err(|_| StorageError::IoError)?;
        self.set_blob(CAL_NAMESPACE, key, &bytes)?;
        info!(
            "NvsAdapter: {} = raw {} / ref {}",
            key, point.raw_code, point.reference_value
        );
        Ok(())
    }

    /// Slots missing from storage keep their factory value.
    fn load_set(&self) -> Result<Option<CalibrationSet>, StorageError> {
        let mut points = *CalibrationSet::factory_default().points();
        let mut found = 0;
        for (slot, key) in points.iter_mut().zip(CAL_KEYS) {
            if let Some(bytes) = self.get_blob(CAL_NAMESPACE, key)? {
                *slot = postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)?;
                found += 1;
            }
        }
        if found == 0 {
            return Ok(None);
        }
        info!("NvsAdapter: loaded {} calibration slot(s)", found);
        Ok(Some(CalibrationSet::new(points)))
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        // Falls back to an unbacked store if NVS init fails.
        Self::new().unwrap_or_else(|_| Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}
