//! Calibration persistence against the host NVS backend.

use phmeter::adapters::nvs::{CAL_KEYS, CAL_NAMESPACE, NvsAdapter};
use phmeter::app::ports::{CalibrationPort, StorageError, StoragePort};
use phmeter::sensors::ph::{CalibrationPoint, CalibrationSet};

#[test]
fn empty_store_has_no_calibration() {
    let nvs = NvsAdapter::new().unwrap();
    assert_eq!(nvs.load_set(), Ok(None));
}

#[test]
fn saved_slots_overlay_factory_values() {
    let mut nvs = NvsAdapter::new().unwrap();
    let p2 = CalibrationPoint::new(31_500, 6_860);
    nvs.save_point(1, p2).unwrap();

    let set = nvs.load_set().unwrap().unwrap();
    let factory = CalibrationSet::factory_default();
    assert_eq!(set.point(0), factory.point(0));
    assert_eq!(set.point(1), Some(p2));
    assert_eq!(set.point(2), factory.point(2));
}

#[test]
fn retired_slot_three_reloads_as_two_point() {
    let mut nvs = NvsAdapter::new().unwrap();
    nvs.save_point(0, CalibrationPoint::new(14_000, 4_010)).unwrap();
    nvs.save_point(2, CalibrationPoint::UNUSED).unwrap();

    let set = nvs.load_set().unwrap().unwrap();
    assert!(set.is_two_point());
    assert!(set.validate().is_ok());
}

#[test]
fn slot_past_the_last_is_refused() {
    let mut nvs = NvsAdapter::new().unwrap();
    assert_eq!(
        nvs.save_point(3, CalibrationPoint::new(1, 1)),
        Err(StorageError::NotFound)
    );
}

#[test]
fn garbage_slot_is_reported_corrupted() {
    let mut nvs = NvsAdapter::new().unwrap();
    nvs.write(CAL_NAMESPACE, CAL_KEYS[0], &[]).unwrap();
    assert_eq!(nvs.load_set(), Err(StorageError::Corrupted));
}
