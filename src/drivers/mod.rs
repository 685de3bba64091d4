//! Peripheral drivers, hardware initialisation, and task helpers.

pub mod ad7715;
pub mod bitbang;
pub mod encoder;
pub mod hd44780;
pub mod hw_init;
pub mod task_pin;
