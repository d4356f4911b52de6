//! Board support package
//!
//! Code that builds on top of MCU-specific HAL to implement support for the
//! board and the peripherals located on it.

pub mod indicators;
pub mod reboot;
pub mod sides;
pub mod usb;

use crate::hal::gpio;

/// Number of columns of a single half
pub const NCOLS: usize = 7;
pub const NROWS: usize = 6;

pub type ColPin = gpio::Pin<gpio::Input<gpio::PullUp>>;
pub type RowPin = gpio::Pin<gpio::Output<gpio::PushPull>>;
pub type LedPin = gpio::Pin<gpio::Output<gpio::PushPull>>;
