#![no_std]

// Use std when running tests, make sure to use a host target, e.g.
//   cargo test --target x86_64-unknown-linux-gnu
#[cfg(test)]
#[macro_use]
extern crate std;

use stm32f0xx_hal as hal;

pub mod bsp;
pub mod config;
pub mod keyboard;
pub mod layers;
pub mod txbolt;
pub mod utils;

#[cfg(test)]
mod test_logger {
    //! defmt needs a global logger when running on the host, logs are discarded

    #[defmt::global_logger]
    struct Logger;

    unsafe impl defmt::Logger for Logger {
        fn acquire() {}
        unsafe fn flush() {}
        unsafe fn release() {}
        unsafe fn write(_bytes: &[u8]) {}
    }

    defmt::timestamp!("{=u32}", 0);
}
