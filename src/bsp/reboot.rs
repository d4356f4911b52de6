//! Reboot into the STM32 system memory bootloader
//!
//! The request survives the reset in a RAM word excluded from initialization,
//! and is checked before `main` when the RAM is still untouched.

use core::mem::MaybeUninit;
use cortex_m::{peripheral::SCB, asm::bootload};
use usbd_dfu_rt::DfuRuntimeOps;

use crate::hal::{pac, usb};

const BOOTLOADER_REQUEST: u32 = 0xb007_10ad;
/// System memory of STM32F072
const SYSTEM_MEMORY_BASE: u32 = 0x1fff_c800;

#[link_section = ".uninit.BOOT_REQUEST"]
static mut BOOT_REQUEST: MaybeUninit<u32> = MaybeUninit::uninit();

/// Reset the MCU, optionally jumping to the bootloader afterwards
///
/// When `usb_bus` is given the host is forced to re-enumerate the device
/// before the reset, otherwise it may fail to notice the bootloader.
///
/// # Safety
///
/// Never returns, must not be called while peripherals are in the middle of
/// an operation that needs to complete.
pub unsafe fn reboot(bootloader: bool, usb_bus: Option<&usb::UsbBusType>) -> ! {
    if bootloader {
        BOOT_REQUEST.as_mut_ptr().write(BOOTLOADER_REQUEST);
    }
    if let Some(bus) = usb_bus {
        bus.force_reenumeration(|| SCB::sys_reset());
    }
    SCB::sys_reset()
}

#[cortex_m_rt::pre_init]
unsafe fn jump_bootloader() {
    // Only trust the request word after a software reset
    let software_reset = (*pac::RCC::ptr()).csr.read().sftrstf().bit_is_set();

    if software_reset && BOOT_REQUEST.assume_init() == BOOTLOADER_REQUEST {
        BOOT_REQUEST.as_mut_ptr().write(0);
        bootload(SYSTEM_MEMORY_BASE as *const u32);
    }
}

/// DFU runtime support: detach request reboots into the DFU bootloader
pub struct DfuBootloader;

impl DfuRuntimeOps for DfuBootloader {
    fn detach(&mut self) {
        unsafe { reboot(true, None) }
    }

    fn allow(&mut self, timeout: u16) -> Option<u16> {
        Some(timeout)
    }

    const WILL_DETACH: bool = false;
}
