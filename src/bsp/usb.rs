use heapless::Deque;
use usb_device::UsbError;
use usb_device::bus::UsbBusAllocator;
use usb_device::device::{UsbDevice, UsbDeviceState, UsbVidPid, UsbDeviceBuilder};
use usbd_dfu_rt::DfuRuntimeClass;

use crate::hal::usb;
use super::reboot::DfuBootloader;
use super::sides::BoardSide;

type Bus = usb::UsbBusType;

/// USB resources and class implementations
pub struct Usb {
    pub dev: UsbDevice<'static, Bus>,
    /// Virtual serial port carrying TxBolt packets
    pub serial: usbd_serial::SerialPort<'static, Bus>,
    pub keyboard: keyberon::Class<'static, Bus, ()>,
    pub dfu: DfuRuntimeClass<DfuBootloader>,
}

impl Usb {
    pub fn new(bus: &'static UsbBusAllocator<Bus>, side: BoardSide) -> Self {
        // Classes
        let serial = usbd_serial::SerialPort::new(bus);
        let dfu = DfuRuntimeClass::new(bus, DfuBootloader);
        let keyboard = keyberon::new_class(bus, ());

        // VID:PID recognised as Van Ooijen Technische Informatica:Keyboard
        let generic_keyboard = UsbVidPid(0x16c0, 0x27db);
        let dev = UsbDeviceBuilder::new(bus, generic_keyboard)
            .manufacturer("morny")
            .product(match side {
                BoardSide::Left => "morny keyboard (L)",
                BoardSide::Right => "morny keyboard (R)"
            })
            .serial_number(env!("CARGO_PKG_VERSION"))
            .composite_with_iads()
            .build();

        Self { dev, serial, keyboard, dfu }
    }

    /// Periodic USB poll
    pub fn poll(&mut self) -> bool {
        self.dev.poll(&mut [&mut self.keyboard, &mut self.serial, &mut self.dfu])
    }

    pub fn configured(&self) -> bool {
        self.dev.state() == UsbDeviceState::Configured
    }

    /// Write as many queued bytes to the serial port as it accepts
    ///
    /// Bytes that do not fit stay in the queue for the next call.
    pub fn write_serial<const N: usize>(&mut self, queue: &mut Deque<u8, N>) {
        while !queue.is_empty() {
            let (chunk, _) = queue.as_slices();
            match self.serial.write(chunk) {
                Ok(0) | Err(UsbError::WouldBlock) => break,
                Ok(n) => {
                    for _ in 0..n {
                        queue.pop_front();
                    }
                },
                Err(_) => {
                    defmt::warn!("Serial write failed, dropping {=usize} bytes", queue.len());
                    queue.clear();
                },
            }
        }
    }
}
