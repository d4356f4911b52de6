#![no_main]
#![no_std]

use panic_probe as _;
use defmt_rtt as _;
use stm32f0xx_hal as hal;
use morny as lib;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[rtic::app(device = crate::hal::pac, dispatchers = [CEC_CAN])]
mod app {
    use cortex_m::interrupt::free as ifree;
    use heapless::Vec;
    use super::hal;
    use hal::prelude::*;
    use usb_device::class_prelude::UsbBusAllocator;

    use super::{lib, built_info};
    use lib::bsp::{self, indicators::IndicatorLeds, reboot, sides::BoardSide, usb::Usb};
    use lib::keyboard::{self, indicators::Indicators, link::{LinkRx, LinkTx}, msg::{KeyEvent, Message}};
    use lib::config::CONFIG;

    const DEBOUNCE_COUNT: u16 = 5;
    /// Bytes read from UART in a single interrupt
    const RX_CHUNK: usize = 16;

    type SerialTx = hal::serial::Tx<hal::pac::USART1>;
    type SerialRx = hal::serial::Rx<hal::pac::USART1>;

    #[shared]
    struct Shared {
        usb: Usb,
        link_rx: LinkRx,
    }

    #[local]
    struct Local {
        timer: hal::timers::Timer<hal::pac::TIM15>,
        keys: keyboard::Keys,
        keyboard: keyboard::Keyboard,
        link_tx: LinkTx<SerialTx>,
        serial_rx: SerialRx,
        leds: IndicatorLeds<bsp::LedPin>,
    }

    #[monotonic(binds = SysTick, default = true)]
    type Mono = systick_monotonic::Systick<MONO_HZ>;
    pub const MONO_HZ: u32 = 1000;

    #[init(local = [
        usb_bus: Option<UsbBusAllocator<hal::usb::UsbBusType>> = None,
    ])]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut core = cx.core;
        let mut dev = cx.device;

        // Automatically enter sleep mode when leaving an ISR
        if cfg!(feature = "idle-sleep") {
            core.SCB.set_sleeponexit();
        }

        // Clock configuration (may use external crystal, but it is not needed for STM32F072)
        let sysclk: hal::time::Hertz = 48.mhz().into();
        let pclk: hal::time::Hertz = 24.mhz().into();
        let crystal_clk: hal::time::Hertz = 12.mhz().into();

        let clk_config = dev.RCC
            .configure()
            .enable_crs(dev.CRS) // synchronization to USB SOF
            .sysclk(sysclk)
            .pclk(pclk);
        let clk_config = if cfg!(feature = "crystal") {
            clk_config.hse(crystal_clk, hal::rcc::HSEBypassMode::NotBypassed)
        } else {
            clk_config.hsi48()
        };
        let mut rcc = clk_config.freeze(&mut dev.FLASH);

        // Pinout
        let gpioa = dev.GPIOA.split(&mut rcc);
        let gpiob = dev.GPIOB.split(&mut rcc);
        let gpioc = dev.GPIOC.split(&mut rcc);

        // Determine board side
        let board_side = ifree(|cs| gpiob.pb13.into_floating_input(cs));
        let board_side = BoardSide::get(board_side);

        // Keyboard matrix
        let cols = ifree(|cs| [
            gpiob.pb1.into_pull_up_input(cs).downgrade(),
            gpiob.pb0.into_pull_up_input(cs).downgrade(),
            gpioa.pa7.into_pull_up_input(cs).downgrade(),
            gpioa.pa6.into_pull_up_input(cs).downgrade(),
            gpioa.pa5.into_pull_up_input(cs).downgrade(),
            gpioa.pa4.into_pull_up_input(cs).downgrade(),
            gpioa.pa3.into_pull_up_input(cs).downgrade(),
        ]);
        let rows = ifree(|cs| [
            gpiob.pb6.into_push_pull_output(cs).downgrade(),
            gpiob.pb7.into_push_pull_output(cs).downgrade(),
            gpiob.pb8.into_push_pull_output(cs).downgrade(),
            gpioc.pc13.into_push_pull_output(cs).downgrade(),
            gpioc.pc14.into_push_pull_output(cs).downgrade(),
            gpioc.pc15.into_push_pull_output(cs).downgrade(),
        ]);

        // Indicator LEDs in the order: board, LED1, LED2, LED3
        let leds = IndicatorLeds::new(ifree(|cs| [
            gpioa.pa15.into_push_pull_output(cs).downgrade(),
            gpiob.pb3.into_push_pull_output(cs).downgrade(),
            gpiob.pb4.into_push_pull_output(cs).downgrade(),
            gpiob.pb5.into_push_pull_output(cs).downgrade(),
        ]));

        // UART link between halves
        let board_tx = ifree(|cs| gpioa.pa9.into_alternate_af1(cs));
        let board_rx = ifree(|cs| gpioa.pa10.into_alternate_af1(cs));
        let mut serial = hal::serial::Serial::usart1(dev.USART1, (board_tx, board_rx), 460_800.bps(), &mut rcc);
        serial.listen(hal::serial::Event::Rxne);
        let (serial_tx, serial_rx) = serial.split();

        // configure periodic timer
        let mut timer = hal::timers::Timer::tim15(dev.TIM15, 1.khz(), &mut rcc);
        timer.listen(hal::timers::Event::TimeOut);

        // USB
        let usb = hal::usb::Peripheral {
            usb: dev.USB,
            pin_dp: gpioa.pa12,
            pin_dm: gpioa.pa11
        };
        let usb_bus = cx.local.usb_bus.insert(hal::usb::UsbBus::new(usb));
        let usb = Usb::new(usb_bus, board_side);

        // Keyboard
        let keys = keyboard::Keys::new(board_side, cols, rows, DEBOUNCE_COUNT);
        let keyboard = keyboard::Keyboard::new(&CONFIG);

        defmt::info!("Liftoff! side={} version={=str} git={=str}",
            board_side,
            built_info::PKG_VERSION,
            built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
        );
        defmt::debug!("Size of: keyboard={=usize} layers={=usize}",
            core::mem::size_of_val(&keyboard),
            core::mem::size_of_val(CONFIG.layers),
        );

        let shared = Shared {
            usb,
            link_rx: LinkRx::new(),
        };

        let local = Local {
            timer,
            keys,
            keyboard,
            link_tx: LinkTx::new(serial_tx),
            serial_rx,
            leds,
        };

        let mono = systick_monotonic::Systick::new(core.SYST, sysclk.0);

        (shared, local, init::Monotonics(mono))
    }

    #[task(binds = TIM15, priority = 4, local = [timer])]
    fn tick(cx: tick::Context) {
        // Clears interrupt flag
        if cx.local.timer.wait().is_ok() && keyboard_tick::spawn().is_err() {
            defmt::error!("Spawn failed: keyboard_tick");
        }
    }

    /// USB poll
    ///
    /// On an USB interrupt we need to handle all classes and receive/send proper data.
    /// This is always a response to USB host polling because host initializes all transactions.
    #[task(binds = USB, priority = 3, shared = [usb])]
    fn usb_poll(mut cx: usb_poll::Context) {
        cx.shared.usb.lock(|usb| {
            usb.poll();
        });
    }

    /// Receive bytes from the other half
    #[task(binds = USART1, priority = 4, shared = [link_rx], local = [serial_rx])]
    fn uart_rx(mut cx: uart_rx::Context) {
        let mut bytes: Vec<u8, RX_CHUNK> = Vec::new();
        while !bytes.is_full() {
            match cx.local.serial_rx.read() {
                Ok(byte) => {
                    bytes.push(byte).ok();
                },
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    defmt::warn!("UART RX error");
                    break;
                },
            }
        }
        cx.shared.link_rx.lock(|rx| rx.feed(&bytes));
    }

    #[task(priority = 2, capacity = 1, shared = [usb, link_rx], local = [
        keys,
        keyboard,
        link_tx,
        leds,
        sent_indicators: Option<Indicators> = None,
    ])]
    fn keyboard_tick(cx: keyboard_tick::Context) {
        let keyboard_tick::SharedResources { mut usb, mut link_rx } = cx.shared;
        let keyboard_tick::LocalResources { keys, keyboard, link_tx, leds, sent_indicators } = cx.local;

        // The half connected to USB handles the keyboard logic
        let master = usb.lock(|usb| usb.configured());

        while let Some(msg) = link_rx.lock(|rx| rx.get()) {
            match msg {
                Message::Key(event) => if master {
                    defmt::debug!("Got {}", event);
                    keyboard.event(event.into());
                },
                Message::Indicators(indicators) => if !master {
                    leds.set(indicators);
                },
            }
        }

        for event in keys.scan() {
            if master {
                keyboard.event(event);
            } else {
                let event: KeyEvent = event.into();
                defmt::debug!("Send {}", event);
                link_tx.send(&Message::Key(event));
            }
        }

        let tick = keyboard.tick();

        if tick.reboot {
            defmt::info!("Rebooting to bootloader");
            usb.lock(|usb| unsafe { reboot::reboot(true, Some(usb.dev.bus())) });
        }

        if !master {
            *sent_indicators = None;
            return;
        }

        leds.set(tick.indicators);
        if *sent_indicators != Some(tick.indicators) {
            link_tx.send(&Message::Indicators(tick.indicators));
            *sent_indicators = Some(tick.indicators);
        }

        usb.lock(|usb| usb.write_serial(keyboard.serial()));

        // Set current USB report to the new one, finish if there is no change
        if !usb.lock(|usb| usb.keyboard.device_mut().set_keyboard_report(tick.report.clone())) {
            return;
        }
        // Spin until we are able to send the report.
        // Lock separately in each iteration, usb_poll has higher priority and must be able to run.
        while let Ok(0) = usb.lock(|usb| usb.keyboard.write(tick.report.as_bytes())) {}
    }

    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            if cfg!(feature = "idle-sleep") {
                rtic::export::wfi();
            } else {
                rtic::export::nop();
            }
        }
    }
}
