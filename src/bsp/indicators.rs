use core::convert::Infallible;
use embedded_hal::digital::v2::{OutputPin, PinState};

use crate::keyboard::indicators::{Indicator, Indicators, N_INDICATORS};
use crate::utils::InfallibleResult;

/// Indicator LEDs connected directly to GPIO pins (active high)
pub struct IndicatorLeds<P> {
    pins: [P; N_INDICATORS],
    state: Option<Indicators>,
}

impl<P> IndicatorLeds<P>
where
    P: OutputPin<Error = Infallible>,
{
    /// Pins in the order of [`Indicator::ALL`]
    pub fn new(pins: [P; N_INDICATORS]) -> Self {
        let mut leds = Self { pins, state: None };
        leds.set(Indicators::NONE);
        leds
    }

    /// Update pins, only touching them when the state changes
    pub fn set(&mut self, indicators: Indicators) {
        if self.state == Some(indicators) {
            return;
        }
        for (led, pin) in Indicator::ALL.iter().zip(self.pins.iter_mut()) {
            pin.set_state(PinState::from(indicators.get(*led))).infallible();
        }
        self.state = Some(indicators);
    }

    pub fn state(&self) -> Option<Indicators> {
        self.state
    }
}
