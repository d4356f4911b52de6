use bitfield::{Bit, BitMut};
use postcard::experimental::max_size::MaxSize;
use serde::{Serialize, Deserialize};
use static_assertions as sa;

/// Number of indicator LEDs
pub const N_INDICATORS: usize = 4;

sa::const_assert!(N_INDICATORS <= 8);

/// Indicator LED
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum Indicator {
    Board = 0,
    Led1 = 1,
    Led2 = 2,
    Led3 = 3,
}

impl Indicator {
    pub const ALL: [Self; N_INDICATORS] = [Self::Board, Self::Led1, Self::Led2, Self::Led3];
}

/// Bit-set storing indicator LED states
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, MaxSize, defmt::Format)]
#[cfg_attr(test, derive(Debug))]
pub struct Indicators(pub u8);

impl Indicators {
    pub const NONE: Self = Self(0);

    pub const fn single(led: Indicator) -> Self {
        Self(1 << led as u8)
    }

    pub fn get(&self, led: Indicator) -> bool {
        self.0.bit(led as usize)
    }

    pub fn set(&mut self, led: Indicator, value: bool) {
        self.0.set_bit(led as usize, value);
    }

    /// Indicator state for the given (highest active) layer
    pub fn for_layer(layer: usize, map: &[LayerIndicator]) -> Self {
        map.iter()
            .find(|m| m.layer == layer)
            .map(|m| Self::single(m.led))
            .unwrap_or(Self::NONE)
    }
}

/// Indicator LED lit when a layer is active
pub struct LayerIndicator {
    pub layer: usize,
    pub led: Indicator,
}
