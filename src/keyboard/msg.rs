use keyberon::layout::Event;
use postcard::experimental::max_size::MaxSize;
use serde::{Serialize, Deserialize};

use super::indicators::Indicators;

/// Messages used in communication between keyboard halves
#[derive(Serialize, Deserialize, MaxSize, PartialEq, defmt::Format)]
#[cfg_attr(test, derive(Debug))]
pub enum Message {
    /// Raw key event transmitted to the half that is connected to USB from the other one
    Key(KeyEvent),
    /// Indicator LED state sent from the half connected to USB
    Indicators(Indicators),
}

/// Key event in global matrix coordinates
#[derive(Clone, Copy, Serialize, Deserialize, MaxSize, PartialEq, Eq, defmt::Format)]
#[cfg_attr(test, derive(Debug))]
pub struct KeyEvent {
    pub pressed: bool,
    pub row: u8,
    pub col: u8,
}

impl From<Event> for KeyEvent {
    fn from(event: Event) -> Self {
        let (row, col) = event.coord();
        Self { pressed: event.is_press(), row, col }
    }
}

impl From<KeyEvent> for Event {
    fn from(e: KeyEvent) -> Self {
        if e.pressed {
            Event::Press(e.row, e.col)
        } else {
            Event::Release(e.row, e.col)
        }
    }
}

/// Maximum size of COBS-encoded message including the sentinel
pub const MAX_FRAME_SIZE: usize = Message::POSTCARD_MAX_SIZE + Message::POSTCARD_MAX_SIZE / 254 + 2;
