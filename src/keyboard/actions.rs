use keyberon::key_code::KeyCode;

use crate::txbolt::Contribution;

/// Additional key actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Steno key contributing to a TxBolt chord
    Steno(Contribution),
    /// Tap dance selecting one of the keys by the number of taps
    TapDance(&'static [KeyCode]),
    /// Start leader key sequence
    Leader,
    /// Toggle the given layer as the default layer
    ToggleLayer(usize),
}
