//! Keyboard configuration

use keyberon::key_code::KeyCode::*;

use crate::keyboard::KeyboardConfig;
use crate::keyboard::indicators::{Indicator, LayerIndicator};
use crate::keyboard::leader::{LeaderCommand, LeaderConfig, LeaderSequence};
use crate::keyboard::unicode::{InputMode, UcisSymbol};
use crate::layers::{self, LAYERS};

pub static CONFIG: KeyboardConfig = KeyboardConfig {
    layers: &LAYERS,
    tapping_term: 200,
    leader: &LEADER,
    reset_delay: 1000,
    unicode_mode: InputMode::Windows,
    ucis: UCIS,
    indicators: INDICATORS,
};

static LEADER: LeaderConfig = LeaderConfig {
    timeout: 300,
    dictionary: &[
        LeaderSequence { keys: &[F, K, N], command: LeaderCommand::Bootloader },
        LeaderSequence { keys: &[U, C], command: LeaderCommand::Ucis },
    ],
};

const UCIS: &[UcisSymbol] = &[
    UcisSymbol { name: "poop", code_point: 0x1f4a9 },
];

const INDICATORS: &[LayerIndicator] = &[
    LayerIndicator { layer: layers::NUMP, led: Indicator::Led1 },
    LayerIndicator { layer: layers::ARRW, led: Indicator::Led2 },
    LayerIndicator { layer: layers::TXBOLT, led: Indicator::Led3 },
];
