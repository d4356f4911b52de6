//! Layout and functions of keys on the keyboard
//!
//! Matrix positions without a physical key are `n`. Global coordinates span
//! both halves: columns 0-6 are the left half (outer to inner), 7-13 the right
//! half (inner to outer). Row 5 is the thumb cluster.

use keyberon::{
    action::{self, k, m, Action::*, HoldTapConfig},
    key_code::KeyCode::*,
    layout::{self, layout},
};

use crate::bsp::{NCOLS, NROWS};
use crate::keyboard::actions::Action as CustomAction;
use crate::txbolt::{self, Contribution};

pub const N_LAYERS: usize = 4;

pub const BASE: usize = 0;
pub const NUMP: usize = 1;
pub const ARRW: usize = 2;
pub const TXBOLT: usize = 3;

pub type Layers = layout::Layers<{ 2 * NCOLS }, NROWS, N_LAYERS, CustomAction>;
pub type Layer = [[Action; 2 * NCOLS]; NROWS];
pub type Action = action::Action<CustomAction>;

const HOLDTAP_TIMEOUT: u16 = 200;
const HTC: HoldTapConfig = HoldTapConfig::Default;
/// Hold as soon as another key is pressed, before the timeout
const HTC_SHIFT: HoldTapConfig = HoldTapConfig::HoldOnOtherKeyPress;

macro_rules! ht {
    ($hold:expr, $tap:expr, $config:expr) => {
        HoldTap {
            timeout: HOLDTAP_TIMEOUT,
            hold: &$hold,
            tap: &$tap,
            tap_hold_interval: 0,
            config: $config,
        }
    };
    ($hold:expr, $tap:expr) => {
        ht!($hold, $tap, HTC)
    };
}

const fn steno(c: Contribution) -> Action {
    Action::Custom(CustomAction::Steno(c))
}

/// Replace transparent keys of `top` with keys from `base`
///
/// Used for toggled layers which become the default layer, where keyberon
/// has nothing below to fall through to.
pub const fn overlay(base: &Layer, mut top: Layer) -> Layer {
    let mut row = 0;
    while row < NROWS {
        let mut col = 0;
        while col < 2 * NCOLS {
            if matches!(top[row][col], Trans) {
                top[row][col] = base[row][col];
            }
            col += 1;
        }
        row += 1;
    }
    top
}

// Layer switching
const ARRW_SLASH: Action = ht!(action::l(ARRW), k(Slash));
const ARRW_BSLASH: Action = ht!(action::l(ARRW), k(Bslash));
const TG_NUMP: Action = Action::Custom(CustomAction::ToggleLayer(NUMP));
const TG_TXBOLT: Action = Action::Custom(CustomAction::ToggleLayer(TXBOLT));

// Special keys
const LEAD: Action = Action::Custom(CustomAction::Leader);
const LOCKS: Action = Action::Custom(CustomAction::TapDance(&[NumLock, CapsLock, ScrollLock]));

// Space cadet shift: parenthesis on tap
const LPAREN: Action = m(&[LShift, Kb9]);
const RPAREN: Action = m(&[LShift, Kb0]);
const LSPO: Action = ht!(k(LShift), LPAREN, HTC_SHIFT);
const RSPC: Action = ht!(k(RShift), RPAREN, HTC_SHIFT);

// Modifiers on hold
const RALT_LBRC: Action = ht!(k(RAlt), k(LBracket));
const RCTL_RBRC: Action = ht!(k(RCtrl), k(RBracket));
const RALT_KP0: Action = ht!(k(RAlt), k(Kp0));
const RCTL_KPDOT: Action = ht!(k(RCtrl), k(KpDot));

// Media
const M_PREV: Action = k(MediaPreviousSong);
const M_STOP: Action = k(MediaStop);
const M_PLAY: Action = k(MediaPlayPause);
const M_NEXT: Action = k(MediaNextSong);
const M_MUTE: Action = k(MediaMute);
const M_VOLD: Action = k(MediaVolDown);
const M_VOLU: Action = k(MediaVolUp);

// Steno keys
const S_L: Action = steno(txbolt::keys::LS);
const T_L: Action = steno(txbolt::keys::LT);
const K_L: Action = steno(txbolt::keys::LK);
const P_L: Action = steno(txbolt::keys::LP);
const W_L: Action = steno(txbolt::keys::LW);
const H_L: Action = steno(txbolt::keys::LH);
const R_L: Action = steno(txbolt::keys::LR);
const A_L: Action = steno(txbolt::keys::LA);
const O_L: Action = steno(txbolt::keys::LO);
const STAR: Action = steno(txbolt::keys::STAR);
const E_R: Action = steno(txbolt::keys::RE);
const U_R: Action = steno(txbolt::keys::RU);
const F_R: Action = steno(txbolt::keys::RF);
const R_R: Action = steno(txbolt::keys::RR);
const P_R: Action = steno(txbolt::keys::RP);
const B_R: Action = steno(txbolt::keys::RB);
const L_R: Action = steno(txbolt::keys::RL);
const G_R: Action = steno(txbolt::keys::RG);
const T_R: Action = steno(txbolt::keys::RT);
const S_R: Action = steno(txbolt::keys::RS);
const D_R: Action = steno(txbolt::keys::RD);
const Z_R: Action = steno(txbolt::keys::RZ);
const NUM: Action = steno(txbolt::keys::NUM);

const BASE_LAYER: [Layer; 1] = layout! {
    {
        [ Grave  Kb1   Kb2  Kb3    Kb4  Kb5          Kb6           Kb7  Kb8          Kb9         Kb0     Minus  Equal  BSpace ]
        [ Tab    Q     W    E      R    T            Home          PgUp Y            U           I       O      P      Delete ]
        [ Quote  A     S    D      F    G            n             n    H            J           K       L      SColon Enter  ]
        [ {LSPO} Z     X    C      V    B            End           PgDown N          M           Comma   Dot    Up     {RSPC} ]
        [ LCtrl  LGui  Menu {LEAD} LAlt n            n             n    n            {RALT_LBRC} {RCTL_RBRC} Left Down Right ]
        [ PScreen Escape {LOCKS} Space {ARRW_SLASH} {TG_TXBOLT} n  n    {ARRW_BSLASH} Space      {TG_NUMP} {M_MUTE} {M_VOLD} {M_VOLU} ]
    }
};

const NUMP_LAYER: [Layer; 1] = layout! {
    {
        [ t t t t t t t   t t {LPAREN}     {RPAREN}       KpSlash  KpAsterisk t ]
        [ t t t t t t t   t t Kp7          Kp8            Kp9      KpMinus    t ]
        [ t t t t t t n   n t Kp4          Kp5            Kp6      KpPlus     t ]
        [ t t t t t t t   t t Kp1          Kp2            Kp3      KpEqual    t ]
        [ t t t t t n n   n n {RALT_KP0}   {RCTL_KPDOT}   KpComma  KpEnter    t ]
        [ t t t t t t n   n t t            t              t        t          t ]
    }
};

const ARRW_LAYER: [Layer; 1] = layout! {
    {
        [ Escape F1       F2       F3       F4       F5  F6    F7   F8    F9   F10   F11  F12    t      ]
        [ t      t        t        Up       t        t   t     t    t     t    t     t    t      Insert ]
        [ t      t        Left     Down     Right    t   n     n    Left  Down Up    Right t     t      ]
        [ t      {M_PREV} {M_STOP} {M_PLAY} {M_NEXT} t   t     t    t     t    t     t    PgUp   t      ]
        [ t      t        t        t        t        n   n     n    n     t    t     Home PgDown End    ]
        [ SysReq Pause    t        t        t        t   n     n    t     t    t     t    t      t      ]
    }
};

const TXBOLT_LAYER: [Layer; 1] = layout! {
    {
        [ BSpace n     n     n     n     n      n   n n      n     n     n     n     n     ]
        [ n      {NUM} {NUM} {NUM} {NUM} {NUM}  n   n {NUM}  {NUM} {NUM} {NUM} {NUM} {NUM} ]
        [ n      {S_L} {T_L} {P_L} {H_L} {STAR} n   n {STAR} {F_R} {P_R} {L_R} {T_R} {D_R} ]
        [ n      {S_L} {K_L} {W_L} {R_L} {STAR} n   n {STAR} {R_R} {B_R} {G_R} {S_R} {Z_R} ]
        [ n      n     n     n     n     n      n   n n      n     n     n     n     n     ]
        [ n      n     n     {A_L} {O_L} t      n   n {E_R}  {U_R} t     n     n     n     ]
    }
};

pub static LAYERS: Layers = [
    BASE_LAYER[0],
    overlay(&BASE_LAYER[0], NUMP_LAYER[0]),
    ARRW_LAYER[0],
    overlay(&BASE_LAYER[0], TXBOLT_LAYER[0]),
];
