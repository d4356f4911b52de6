//! Main USB keyboard logic
//!
//! Key resolution is delegated to the [`keyberon`] layout. Events are also
//! inspected as they arrive, before the layout processes them, to drive the
//! firmware extensions: steno chords, tap dance, leader key, unicode input and
//! layer toggles. Handling them on the raw event path keeps the chord
//! serializer in sync with physical presses, independent of layout delays.

/// Special keyboard actions
pub mod actions;
/// Layer indicator LEDs state
pub mod indicators;
/// Keyboard matrix scanner with debouncing
mod keys;
pub mod leader;
/// Serial link between keyboard halves
pub mod link;
/// Messages sent between keyboard halves
pub mod msg;
pub mod sequence;
pub mod tap_dance;
pub mod unicode;

use heapless::Deque;
use keyberon::key_code::{KbHidReport, KeyCode};
use keyberon::layout::{self, Event};

use crate::bsp::{NCOLS, NROWS};
use crate::layers::{self, Action, N_LAYERS};
use crate::txbolt::{ChordSerializer, Contribution};
use actions::Action as CustomAction;
use indicators::{Indicators, LayerIndicator};
use leader::{Leader, LeaderCommand, LeaderConfig};
use sequence::Sequencer;
use tap_dance::TapDance;
use unicode::{InputMode, Ucis, UcisKey, UcisSymbol};

pub use keys::Keys;

/// Capacity of the queue of bytes for the steno serial port
pub const SERIAL_QUEUE: usize = 64;
/// Maximum number of frames of synthetic key sequences
pub const SEQUENCE_LEN: usize = 160;

type Layout = layout::Layout<{ 2 * NCOLS }, NROWS, N_LAYERS, CustomAction>;

/// Keyboard configuration
pub struct KeyboardConfig {
    /// Keyboard layers configuration
    pub layers: &'static layers::Layers,
    /// Tap dance term in ticks
    pub tapping_term: u16,
    pub leader: &'static LeaderConfig,
    /// Delay before rebooting to bootloader in ticks
    pub reset_delay: u16,
    /// Unicode input method selected at start-up
    pub unicode_mode: InputMode,
    /// Symbols available through UCIS
    pub ucis: &'static [UcisSymbol],
    /// Indicator LEDs of layers
    pub indicators: &'static [LayerIndicator],
}

/// Result of a keyboard tick
pub struct Tick {
    /// USB HID report for this tick
    pub report: KbHidReport,
    pub indicators: Indicators,
    /// Reboot into the bootloader has been requested
    pub reboot: bool,
}

#[derive(Clone, Copy)]
struct PressedKey {
    /// Steno contribution resolved at press time
    contribution: Option<Contribution>,
    /// Whether the press went to the layout, so must the release
    forwarded: bool,
}

/// Keyboard logic
pub struct Keyboard {
    config: &'static KeyboardConfig,
    layout: Layout,
    default_layer: usize,
    pressed: [[Option<PressedKey>; 2 * NCOLS]; NROWS],
    serializer: ChordSerializer,
    serial: Deque<u8, SERIAL_QUEUE>,
    tap_dance: TapDance,
    leader: Leader,
    ucis: Ucis,
    unicode_mode: InputMode,
    sequencer: Sequencer<SEQUENCE_LEN>,
    reboot_in: Option<u16>,
}

/// Key code tapped by an action, used to capture keys
fn tap_keycode(action: &Action) -> Option<KeyCode> {
    match action {
        Action::KeyCode(key) => Some(*key),
        Action::HoldTap { tap, .. } => tap_keycode(tap),
        _ => None,
    }
}

impl Keyboard {
    pub fn new(config: &'static KeyboardConfig) -> Self {
        defmt::info!("Unicode input mode: {}", config.unicode_mode);
        Self {
            config,
            layout: Layout::new(config.layers),
            default_layer: layers::BASE,
            pressed: [[None; 2 * NCOLS]; NROWS],
            serializer: ChordSerializer::new(),
            serial: Deque::new(),
            tap_dance: TapDance::new(config.tapping_term),
            leader: Leader::new(config.leader),
            ucis: Ucis::new(config.ucis),
            unicode_mode: config.unicode_mode,
            sequencer: Sequencer::new(),
            reboot_in: None,
        }
    }

    /// Process a key event in global matrix coordinates
    pub fn event(&mut self, event: Event) {
        let (row, col) = event.coord();
        if row as usize >= NROWS || col as usize >= 2 * NCOLS {
            defmt::warn!("Key event out of range: ({=u8}, {=u8})", row, col);
            return;
        }
        if event.is_press() {
            self.press(row, col);
        } else {
            self.release(row, col);
        }
    }

    fn press(&mut self, row: u8, col: u8) {
        let (r, c) = (row as usize, col as usize);
        if self.pressed[r][c].is_some() {
            defmt::warn!("Key ({=u8}, {=u8}) already pressed", row, col);
            return;
        }

        let action = self.action_at(r, c);
        let contribution = match action {
            Action::Custom(CustomAction::Steno(contribution)) => Some(*contribution),
            _ => None,
        };
        self.serializer.on_key_event(contribution, true, &mut self.serial);

        if !matches!(action, Action::Custom(CustomAction::TapDance(_))) {
            if let Some(key) = self.tap_dance.interrupt() {
                self.sequencer.tap(key);
            }
        }

        let forwarded = !self.capture(action);
        if forwarded {
            self.custom_action(action, (row, col));
            self.layout.event(Event::Press(row, col));
        }
        self.pressed[r][c] = Some(PressedKey { contribution, forwarded });
    }

    fn release(&mut self, row: u8, col: u8) {
        let Some(key) = self.pressed[row as usize][col as usize].take() else {
            defmt::warn!("Release of key ({=u8}, {=u8}) that is not pressed", row, col);
            return;
        };
        self.serializer.on_key_event(key.contribution, false, &mut self.serial);
        if key.forwarded {
            self.layout.event(Event::Release(row, col));
        }
    }

    /// Action under the key, looked up the same way as the layout does
    fn action_at(&self, row: usize, col: usize) -> &'static Action {
        let layers = self.config.layers;
        [self.layout.current_layer(), self.default_layer]
            .into_iter()
            .map(|layer| &layers[layer][row][col])
            .find(|action| !matches!(action, Action::Trans))
            .unwrap_or(&Action::NoOp)
    }

    /// Leader and UCIS take over key presses, returns true if the press has been consumed
    fn capture(&mut self, action: &Action) -> bool {
        if self.leader.is_active() {
            if let Some(key) = tap_keycode(action) {
                self.leader.push(key);
            }
            return true;
        }
        match tap_keycode(action) {
            Some(key) if self.ucis.is_active() => {
                self.ucis.key(key, self.unicode_mode, &mut self.sequencer) == UcisKey::Consumed
            },
            _ => false,
        }
    }

    fn custom_action(&mut self, action: &'static Action, coord: (u8, u8)) {
        let Action::Custom(custom) = action else {
            return;
        };
        match custom {
            CustomAction::Steno(_) => {},
            CustomAction::TapDance(keys) => {
                if let Some(key) = self.tap_dance.tap(coord, *keys) {
                    self.sequencer.tap(key);
                }
            },
            CustomAction::Leader => self.leader.start(),
            CustomAction::ToggleLayer(layer) => self.toggle_layer(*layer),
        }
    }

    /// Toggles are exclusive: toggling another layer replaces the current one,
    /// toggling the active one goes back to the base layer
    fn toggle_layer(&mut self, layer: usize) {
        let target = if self.default_layer == layer { layers::BASE } else { layer };
        defmt::info!("Default layer: {=usize}", target);
        self.default_layer = target;
        self.layout.set_default_layer(target);
    }

    fn command(&mut self, cmd: LeaderCommand) {
        match cmd {
            LeaderCommand::Bootloader => {
                defmt::info!("Rebooting to bootloader in {=u16} ticks", self.config.reset_delay);
                self.reboot_in = Some(self.config.reset_delay);
            },
            LeaderCommand::Ucis => self.ucis.start(self.unicode_mode, &mut self.sequencer),
        }
    }

    /// Returns true when the reboot delay has just elapsed
    fn reboot_countdown(&mut self) -> bool {
        let Some(remaining) = self.reboot_in.as_mut() else {
            return false;
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.reboot_in = None;
            true
        } else {
            false
        }
    }

    /// Advance keyboard time by one tick (1 ms)
    pub fn tick(&mut self) -> Tick {
        // Custom actions have already been handled when their events arrived
        let _ = self.layout.tick();

        if let Some(key) = self.tap_dance.tick() {
            self.sequencer.tap(key);
        }
        let reboot = self.reboot_countdown();
        if let Some(cmd) = self.leader.tick() {
            self.command(cmd);
        }

        let report = self.layout.keycodes()
            .chain(self.sequencer.tick().iter().copied())
            .collect();
        let indicators = Indicators::for_layer(self.layout.current_layer(), self.config.indicators);

        Tick { report, indicators, reboot }
    }

    /// Bytes waiting to be written to the steno serial port
    pub fn serial(&mut self) -> &mut Deque<u8, SERIAL_QUEUE> {
        &mut self.serial
    }

    /// Default layer selected with layer toggles
    pub fn default_layer(&self) -> usize {
        self.default_layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG;
    use indicators::Indicator;
    use std::vec::Vec;

    const TG_TXBOLT: (u8, u8) = (5, 5);
    const TG_NUMP: (u8, u8) = (5, 10);
    const LOCKS: (u8, u8) = (5, 2);
    const LEAD: (u8, u8) = (4, 3);
    const ARRW_SLASH: (u8, u8) = (5, 4);
    const LSPO: (u8, u8) = (3, 0);
    const RSPC: (u8, u8) = (3, 13);

    const KEY_A: (u8, u8) = (2, 1);
    const KEY_C: (u8, u8) = (3, 3);
    const KEY_F: (u8, u8) = (2, 4);
    const KEY_K: (u8, u8) = (2, 10);
    const KEY_N: (u8, u8) = (3, 8);
    const KEY_O: (u8, u8) = (1, 11);
    const KEY_P: (u8, u8) = (1, 12);
    const KEY_U: (u8, u8) = (1, 9);
    const SPACE: (u8, u8) = (5, 3);

    // positions on the steno layer
    const STENO_S: (u8, u8) = (2, 1);
    const STENO_A: (u8, u8) = (5, 3);
    const STENO_F: (u8, u8) = (2, 9);

    const LSHIFT_BIT: u8 = 0x02;
    const LALT_BIT: u8 = 0x04;

    fn press(kb: &mut Keyboard, (row, col): (u8, u8)) {
        kb.event(Event::Press(row, col));
    }

    fn release(kb: &mut Keyboard, (row, col): (u8, u8)) {
        kb.event(Event::Release(row, col));
    }

    fn run(kb: &mut Keyboard, ticks: usize) -> Vec<Tick> {
        (0..ticks).map(|_| kb.tick()).collect()
    }

    fn tap(kb: &mut Keyboard, pos: (u8, u8)) -> Vec<Tick> {
        press(kb, pos);
        let mut ticks = run(kb, 5);
        release(kb, pos);
        ticks.extend(run(kb, 5));
        ticks
    }

    fn serial(kb: &mut Keyboard) -> Vec<u8> {
        let bytes = kb.serial().iter().copied().collect();
        kb.serial().clear();
        bytes
    }

    /// Non-modifier keys in the report
    fn keys(tick: &Tick) -> Vec<u8> {
        tick.report.as_bytes()[2..].iter().copied().filter(|&k| k != 0).collect()
    }

    fn count_with(ticks: &[Tick], key: KeyCode) -> usize {
        ticks.iter().filter(|t| keys(t).contains(&(key as u8))).count()
    }

    #[test]
    fn steno_chord_on_toggled_layer() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, TG_TXBOLT);
        assert_eq!(kb.default_layer(), layers::TXBOLT);
        assert!(serial(&mut kb).is_empty());

        press(&mut kb, STENO_F);
        press(&mut kb, STENO_S);
        let mut ticks = run(&mut kb, 3);
        press(&mut kb, STENO_A);
        release(&mut kb, STENO_S);
        ticks.extend(run(&mut kb, 3));
        release(&mut kb, STENO_A);
        assert!(serial(&mut kb).is_empty());
        release(&mut kb, STENO_F);
        assert_eq!(serial(&mut kb), [0x01, 0x42, 0x81, 0x00]);

        ticks.extend(run(&mut kb, 3));
        assert!(ticks.iter().all(|t| keys(t).is_empty()));
        assert_eq!(ticks.last().unwrap().indicators, Indicators::single(Indicator::Led3));
    }

    #[test]
    fn typing_on_base_layer_sends_no_serial_bytes() {
        let mut kb = Keyboard::new(&CONFIG);
        let ticks = tap(&mut kb, KEY_F);
        assert_eq!(count_with(&ticks, KeyCode::F), 5);
        tap(&mut kb, KEY_K);
        assert!(serial(&mut kb).is_empty());
    }

    #[test]
    fn space_cadet_shift_applies_to_fast_typing() {
        let mut kb = Keyboard::new(&CONFIG);
        press(&mut kb, LSPO);
        let mut ticks = run(&mut kb, 2);
        ticks.extend(tap(&mut kb, KEY_A));
        release(&mut kb, LSPO);
        ticks.extend(run(&mut kb, 5));

        assert_eq!(count_with(&ticks, KeyCode::Kb9), 0);
        let shifted_a = ticks.iter()
            .filter(|t| t.report.as_bytes()[0] & LSHIFT_BIT != 0)
            .filter(|t| keys(t).contains(&(KeyCode::A as u8)))
            .count();
        assert!(shifted_a > 0);
        assert!(ticks.iter().all(|t| !keys(t).contains(&(KeyCode::A as u8)) || t.report.as_bytes()[0] & LSHIFT_BIT != 0));
    }

    #[test]
    fn space_cadet_shift_tapped_alone_types_parenthesis() {
        let mut kb = Keyboard::new(&CONFIG);
        let mut ticks = tap(&mut kb, RSPC);
        ticks.extend(run(&mut kb, 5));
        assert!(count_with(&ticks, KeyCode::Kb0) > 0);
        assert_eq!(count_with(&ticks, KeyCode::Kb9), 0);
    }

    #[test]
    fn contribution_is_kept_across_layer_change() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, TG_TXBOLT);
        press(&mut kb, STENO_S);
        // back to the base layer while the steno key is held
        tap(&mut kb, TG_TXBOLT);
        assert_eq!(kb.default_layer(), layers::BASE);
        assert!(serial(&mut kb).is_empty());
        release(&mut kb, STENO_S);
        assert_eq!(serial(&mut kb), [0x01, 0x00]);
    }

    #[test]
    fn layer_toggles_are_exclusive() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, TG_NUMP);
        assert_eq!(kb.default_layer(), layers::NUMP);
        let ticks = tap(&mut kb, TG_TXBOLT);
        assert_eq!(kb.default_layer(), layers::TXBOLT);
        assert_eq!(ticks.last().unwrap().indicators, Indicators::single(Indicator::Led3));
        tap(&mut kb, TG_NUMP);
        assert_eq!(kb.default_layer(), layers::NUMP);
        let ticks = tap(&mut kb, TG_NUMP);
        assert_eq!(kb.default_layer(), layers::BASE);
        assert_eq!(ticks.last().unwrap().indicators, Indicators::NONE);
    }

    #[test]
    fn numpad_keys_after_toggle() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, TG_NUMP);
        let ticks = tap(&mut kb, KEY_U);
        assert_eq!(count_with(&ticks, KeyCode::Kp7), 5);
        assert_eq!(count_with(&ticks, KeyCode::U), 0);
    }

    #[test]
    fn momentary_layer_indicator() {
        let mut kb = Keyboard::new(&CONFIG);
        press(&mut kb, ARRW_SLASH);
        let ticks = run(&mut kb, 250);
        assert_eq!(ticks[0].indicators, Indicators::NONE);
        assert_eq!(ticks.last().unwrap().indicators, Indicators::single(Indicator::Led2));
        release(&mut kb, ARRW_SLASH);
        let ticks = run(&mut kb, 2);
        assert_eq!(ticks.last().unwrap().indicators, Indicators::NONE);
    }

    #[test]
    fn spurious_events_are_ignored() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, TG_TXBOLT);
        release(&mut kb, STENO_S);
        kb.event(Event::Press(NROWS as u8, 0));
        kb.event(Event::Press(0, 2 * NCOLS as u8));
        kb.event(Event::Release(0, 2 * NCOLS as u8));
        assert!(serial(&mut kb).is_empty());

        // repeated press is not counted twice
        press(&mut kb, STENO_S);
        press(&mut kb, STENO_S);
        release(&mut kb, STENO_S);
        assert_eq!(serial(&mut kb), [0x01, 0x00]);
    }

    #[test]
    fn tap_dance_selects_lock_key() {
        for (taps, key) in [(1, KeyCode::NumLock), (2, KeyCode::CapsLock), (3, KeyCode::ScrollLock)] {
            let mut kb = Keyboard::new(&CONFIG);
            let mut ticks = Vec::new();
            for _ in 0..taps {
                ticks.extend(tap(&mut kb, LOCKS));
            }
            ticks.extend(run(&mut kb, 250));
            assert_eq!(count_with(&ticks, key), 1, "{} taps", taps);
            assert_eq!(ticks.iter().filter(|t| !keys(t).is_empty()).count(), 1);
        }
    }

    #[test]
    fn tap_dance_interrupted_by_other_key() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, LOCKS);
        tap(&mut kb, LOCKS);
        press(&mut kb, KEY_F);
        let ticks = run(&mut kb, 1);
        assert!(keys(&ticks[0]).contains(&(KeyCode::CapsLock as u8)));
        let ticks = run(&mut kb, 250);
        assert_eq!(count_with(&ticks, KeyCode::CapsLock), 0);
    }

    #[test]
    fn leader_reboots_after_delay() {
        let mut kb = Keyboard::new(&CONFIG);
        let mut ticks = tap(&mut kb, LEAD);
        ticks.extend(tap(&mut kb, KEY_F));
        ticks.extend(tap(&mut kb, KEY_K));
        press(&mut kb, KEY_N);
        release(&mut kb, KEY_N);
        let after = run(&mut kb, 1400);
        let reboot_at = after.iter().position(|t| t.reboot).map(|i| i + 1);
        assert_eq!(reboot_at, Some(300 + 1000));
        assert_eq!(after.iter().filter(|t| t.reboot).count(), 1);

        ticks.extend(after);
        assert!(ticks.iter().all(|t| keys(t).is_empty()));
    }

    #[test]
    fn unknown_leader_sequence_does_nothing() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, LEAD);
        tap(&mut kb, KEY_K);
        let ticks = run(&mut kb, 1500);
        assert!(ticks.iter().all(|t| !t.reboot && keys(t).is_empty()));
        // keys reach the host again
        let ticks = tap(&mut kb, KEY_F);
        assert_eq!(count_with(&ticks, KeyCode::F), 5);
    }

    #[test]
    fn ucis_types_named_symbol() {
        let mut kb = Keyboard::new(&CONFIG);
        tap(&mut kb, LEAD);
        tap(&mut kb, KEY_U);
        tap(&mut kb, KEY_C);
        // leader timeout, then the marker is typed
        let mut ticks = run(&mut kb, 350);
        for key in [KEY_P, KEY_O, KEY_O, KEY_P] {
            ticks.extend(tap(&mut kb, key));
        }
        ticks.extend(tap(&mut kb, SPACE));
        ticks.extend(run(&mut kb, 100));

        assert_eq!(count_with(&ticks, KeyCode::Space), 0);
        assert_eq!(count_with(&ticks, KeyCode::P), 10);
        assert_eq!(count_with(&ticks, KeyCode::O), 5);
        // marker and 4 letters erased
        assert_eq!(count_with(&ticks, KeyCode::BSpace), 5);
        // marker and the symbol typed with Alt held
        assert_eq!(count_with(&ticks, KeyCode::KpPlus), 2);
        let alt_held = ticks.iter().filter(|t| t.report.as_bytes()[0] & LALT_BIT != 0).count();
        assert!(alt_held > 0);
        assert!(kb.sequencer.is_idle());
    }
}
