//! Unicode input
//!
//! Hosts have no standard way of receiving arbitrary characters from a keyboard,
//! so code points are typed using OS-specific input methods. UCIS allows to
//! select a symbol by typing its name.

use heapless::Vec;
use keyberon::key_code::KeyCode::{self, *};

use super::sequence::{Sequence, Sequencer};

/// OS-specific method of typing unicode code points
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum InputMode {
    /// Ctrl+Shift+U, hex code, Space (IBus)
    Linux,
    /// Option held while typing UTF-16 hex code units ("Unicode Hex Input")
    MacOs,
    /// Alt held, numpad plus, hex code (requires EnableHexNumpad registry key)
    Windows,
    /// RAlt, U, hex code, Enter
    WinCompose,
}

/// Marker typed when UCIS input starts (U+2328 KEYBOARD)
pub const UCIS_MARKER: u32 = 0x2328;
/// Maximum length of UCIS symbol name
pub const UCIS_MAX_LEN: usize = 32;

/// Named unicode symbol
pub struct UcisSymbol {
    pub name: &'static str,
    pub code_point: u32,
}

const HEX_KEYS: [KeyCode; 16] = [
    Kb0, Kb1, Kb2, Kb3, Kb4, Kb5, Kb6, Kb7, Kb8, Kb9, A, B, C, D, E, F,
];

/// Hex digits of a value without leading zeros, but at least `min_digits` long
fn hex_digits(value: u32, min_digits: usize) -> impl Iterator<Item = KeyCode> {
    let digits = (1..=8)
        .find(|&n| n >= min_digits && (n == 8 || value >> (4 * n) == 0))
        .unwrap_or(8);
    (0..digits).rev().map(move |i| HEX_KEYS[((value >> (4 * i)) & 0xf) as usize])
}

fn type_hex<'a, const N: usize>(seq: Sequence<'a, N>, value: u32, min_digits: usize) -> Sequence<'a, N> {
    hex_digits(value, min_digits).fold(seq, |seq, key| seq.tap(key))
}

/// Encode a code point as UTF-16 code units
fn utf16(code_point: u32) -> Vec<u32, 2> {
    let mut units = Vec::new();
    if code_point > 0xffff {
        let cp = code_point - 0x10000;
        units.push(0xd800 | (cp >> 10)).ok();
        units.push(0xdc00 | (cp & 0x3ff)).ok();
    } else {
        units.push(code_point).ok();
    }
    units
}

impl InputMode {
    /// Queue key sequence that types the given code point
    pub fn send<const N: usize>(&self, seq: &mut Sequencer<N>, code_point: u32) {
        match self {
            Self::Linux => {
                let s = seq.sequence().chord(&[LCtrl, LShift, U]);
                type_hex(s, code_point, 1).tap(Space);
            },
            Self::MacOs => {
                let s = utf16(code_point).into_iter()
                    .fold(seq.sequence().hold(LAlt), |s, unit| type_hex(s, unit, 4));
                s.release_all();
            },
            Self::Windows => {
                let s = seq.sequence().hold(LAlt).tap(KpPlus);
                type_hex(s, code_point, 1).release_all();
            },
            Self::WinCompose => {
                let s = seq.sequence().tap(RAlt).tap(U);
                type_hex(s, code_point, 1).tap(Enter);
            },
        }
    }
}

/// Character typed by a key as used in UCIS symbol names
fn key_char(key: KeyCode) -> Option<char> {
    let code = key as u8;
    match key {
        A | B | C | D | E | F | G | H | I | J | K | L | M
        | N | O | P | Q | R | S | T | U | V | W | X | Y | Z => Some((b'a' + (code - A as u8)) as char),
        Kb1 | Kb2 | Kb3 | Kb4 | Kb5 | Kb6 | Kb7 | Kb8 | Kb9 => Some((b'1' + (code - Kb1 as u8)) as char),
        Kb0 => Some('0'),
        _ => None,
    }
}

/// What UCIS does with a pressed key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UcisKey {
    /// Not handled by UCIS, key goes to the host
    Pass,
    /// Recorded (or removed with backspace), key goes to the host as well
    Typed,
    /// Input finished, key must not reach the host
    Consumed,
}

/// Unicode input by symbol name
pub struct Ucis {
    symbols: &'static [UcisSymbol],
    input: Option<Vec<KeyCode, UCIS_MAX_LEN>>,
}

impl Ucis {
    pub const fn new(symbols: &'static [UcisSymbol]) -> Self {
        Self { symbols, input: None }
    }

    pub fn is_active(&self) -> bool {
        self.input.is_some()
    }

    /// Start symbol input, typing the marker
    pub fn start<const N: usize>(&mut self, mode: InputMode, seq: &mut Sequencer<N>) {
        mode.send(seq, UCIS_MARKER);
        self.input = Some(Vec::new());
    }

    /// Handle a key press while UCIS is active
    pub fn key<const N: usize>(&mut self, key: KeyCode, mode: InputMode, seq: &mut Sequencer<N>) -> UcisKey {
        let Some(input) = self.input.as_mut() else {
            return UcisKey::Pass;
        };
        match key {
            Space | Enter => {
                self.commit(mode, seq);
                UcisKey::Consumed
            },
            Escape => {
                // remove the marker
                seq.tap(BSpace);
                self.input = None;
                defmt::debug!("UCIS cancelled");
                UcisKey::Consumed
            },
            BSpace => {
                input.pop();
                UcisKey::Typed
            },
            key if key_char(key).is_some() => {
                if input.push(key).is_err() {
                    defmt::warn!("UCIS input too long");
                }
                UcisKey::Typed
            },
            _ => UcisKey::Pass,
        }
    }

    fn lookup(&self, input: &[KeyCode]) -> Option<u32> {
        self.symbols.iter()
            .find(|sym| {
                sym.name.len() == input.len()
                    && sym.name.chars().zip(input).all(|(c, &key)| key_char(key) == Some(c))
            })
            .map(|sym| sym.code_point)
    }

    fn commit<const N: usize>(&mut self, mode: InputMode, seq: &mut Sequencer<N>) {
        let Some(input) = self.input.take() else {
            return;
        };
        // erase the marker and the name
        let erase = (0..=input.len()).fold(seq.sequence(), |s, _| s.tap(BSpace));
        match self.lookup(&input) {
            Some(code_point) => {
                drop(erase);
                defmt::debug!("UCIS symbol U+{=u32:x}", code_point);
                mode.send(seq, code_point);
            },
            None => {
                defmt::info!("UCIS symbol not found");
                input.iter().fold(erase, |s, &key| s.tap(key));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::sequence::tests::play;
    use std::vec::Vec as StdVec;

    type Seq = Sequencer<128>;

    static SYMBOLS: &[UcisSymbol] = &[
        UcisSymbol { name: "poop", code_point: 0x1f4a9 },
        UcisSymbol { name: "alpha", code_point: 0x03b1 },
    ];

    /// Keys tapped (pressed in one frame) in order, ignoring held keys
    fn tapped(frames: &[StdVec<KeyCode>], held: &[KeyCode]) -> StdVec<KeyCode> {
        frames.iter()
            .filter_map(|f| f.iter().find(|k| !held.contains(k)).copied())
            .collect()
    }

    #[test]
    fn hex_digits_trim_leading_zeros() {
        let d: StdVec<_> = hex_digits(0x1f4a9, 1).collect();
        assert_eq!(d, [Kb1, F, Kb4, A, Kb9]);
        let d: StdVec<_> = hex_digits(0x3b1, 4).collect();
        assert_eq!(d, [Kb0, Kb3, B, Kb1]);
        let d: StdVec<_> = hex_digits(0, 1).collect();
        assert_eq!(d, [Kb0]);
    }

    #[test]
    fn surrogate_pairs() {
        assert_eq!(&utf16(0x1f4a9)[..], &[0xd83d, 0xdca9]);
        assert_eq!(&utf16(0x2328)[..], &[0x2328]);
    }

    #[test]
    fn linux_sequence() {
        let mut seq = Seq::new();
        InputMode::Linux.send(&mut seq, 0x3b1);
        assert_eq!(play(&mut seq), [
            vec![LCtrl, LShift, U], vec![],
            vec![Kb3], vec![],
            vec![B], vec![],
            vec![Kb1], vec![],
            vec![Space], vec![],
        ]);
    }

    #[test]
    fn windows_sequence() {
        let mut seq = Seq::new();
        InputMode::Windows.send(&mut seq, 0x1f4a9);
        let frames = play(&mut seq);
        assert_eq!(frames.first().unwrap(), &vec![LAlt]);
        assert!(frames.last().unwrap().is_empty());
        assert!(frames[..frames.len() - 1].iter().all(|f| f.contains(&LAlt)));
        assert_eq!(tapped(&frames, &[LAlt]), [KpPlus, Kb1, F, Kb4, A, Kb9]);
    }

    #[test]
    fn macos_sequence_uses_utf16() {
        let mut seq = Seq::new();
        InputMode::MacOs.send(&mut seq, 0x1f4a9);
        let frames = play(&mut seq);
        assert!(frames[..frames.len() - 1].iter().all(|f| f.contains(&LAlt)));
        assert_eq!(tapped(&frames, &[LAlt]), [D, Kb8, Kb3, D, D, C, A, Kb9]);
    }

    #[test]
    fn wincompose_sequence() {
        let mut seq = Seq::new();
        InputMode::WinCompose.send(&mut seq, 0x2328);
        let frames = play(&mut seq);
        assert_eq!(tapped(&frames, &[]), [RAlt, U, Kb2, Kb3, Kb2, Kb8, Enter]);
    }

    fn type_name(ucis: &mut Ucis, seq: &mut Seq, name: &[KeyCode]) {
        for &key in name {
            assert_eq!(ucis.key(key, InputMode::Linux, seq), UcisKey::Typed);
        }
    }

    #[test]
    fn ucis_commit_known_symbol() {
        let mut seq = Seq::new();
        let mut ucis = Ucis::new(SYMBOLS);
        ucis.start(InputMode::Linux, &mut seq);
        assert!(ucis.is_active());
        play(&mut seq);

        type_name(&mut ucis, &mut seq, &[P, O, O, P]);
        assert_eq!(ucis.key(Enter, InputMode::Linux, &mut seq), UcisKey::Consumed);
        assert!(!ucis.is_active());

        let keys = tapped(&play(&mut seq), &[]);
        // marker + 4 letters
        assert_eq!(&keys[..5], &[BSpace; 5]);
        assert_eq!(&keys[5..], &[LCtrl, Kb1, F, Kb4, A, Kb9, Space]);
    }

    #[test]
    fn ucis_backspace_edits_name() {
        let mut seq = Seq::new();
        let mut ucis = Ucis::new(SYMBOLS);
        ucis.start(InputMode::Linux, &mut seq);
        play(&mut seq);

        type_name(&mut ucis, &mut seq, &[P, O, X]);
        assert_eq!(ucis.key(BSpace, InputMode::Linux, &mut seq), UcisKey::Typed);
        type_name(&mut ucis, &mut seq, &[O, P]);
        assert_eq!(ucis.key(Space, InputMode::Linux, &mut seq), UcisKey::Consumed);

        let keys = tapped(&play(&mut seq), &[]);
        assert_eq!(&keys[..5], &[BSpace; 5]);
        assert_eq!(keys[5], LCtrl);
    }

    #[test]
    fn ucis_unknown_symbol_retypes_input() {
        let mut seq = Seq::new();
        let mut ucis = Ucis::new(SYMBOLS);
        ucis.start(InputMode::Linux, &mut seq);
        play(&mut seq);

        type_name(&mut ucis, &mut seq, &[B, E, T, A]);
        assert_eq!(ucis.key(Enter, InputMode::Linux, &mut seq), UcisKey::Consumed);
        let keys = tapped(&play(&mut seq), &[]);
        assert_eq!(keys, [BSpace, BSpace, BSpace, BSpace, BSpace, B, E, T, A]);
    }

    #[test]
    fn ucis_cancel_removes_marker() {
        let mut seq = Seq::new();
        let mut ucis = Ucis::new(SYMBOLS);
        ucis.start(InputMode::Linux, &mut seq);
        play(&mut seq);

        type_name(&mut ucis, &mut seq, &[P]);
        assert_eq!(ucis.key(Escape, InputMode::Linux, &mut seq), UcisKey::Consumed);
        assert_eq!(tapped(&play(&mut seq), &[]), [BSpace]);
        assert_eq!(ucis.key(A, InputMode::Linux, &mut seq), UcisKey::Pass);
    }

    #[test]
    fn ucis_other_keys_pass() {
        let mut seq = Seq::new();
        let mut ucis = Ucis::new(SYMBOLS);
        ucis.start(InputMode::Linux, &mut seq);
        assert_eq!(ucis.key(LShift, InputMode::Linux, &mut seq), UcisKey::Pass);
        assert_eq!(ucis.key(Tab, InputMode::Linux, &mut seq), UcisKey::Pass);
    }
}
