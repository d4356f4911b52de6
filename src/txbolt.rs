//! TxBolt stenography protocol
//!
//! Keys of a steno chord are pressed together and the whole chord is sent
//! when all keys have been released. Each key contributes a single byte code:
//! the top 2 bits select one of 4 protocol groups and the bottom 6 bits select
//! the key within the group. Codes of the same group are OR-ed together, so a
//! chord is transmitted as at most 4 bytes (one per non-empty group, in group
//! order) followed by a `0x00` terminator.

use defmt::Format;
use heapless::{Deque, Vec};

/// Mask of the bits selecting the protocol group
pub const GROUP_MASK: u8 = 0b1100_0000;
/// Mask of the bits selecting keys within a group
pub const SIGNAL_MASK: u8 = !GROUP_MASK;
/// Byte that ends every chord packet
pub const TERMINATOR: u8 = 0x00;
/// Number of protocol groups (and chord buffer slots)
pub const N_GROUPS: usize = 4;
/// Maximum length of a single packet: one byte per group and the terminator
pub const MAX_PACKET_SIZE: usize = N_GROUPS + 1;

/// Protocol group selected by the top 2 bits of a code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Format)]
#[repr(u8)]
pub enum Group {
    Group0 = 0,
    Group1 = 1,
    Group2 = 2,
    Group3 = 3,
}

impl Group {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Group bits as they appear in the code
    pub const fn bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// Split a raw code into its group and sub-signal mask
pub const fn decode(code: u8) -> (Group, u8) {
    let group = match (code & GROUP_MASK) >> 6 {
        0 => Group::Group0,
        1 => Group::Group1,
        2 => Group::Group2,
        _ => Group::Group3,
    };
    (group, code & SIGNAL_MASK)
}

/// Per-key contribution to a chord
#[derive(Clone, Copy, Debug, PartialEq, Eq, Format)]
pub struct Contribution(u8);

impl Contribution {
    pub const fn new(group: Group, signals: u8) -> Self {
        Self(group.bits() | (signals & SIGNAL_MASK))
    }

    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u8 {
        self.0
    }

    pub const fn group(&self) -> Group {
        decode(self.0).0
    }

    pub const fn signals(&self) -> u8 {
        decode(self.0).1
    }
}

/// Contribution codes of the steno keys
///
/// `L`/`R` prefix marks the left/right side of the steno keyboard.
pub mod keys {
    use super::{Contribution, Group::*};

    pub const LS: Contribution = Contribution::new(Group0, 0b000001);
    pub const LT: Contribution = Contribution::new(Group0, 0b000010);
    pub const LK: Contribution = Contribution::new(Group0, 0b000100);
    pub const LP: Contribution = Contribution::new(Group0, 0b001000);
    pub const LW: Contribution = Contribution::new(Group0, 0b010000);
    pub const LH: Contribution = Contribution::new(Group0, 0b100000);
    pub const LR: Contribution = Contribution::new(Group1, 0b000001);
    pub const LA: Contribution = Contribution::new(Group1, 0b000010);
    pub const LO: Contribution = Contribution::new(Group1, 0b000100);
    pub const STAR: Contribution = Contribution::new(Group1, 0b001000);
    pub const RE: Contribution = Contribution::new(Group1, 0b010000);
    pub const RU: Contribution = Contribution::new(Group1, 0b100000);
    pub const RF: Contribution = Contribution::new(Group2, 0b000001);
    pub const RR: Contribution = Contribution::new(Group2, 0b000010);
    pub const RP: Contribution = Contribution::new(Group2, 0b000100);
    pub const RB: Contribution = Contribution::new(Group2, 0b001000);
    pub const RL: Contribution = Contribution::new(Group2, 0b010000);
    pub const RG: Contribution = Contribution::new(Group2, 0b100000);
    pub const RT: Contribution = Contribution::new(Group3, 0b000001);
    pub const RS: Contribution = Contribution::new(Group3, 0b000010);
    pub const RD: Contribution = Contribution::new(Group3, 0b000100);
    pub const RZ: Contribution = Contribution::new(Group3, 0b001000);
    pub const NUM: Contribution = Contribution::new(Group3, 0b010000);

    pub const ALL: [Contribution; 23] = [
        LS, LT, LK, LP, LW, LH, LR, LA, LO, STAR, RE, RU,
        RF, RR, RP, RB, RL, RG, RT, RS, RD, RZ, NUM,
    ];
}

/// Destination of serialized chord bytes
pub trait ChordSink {
    /// Write a whole packet, or nothing if it does not fit
    ///
    /// Returns false when the packet has been dropped.
    fn send_packet(&mut self, packet: &[u8]) -> bool;
}

impl<const N: usize> ChordSink for Deque<u8, N> {
    fn send_packet(&mut self, packet: &[u8]) -> bool {
        if self.capacity() - self.len() < packet.len() {
            return false;
        }
        for &byte in packet {
            // capacity checked above
            self.push_back(byte).ok();
        }
        true
    }
}

impl<const N: usize> ChordSink for Vec<u8, N> {
    fn send_packet(&mut self, packet: &[u8]) -> bool {
        self.extend_from_slice(packet).is_ok()
    }
}

/// Accumulated chord, one slot per group
#[derive(Clone, Default, PartialEq, Eq, Format)]
#[cfg_attr(test, derive(Debug))]
pub struct ChordBuffer([u8; N_GROUPS]);

impl ChordBuffer {
    pub const fn new() -> Self {
        Self([0; N_GROUPS])
    }

    /// OR the contribution into the slot of its group
    pub fn add(&mut self, contribution: Contribution) {
        self.0[contribution.group().index()] |= contribution.code();
    }

    pub fn slot(&self, group: Group) -> u8 {
        self.0[group.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn clear(&mut self) {
        self.0 = [0; N_GROUPS];
    }

    /// Wire representation: non-zero slots in group order and the terminator
    pub fn packet(&self) -> Vec<u8, MAX_PACKET_SIZE> {
        self.0.iter()
            .copied()
            .filter(|&b| b != 0)
            .chain(core::iter::once(TERMINATOR))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Format)]
enum State {
    /// No steno key pressed since the last flush
    Idle,
    /// Chord is being built, flush when all keys are released
    Accumulating,
}

/// Chord accumulation state machine
///
/// Counts every key press/release (steno or not, on any layer) so that
/// a chord is only sent when the keyboard is fully released.
pub struct ChordSerializer {
    pressed: u16,
    chord: ChordBuffer,
    state: State,
}

impl Default for ChordSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChordSerializer {
    pub const fn new() -> Self {
        Self {
            pressed: 0,
            chord: ChordBuffer::new(),
            state: State::Idle,
        }
    }

    /// Number of keys currently held
    pub fn pressed_count(&self) -> u16 {
        self.pressed
    }

    /// Chord accumulated so far
    pub fn chord(&self) -> &ChordBuffer {
        &self.chord
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Process a key event
    ///
    /// `contribution` is `None` for keys that are not steno keys; these only
    /// affect the press counter.
    pub fn on_key_event(&mut self, contribution: Option<Contribution>, pressed: bool, sink: &mut impl ChordSink) {
        if pressed {
            self.pressed = self.pressed.saturating_add(1);
            if let Some(contribution) = contribution {
                self.chord.add(contribution);
                self.state = State::Accumulating;
            }
        } else {
            match self.pressed.checked_sub(1) {
                Some(count) => self.pressed = count,
                None => {
                    defmt::warn!("Release without matching press");
                    return;
                },
            }
            if self.pressed == 0 && self.state == State::Accumulating {
                self.flush(sink);
                self.state = State::Idle;
            }
        }
    }

    /// Send the accumulated chord and clear the buffer
    ///
    /// A chord that does not fit in the sink is dropped as a whole.
    pub fn flush(&mut self, sink: &mut impl ChordSink) {
        let packet = self.chord.packet();
        if sink.send_packet(&packet) {
            defmt::debug!("TxBolt chord: {=[u8]:#x}", &packet[..]);
        } else {
            defmt::warn!("Serial queue full, dropping chord {=[u8]:#x}", &packet[..]);
        }
        self.chord.clear();
    }
}
