use heapless::{Deque, Vec};
use keyberon::key_code::KeyCode;

/// Keys held during a single tick
pub type Frame = Vec<KeyCode, 4>;

/// Player of synthetic key sequences
///
/// Each queued frame is reported for one tick. A tap of a key is a frame with
/// the key pressed followed by a frame with the key released, so that the host
/// sees separate press and release reports.
pub struct Sequencer<const N: usize> {
    frames: Deque<Frame, N>,
    current: Frame,
}

/// Builder of a key sequence keeping track of held keys
pub struct Sequence<'a, const N: usize> {
    sequencer: &'a mut Sequencer<N>,
    held: Frame,
}

impl<const N: usize> Sequencer<N> {
    pub const fn new() -> Self {
        Self {
            frames: Deque::new(),
            current: Frame::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.frames.is_empty() && self.current.is_empty()
    }

    /// Number of frames waiting to be played
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    /// Start a new sequence
    pub fn sequence(&mut self) -> Sequence<'_, N> {
        Sequence { sequencer: self, held: Frame::new() }
    }

    /// Tap a single key
    pub fn tap(&mut self, key: KeyCode) {
        self.sequence().tap(key);
    }

    fn push(&mut self, frame: Frame) {
        if self.frames.push_back(frame).is_err() {
            defmt::warn!("Key sequence too long, dropping frame");
        }
    }

    /// Advance to the next frame, returns keys to be reported in this tick
    pub fn tick(&mut self) -> &[KeyCode] {
        self.current = self.frames.pop_front().unwrap_or_default();
        &self.current
    }
}

impl<const N: usize> Default for Sequencer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> Sequence<'a, N> {
    /// Keep the key pressed in all following frames
    pub fn hold(mut self, key: KeyCode) -> Self {
        if self.held.push(key).is_err() {
            defmt::warn!("Too many held keys in sequence");
        }
        self.sequencer.push(self.held.clone());
        self
    }

    /// Press and release a key while the held keys stay pressed
    pub fn tap(self, key: KeyCode) -> Self {
        self.chord(&[key])
    }

    /// Press and release multiple keys at once
    pub fn chord(self, keys: &[KeyCode]) -> Self {
        let mut frame = self.held.clone();
        for key in keys {
            if frame.push(*key).is_err() {
                defmt::warn!("Too many keys in sequence frame");
            }
        }
        self.sequencer.push(frame);
        self.sequencer.push(self.held.clone());
        self
    }

    /// Release all held keys
    pub fn release_all(mut self) -> Self {
        if !self.held.is_empty() {
            self.held.clear();
            self.sequencer.push(Frame::new());
        }
        self
    }
}
