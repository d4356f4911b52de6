use keyberon::key_code::KeyCode;

/// Key with different meaning depending on the number of taps
///
/// Taps are counted until no new tap arrives within the tapping term, or until
/// any other key is pressed. The resulting key is then tapped once.
pub struct TapDance {
    term: u16,
    active: Option<Dance>,
}

struct Dance {
    keys: &'static [KeyCode],
    coord: (u8, u8),
    count: u8,
    elapsed: u16,
}

impl Dance {
    fn finish(self) -> Option<KeyCode> {
        let key = (self.count as usize)
            .checked_sub(1)
            .and_then(|i| self.keys.get(i))
            .copied();
        defmt::debug!("Tap dance finished after {=u8} taps", self.count);
        key
    }
}

impl TapDance {
    /// Create tap dance handler with tapping term given in ticks
    pub const fn new(term: u16) -> Self {
        Self { term, active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Tap of a tap dance key at given coordinates
    ///
    /// Returns the key of a previous dance that got interrupted by this one.
    pub fn tap(&mut self, coord: (u8, u8), keys: &'static [KeyCode]) -> Option<KeyCode> {
        if let Some(dance) = self.active.as_mut().filter(|d| d.coord == coord) {
            dance.count = dance.count.saturating_add(1);
            dance.elapsed = 0;
            return None;
        }
        let interrupted = self.interrupt();
        self.active = Some(Dance { keys, coord, count: 1, elapsed: 0 });
        interrupted
    }

    /// Another key has been pressed, finish the dance immediately
    pub fn interrupt(&mut self) -> Option<KeyCode> {
        self.active.take().and_then(Dance::finish)
    }

    /// Advance time, returns the selected key when the dance finishes
    pub fn tick(&mut self) -> Option<KeyCode> {
        let dance = self.active.as_mut()?;
        dance.elapsed = dance.elapsed.saturating_add(1);
        if dance.elapsed >= self.term {
            self.interrupt()
        } else {
            None
        }
    }
}
