use heapless::Vec;
use keyberon::key_code::KeyCode;

/// Maximum number of keys in a leader sequence
pub const MAX_SEQUENCE: usize = 5;

/// Commands that can be triggered by leader key sequences
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum LeaderCommand {
    /// Reboot into the bootloader (after a delay)
    Bootloader,
    /// Start unicode input by symbol name
    Ucis,
}

/// Entry of the leader key dictionary
pub struct LeaderSequence {
    pub keys: &'static [KeyCode],
    pub command: LeaderCommand,
}

/// Leader key configuration
pub struct LeaderConfig {
    /// Timeout in ticks, restarted on every key of the sequence
    pub timeout: u16,
    pub dictionary: &'static [LeaderSequence],
}

/// Captures keys after the leader key and matches them against the dictionary
pub struct Leader {
    config: &'static LeaderConfig,
    capture: Option<Capture>,
}

struct Capture {
    keys: Vec<KeyCode, MAX_SEQUENCE>,
    elapsed: u16,
}

impl Leader {
    pub const fn new(config: &'static LeaderConfig) -> Self {
        Self { config, capture: None }
    }

    /// Leader key has been pressed and following keys are being captured
    pub fn is_active(&self) -> bool {
        self.capture.is_some()
    }

    pub fn start(&mut self) {
        defmt::debug!("Leader start");
        self.capture = Some(Capture { keys: Vec::new(), elapsed: 0 });
    }

    /// Add key to the sequence, ignored when not active
    pub fn push(&mut self, key: KeyCode) {
        if let Some(capture) = self.capture.as_mut() {
            capture.elapsed = 0;
            if capture.keys.push(key).is_err() {
                defmt::warn!("Leader sequence too long, ignoring key {=u8}", key as u8);
            }
        }
    }

    /// Advance time, returns matched command when the sequence ends
    pub fn tick(&mut self) -> Option<LeaderCommand> {
        let capture = self.capture.as_mut()?;
        capture.elapsed = capture.elapsed.saturating_add(1);
        if capture.elapsed < self.config.timeout {
            return None;
        }
        let capture = self.capture.take()?;
        let found = self.config.dictionary.iter()
            .find(|seq| seq.keys == &capture.keys[..])
            .map(|seq| seq.command);
        match found {
            Some(cmd) => defmt::info!("Leader sequence: {}", cmd),
            None => defmt::info!("Unknown leader sequence of {=usize} keys", capture.keys.len()),
        }
        found
    }
}
