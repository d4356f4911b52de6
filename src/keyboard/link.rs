//! Serial link between keyboard halves
//!
//! Messages are serialized with postcard and framed with COBS, so the `0x00`
//! sentinel allows to resynchronize after a corrupted or partial frame.

use embedded_hal::serial;
use heapless::Deque;
use postcard::accumulator::{CobsAccumulator, FeedResult};

use super::msg::{Message, MAX_FRAME_SIZE};

/// Number of received messages that can wait for processing
pub const RX_QUEUE: usize = 8;

/// Message transmitter
pub struct LinkTx<TX> {
    tx: TX,
}

impl<TX> LinkTx<TX>
where
    TX: serial::Write<u8>,
{
    pub fn new(tx: TX) -> Self {
        Self { tx }
    }

    /// Send a message, blocking until all bytes are written
    pub fn send(&mut self, msg: &Message) {
        let mut buf = [0; MAX_FRAME_SIZE];
        let frame = match postcard::to_slice_cobs(msg, &mut buf[..]) {
            Ok(frame) => frame,
            Err(_) => {
                defmt::error!("Could not serialize message: {}", msg);
                return;
            },
        };
        for &byte in frame.iter() {
            if nb::block!(self.tx.write(byte)).is_err() {
                defmt::warn!("Link write error, dropping rest of frame");
                return;
            }
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &TX {
        &self.tx
    }
}

/// Message receiver
///
/// Bytes are fed from the UART interrupt, messages are read in the keyboard task.
pub struct LinkRx {
    acc: CobsAccumulator<MAX_FRAME_SIZE>,
    queue: Deque<Message, RX_QUEUE>,
}

impl Default for LinkRx {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkRx {
    pub fn new() -> Self {
        Self {
            acc: CobsAccumulator::new(),
            queue: Deque::new(),
        }
    }

    /// Consume received bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut window = bytes;
        while !window.is_empty() {
            window = match self.acc.feed::<Message>(window) {
                FeedResult::Consumed => break,
                FeedResult::OverFull(rest) => {
                    defmt::warn!("Link frame too long");
                    rest
                },
                FeedResult::DeserError(rest) => {
                    defmt::warn!("Link frame corrupted");
                    rest
                },
                FeedResult::Success { data, remaining } => {
                    if self.queue.push_back(data).is_err() {
                        defmt::warn!("Link RX queue full");
                    }
                    remaining
                },
            };
        }
    }

    /// Get next received message
    pub fn get(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }
}
