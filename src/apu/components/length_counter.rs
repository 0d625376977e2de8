//! Length counter - silences a channel after a programmed duration

use crate::apu::constants::LENGTH_COUNTER_TABLE;
use serde::{Deserialize, Serialize};

/// Length counter shared by the four waveform channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthCounter {
    /// Remaining length; the channel is silent at zero
    pub counter: u8,
    /// Halt flag (also the envelope loop flag on pulse/noise)
    halt: bool,
}

impl LengthCounter {
    pub fn new() -> Self {
        Self {
            counter: 0,
            halt: false,
        }
    }

    /// Load from the 5-bit index written to the channel's length register
    pub fn load(&mut self, index: u8) {
        self.counter = LENGTH_COUNTER_TABLE[(index & 0x1F) as usize];
    }

    pub fn set_halt(&mut self, halt: bool) {
        self.halt = halt;
    }

    /// Clock the counter (half-frame)
    pub fn clock(&mut self) {
        if !self.halt && self.counter > 0 {
            self.counter -= 1;
        }
    }

    /// Whether the counter still gates the channel on
    pub fn active(&self) -> bool {
        self.counter > 0
    }
}

impl Default for LengthCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_uses_table() {
        let mut lc = LengthCounter::new();
        lc.load(0);
        assert_eq!(lc.counter, 10);
        lc.load(1);
        assert_eq!(lc.counter, 254);
    }

    #[test]
    fn test_clock_counts_down() {
        let mut lc = LengthCounter::new();
        lc.load(3); // 2
        lc.clock();
        assert!(lc.active());
        lc.clock();
        assert!(!lc.active());
        lc.clock();
        assert_eq!(lc.counter, 0, "stops at zero");
    }

    #[test]
    fn test_halt_freezes_counter() {
        let mut lc = LengthCounter::new();
        lc.load(0);
        lc.set_halt(true);
        lc.clock();
        assert_eq!(lc.counter, 10);
    }
}
