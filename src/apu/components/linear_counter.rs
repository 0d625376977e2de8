//! Linear counter - the triangle channel's fine-grained duration gate

use serde::{Deserialize, Serialize};

/// Linear counter, clocked on quarter-frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearCounter {
    /// Remaining count; the triangle sequencer is gated at zero
    pub counter: u8,
    /// Reload value from $4008
    reload_value: u8,
    /// Reload pending (set by a $400B write)
    reload: bool,
    /// Control flag ($4008 bit 7); also halts the length counter
    control: bool,
}

impl LinearCounter {
    pub fn new() -> Self {
        Self {
            counter: 0,
            reload_value: 0,
            reload: false,
            control: false,
        }
    }

    /// Decode $4008
    pub fn write_control(&mut self, data: u8) {
        self.reload_value = data & 0x7F;
        self.control = data & 0x80 != 0;
    }

    /// Request a reload ($400B write)
    pub fn set_reload(&mut self) {
        self.reload = true;
    }

    /// Clock the counter (quarter-frame)
    pub fn clock(&mut self) {
        if self.reload {
            self.counter = self.reload_value;
        } else if self.counter > 0 {
            self.counter -= 1;
        }
        if !self.control {
            self.reload = false;
        }
    }

    pub fn active(&self) -> bool {
        self.counter > 0
    }
}

impl Default for LinearCounter {
    fn default() -> Self {
        Self::new()
    }
}
