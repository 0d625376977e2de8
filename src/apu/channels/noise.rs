//! Noise channel implementation

use crate::apu::components::{Envelope, LengthCounter, Timer};
use crate::apu::constants::NOISE_PERIODS;
use serde::{Deserialize, Serialize};

/// Pseudo-random noise channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseChannel {
    /// Enabled flag (from $4015)
    pub(crate) enabled: bool,
    /// 15-bit linear feedback shift register
    pub(crate) shift_register: u16,
    /// Short-sequence mode ($400E bit 7): feedback taps bit 6 instead of 1
    mode: bool,
    /// Envelope generator
    pub(crate) envelope: Envelope,
    /// Length counter
    pub(crate) length_counter: LengthCounter,
    /// Timer with the period from the 16-entry table
    pub(crate) timer: Timer,
}

impl NoiseChannel {
    pub fn new() -> Self {
        Self {
            enabled: false,
            shift_register: 1,
            mode: false,
            envelope: Envelope::new(),
            length_counter: LengthCounter::new(),
            timer: Timer::new(),
        }
    }

    /// Write $400C (envelope)
    pub fn write_register_0(&mut self, data: u8) {
        self.length_counter.set_halt(data & 0x20 != 0);
        self.envelope.write_control(data);
    }

    /// Write $400E (mode, period index)
    pub fn write_register_2(&mut self, data: u8) {
        self.mode = data & 0x80 != 0;
        // The table lists whole CPU-cycle intervals; the timer reloads
        // with period + 1.
        self.timer.period = NOISE_PERIODS[(data & 0x0F) as usize] - 1;
    }

    /// Write $400F (length load)
    pub fn write_register_3(&mut self, data: u8) {
        if self.enabled {
            self.length_counter.load(data >> 3);
        }
        self.envelope.restart();
    }

    /// Set the enabled flag (from $4015)
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter.counter = 0;
        }
    }

    /// Advance the shift register by `cycles` CPU cycles
    pub fn clock_timer(&mut self, cycles: u32) {
        let steps = self.timer.step(cycles);
        for _ in 0..steps {
            let tap = if self.mode { 6 } else { 1 };
            let feedback = (self.shift_register & 1) ^ ((self.shift_register >> tap) & 1);
            self.shift_register = (self.shift_register >> 1) | (feedback << 14);
        }
    }

    /// Quarter-frame clock
    pub fn clock_quarter_frame(&mut self) {
        self.envelope.clock();
    }

    /// Half-frame clock
    pub fn clock_half_frame(&mut self) {
        self.length_counter.clock();
    }

    /// Whether the length counter is still running ($4015 status)
    pub fn length_active(&self) -> bool {
        self.length_counter.active()
    }

    /// Current DAC input (0-15)
    pub fn output(&self) -> u8 {
        if !self.enabled || !self.length_counter.active() || self.shift_register & 1 != 0 {
            0
        } else {
            self.envelope.volume()
        }
    }
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self::new()
    }
}
