//! Pulse wave channel implementation

use crate::apu::components::{Envelope, LengthCounter, Sweep, Timer};
use crate::apu::constants::DUTY_PATTERNS;
use serde::{Deserialize, Serialize};

/// Pulse wave channel (used for both square 1 and square 2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseChannel {
    /// Enabled flag (from $4015)
    pub(crate) enabled: bool,
    /// Duty cycle (0-3)
    duty: u8,
    /// Duty cycle sequence position (0-7)
    duty_position: u8,
    /// Envelope generator
    pub(crate) envelope: Envelope,
    /// Sweep unit
    pub(crate) sweep: Sweep,
    /// Length counter
    pub(crate) length_counter: LengthCounter,
    /// Timer, clocked every second CPU cycle
    pub(crate) timer: Timer,
    /// Leftover CPU cycle when an odd batch was clocked
    half_cycle: u8,
}

impl PulseChannel {
    /// `ones_complement_sweep` is true for square 1, whose sweep negates
    /// with ones' complement
    pub fn new(ones_complement_sweep: bool) -> Self {
        Self {
            enabled: false,
            duty: 0,
            duty_position: 0,
            envelope: Envelope::new(),
            sweep: Sweep::new(ones_complement_sweep),
            length_counter: LengthCounter::new(),
            timer: Timer::new(),
            half_cycle: 0,
        }
    }

    /// Write register 0 (duty, envelope)
    pub fn write_register_0(&mut self, data: u8) {
        self.duty = (data >> 6) & 0x03;
        self.length_counter.set_halt(data & 0x20 != 0);
        self.envelope.write_control(data);
    }

    /// Write register 1 (sweep)
    pub fn write_register_1(&mut self, data: u8) {
        self.sweep.write_control(data);
    }

    /// Write register 2 (timer low)
    pub fn write_register_2(&mut self, data: u8) {
        let high = (self.timer.period >> 8) as u8;
        self.timer.set_period(data, high);
    }

    /// Write register 3 (length load, timer high)
    pub fn write_register_3(&mut self, data: u8) {
        let low = self.timer.period as u8;
        self.timer.set_period(low, data & 0x07);
        if self.enabled {
            self.length_counter.load(data >> 3);
        }
        self.envelope.restart();
        self.duty_position = 0;
    }

    /// Set the enabled flag (from $4015)
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter.counter = 0;
        }
    }

    /// Advance the waveform by `cycles` CPU cycles
    pub fn clock_timer(&mut self, cycles: u32) {
        // The pulse timer runs at half the CPU clock.
        let total = cycles + self.half_cycle as u32;
        self.half_cycle = (total & 1) as u8;
        let steps = self.timer.step(total >> 1);
        self.duty_position = ((self.duty_position as u32 + steps) & 0x07) as u8;
    }

    /// Quarter-frame clock
    pub fn clock_quarter_frame(&mut self) {
        self.envelope.clock();
    }

    /// Half-frame clock
    pub fn clock_half_frame(&mut self) {
        self.length_counter.clock();
        let period = self.sweep.clock(self.timer.period);
        self.timer.period = period;
    }

    /// Whether the length counter is still running ($4015 status)
    pub fn length_active(&self) -> bool {
        self.length_counter.active()
    }

    /// Current DAC input (0-15)
    pub fn output(&self) -> u8 {
        if !self.enabled
            || !self.length_counter.active()
            || self.sweep.mutes(self.timer.period)
            || DUTY_PATTERNS[self.duty as usize][self.duty_position as usize] == 0
        {
            0
        } else {
            self.envelope.volume()
        }
    }
}
