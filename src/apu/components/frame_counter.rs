//! Frame counter - the APU's low-frequency event sequencer
//!
//! Counts CPU cycles against a fixed table of quarter/half-frame
//! boundaries. In 4-step mode the final boundary also raises the frame
//! IRQ; 5-step mode never interrupts. The counter is advanced in
//! instruction-sized batches, and a $4017 write pre-loads the cycle
//! counter slightly negative to compensate for the write's own cycles.

use crate::apu::constants::{
    FIVE_STEP_BOUNDARIES, FIVE_STEP_PERIOD, FOUR_STEP_BOUNDARIES, FOUR_STEP_PERIOD,
    FRAME_COUNTER_WRITE_PRELOAD,
};
use serde::{Deserialize, Serialize};

/// Sequencer mode, selected by $4017 bit 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceMode {
    /// 4-step mode: envelopes at ~240Hz, frame IRQ at ~60Hz
    FourStep,
    /// 5-step mode: slightly slower, no IRQ
    FiveStep,
}

/// Events produced by one batch of frame counter cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTick {
    /// Quarter-frame clocks fired (envelopes, linear counter)
    pub quarters: u8,
    /// Half-frame clocks fired (length counters, sweeps)
    pub halves: u8,
}

/// Frame counter state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameCounter {
    /// Current sequence mode
    pub mode: SequenceMode,
    /// CPU cycles into the current sequence (negative right after a write)
    pub cycle_counter: i32,
    /// Next boundary index
    pub step: usize,
    /// IRQ inhibit flag ($4017 bit 6)
    pub irq_inhibit: bool,
    /// Frame IRQ line
    pub irq_flag: bool,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self {
            mode: SequenceMode::FourStep,
            cycle_counter: 0,
            step: 0,
            irq_inhibit: false,
            irq_flag: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Handle a $4017 write; returns the clocks to apply immediately
    ///
    /// Setting bit 6 clears the frame IRQ and keeps it from being raised
    /// until the bit is cleared again. Selecting 5-step mode clocks a
    /// quarter and a half frame at once.
    pub fn write_control(&mut self, value: u8) -> FrameTick {
        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_flag = false;
        }
        self.mode = if value & 0x80 != 0 {
            SequenceMode::FiveStep
        } else {
            SequenceMode::FourStep
        };
        self.cycle_counter = FRAME_COUNTER_WRITE_PRELOAD;
        self.step = 0;

        if self.mode == SequenceMode::FiveStep {
            FrameTick {
                quarters: 1,
                halves: 1,
            }
        } else {
            FrameTick::default()
        }
    }

    /// Advance by `cycles` CPU cycles, collecting the clocks that fired
    pub fn advance(&mut self, cycles: u32) -> FrameTick {
        let mut tick = FrameTick::default();
        self.cycle_counter += cycles as i32;
        loop {
            match self.mode {
                SequenceMode::FourStep => {
                    if self.step < 4 && self.cycle_counter >= FOUR_STEP_BOUNDARIES[self.step] {
                        tick.quarters += 1;
                        if self.step == 1 || self.step == 3 {
                            tick.halves += 1;
                        }
                        if self.step == 3 && !self.irq_inhibit {
                            self.irq_flag = true;
                        }
                        self.step += 1;
                        continue;
                    }
                    if self.step == 4 && self.cycle_counter >= FOUR_STEP_PERIOD {
                        self.cycle_counter -= FOUR_STEP_PERIOD;
                        self.step = 0;
                        continue;
                    }
                }
                SequenceMode::FiveStep => {
                    if self.step < 5 && self.cycle_counter >= FIVE_STEP_BOUNDARIES[self.step] {
                        // The fourth boundary is silent in 5-step mode.
                        if self.step != 3 {
                            tick.quarters += 1;
                            if self.step == 1 || self.step == 4 {
                                tick.halves += 1;
                            }
                        }
                        self.step += 1;
                        continue;
                    }
                    if self.step == 5 && self.cycle_counter >= FIVE_STEP_PERIOD {
                        self.cycle_counter -= FIVE_STEP_PERIOD;
                        self.step = 0;
                        continue;
                    }
                }
            }
            break;
        }
        tick
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_step_sequence() {
        let mut fc = FrameCounter::new();
        let tick = fc.advance(7456);
        assert_eq!(tick, FrameTick::default(), "nothing before 7457");

        let tick = fc.advance(1);
        assert_eq!(tick.quarters, 1);
        assert_eq!(tick.halves, 0);

        let tick = fc.advance(14913 - 7457);
        assert_eq!(tick.quarters, 1);
        assert_eq!(tick.halves, 1, "second step is a half frame");
    }

    #[test]
    fn test_four_step_irq_and_wrap() {
        let mut fc = FrameCounter::new();
        let tick = fc.advance(29829);
        assert_eq!(tick.quarters, 4);
        assert_eq!(tick.halves, 2);
        assert!(fc.irq_flag, "IRQ raised at the fourth step");

        // The next full period fires four more quarters.
        let tick = fc.advance(FOUR_STEP_PERIOD as u32);
        assert_eq!(tick.quarters, 4);
    }

    #[test]
    fn test_irq_inhibit_blocks_and_clears() {
        let mut fc = FrameCounter::new();
        fc.irq_flag = true;
        let tick = fc.write_control(0x40);
        assert_eq!(tick, FrameTick::default());
        assert!(!fc.irq_flag, "bit 6 clears the pending IRQ");

        fc.advance(FOUR_STEP_PERIOD as u32 * 2);
        assert!(!fc.irq_flag, "and keeps it from being raised");
    }

    #[test]
    fn test_five_step_write_clocks_immediately() {
        let mut fc = FrameCounter::new();
        let tick = fc.write_control(0x80);
        assert_eq!(tick.quarters, 1);
        assert_eq!(tick.halves, 1);
    }

    #[test]
    fn test_five_step_has_no_irq() {
        let mut fc = FrameCounter::new();
        fc.write_control(0x80);
        fc.advance(FIVE_STEP_PERIOD as u32 * 2 + 100);
        assert!(!fc.irq_flag);
    }

    #[test]
    fn test_five_step_silent_fourth_boundary() {
        let mut fc = FrameCounter::new();
        fc.write_control(0x80);
        // Compensate the write pre-load, then run one full sequence.
        let tick = fc.advance((FIVE_STEP_PERIOD - FRAME_COUNTER_WRITE_PRELOAD) as u32);
        assert_eq!(tick.quarters, 4, "only four of five boundaries clock");
        assert_eq!(tick.halves, 2);
    }

    #[test]
    fn test_write_preload_delays_first_step() {
        let mut fc = FrameCounter::new();
        fc.write_control(0x00);
        let tick = fc.advance(7457);
        assert_eq!(tick.quarters, 0, "pre-load pushes the boundary out");
        let tick = fc.advance(6);
        assert_eq!(tick.quarters, 1);
    }
}
