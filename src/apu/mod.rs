// APU module - audio processing unit (Ricoh 2A03 sound hardware)
//
// Five channels feed a non-linear DAC mix, sampled down to the host's rate
// with per-channel stereo positioning and a DC-removing high-pass. The
// frame counter sequences envelope/length/sweep clocks and the optional
// frame IRQ; it is advanced separately from the channel timers so the CPU
// can catch it up mid-instruction before a $4015 read without disturbing
// the waveforms.
//
// ## Register map
//
// | Address | Channel  | Function                        |
// |---------|----------|---------------------------------|
// | $4000-3 | Square 1 | duty/envelope, sweep, timer     |
// | $4004-7 | Square 2 | duty/envelope, sweep, timer     |
// | $4008-B | Triangle | linear counter, timer           |
// | $400C-F | Noise    | envelope, mode/period, length   |
// | $4010-3 | DMC      | rate/IRQ, DAC, address, length  |
// | $4015   | -        | channel enables / status        |
// | $4017   | -        | frame counter control           |

pub mod channels;
pub mod components;
pub mod constants;

use channels::{DmcChannel, NoiseChannel, PulseChannel, TriangleChannel};
use components::{FrameCounter, FrameTick};
use constants::{CPU_CLOCK_HZ, DEFAULT_PANNING};
use serde::{Deserialize, Serialize};

/// APU state
pub struct Apu {
    pub(crate) square1: PulseChannel,
    pub(crate) square2: PulseChannel,
    pub(crate) triangle: TriangleChannel,
    pub(crate) noise: NoiseChannel,
    pub(crate) dmc: DmcChannel,
    pub(crate) frame_counter: FrameCounter,

    /// Whether sample synthesis runs (the frame counter always does)
    emulate_sound: bool,
    /// CPU cycles per output sample
    cycles_per_sample: f64,
    /// Fractional cycle accumulator for the sample timer
    sample_accum: f64,

    /// Non-linear DAC table indexed by the combined square levels (x16)
    square_table: Vec<f32>,
    /// Non-linear DAC table indexed by 3*triangle + 2*noise + dmc (x16)
    tnd_table: Vec<f32>,
    /// Mix midpoint subtracted before the high-pass
    dc_value: f32,
    /// Left-weight (out of 256) per channel
    panning: [u32; 5],

    // One-pole high-pass state per side (time constant 2^10 samples).
    hp_l: f32,
    hp_r: f32,
    prev_l: f32,
    prev_r: f32,
}

impl Apu {
    pub fn new(sample_rate: u32, emulate_sound: bool) -> Self {
        let mut square_table = vec![0f32; 32 * 16];
        for (i, entry) in square_table.iter_mut().enumerate() {
            *entry = 95.52 / (8128.0 / (i as f32 / 16.0) + 100.0);
        }
        let mut tnd_table = vec![0f32; 204 * 16];
        for (i, entry) in tnd_table.iter_mut().enumerate() {
            *entry = 163.67 / (24329.0 / (i as f32 / 16.0) + 100.0);
        }
        let dc_value = (square_table[square_table.len() - 1] + tnd_table[tnd_table.len() - 1]) / 2.0;

        Apu {
            square1: PulseChannel::new(true),
            square2: PulseChannel::new(false),
            triangle: TriangleChannel::new(),
            noise: NoiseChannel::new(),
            dmc: DmcChannel::new(),
            frame_counter: FrameCounter::new(),
            emulate_sound,
            cycles_per_sample: CPU_CLOCK_HZ / sample_rate.max(1) as f64,
            sample_accum: 0.0,
            square_table,
            tnd_table,
            dc_value,
            panning: DEFAULT_PANNING,
            hp_l: 0.0,
            hp_r: 0.0,
            prev_l: 0.0,
            prev_r: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.square1 = PulseChannel::new(true);
        self.square2 = PulseChannel::new(false);
        self.triangle = TriangleChannel::new();
        self.noise = NoiseChannel::new();
        self.dmc = DmcChannel::new();
        self.frame_counter.reset();
        self.sample_accum = 0.0;
        self.hp_l = 0.0;
        self.hp_r = 0.0;
        self.prev_l = 0.0;
        self.prev_r = 0.0;
    }

    // ========================================
    // Register interface
    // ========================================

    /// Write an APU register ($4000-$4013, $4015, $4017)
    pub fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.square1.write_register_0(value),
            0x4001 => self.square1.write_register_1(value),
            0x4002 => self.square1.write_register_2(value),
            0x4003 => self.square1.write_register_3(value),
            0x4004 => self.square2.write_register_0(value),
            0x4005 => self.square2.write_register_1(value),
            0x4006 => self.square2.write_register_2(value),
            0x4007 => self.square2.write_register_3(value),
            0x4008 => self.triangle.write_register_0(value),
            0x400A => self.triangle.write_register_2(value),
            0x400B => self.triangle.write_register_3(value),
            0x400C => self.noise.write_register_0(value),
            0x400E => self.noise.write_register_2(value),
            0x400F => self.noise.write_register_3(value),
            0x4010 => self.dmc.write_register_0(value),
            0x4011 => self.dmc.write_register_1(value),
            0x4012 => self.dmc.write_register_2(value),
            0x4013 => self.dmc.write_register_3(value),
            0x4015 => self.write_status(value),
            0x4017 => {
                let tick = self.frame_counter.write_control(value);
                self.apply_frame_tick(tick);
            }
            _ => {}
        }
    }

    /// $4015 write: channel enables
    fn write_status(&mut self, value: u8) {
        self.square1.set_enabled(value & 0x01 != 0);
        self.square2.set_enabled(value & 0x02 != 0);
        self.triangle.set_enabled(value & 0x04 != 0);
        self.noise.set_enabled(value & 0x08 != 0);
        self.dmc.set_enabled(value & 0x10 != 0);
        self.dmc.irq_flag = false;
    }

    /// $4015 read: length/IRQ status
    ///
    /// Bit 5 is open bus (supplied by the caller from the CPU data bus).
    /// The read clears the frame IRQ but leaves the DMC IRQ alone.
    pub fn read_status(&mut self, data_bus: u8) -> u8 {
        let mut value = data_bus & 0x20;
        if self.square1.length_active() {
            value |= 0x01;
        }
        if self.square2.length_active() {
            value |= 0x02;
        }
        if self.triangle.length_active() {
            value |= 0x04;
        }
        if self.noise.length_active() {
            value |= 0x08;
        }
        if self.dmc.active() {
            value |= 0x10;
        }
        if self.frame_counter.irq_flag {
            value |= 0x40;
        }
        if self.dmc.irq_flag {
            value |= 0x80;
        }
        self.frame_counter.irq_flag = false;
        value
    }

    // ========================================
    // Clocking
    // ========================================

    /// Advance the frame counter by `cycles` CPU cycles
    ///
    /// This is also the CPU's $4015 catch-up path; it deliberately leaves
    /// the channel timers and the DMC untouched.
    pub fn clock_frame_counter(&mut self, cycles: u32) {
        let tick = self.frame_counter.advance(cycles);
        self.apply_frame_tick(tick);
    }

    fn apply_frame_tick(&mut self, tick: FrameTick) {
        for _ in 0..tick.quarters {
            self.square1.clock_quarter_frame();
            self.square2.clock_quarter_frame();
            self.triangle.clock_quarter_frame();
            self.noise.clock_quarter_frame();
        }
        for _ in 0..tick.halves {
            self.square1.clock_half_frame();
            self.square2.clock_half_frame();
            self.triangle.clock_half_frame();
            self.noise.clock_half_frame();
        }
    }

    /// Advance the channel timers by `cycles` CPU cycles
    ///
    /// Output samples due within the batch are delivered to `sink`. The
    /// return value is the address of a DMC fetch that came due, if any;
    /// the bus performs the read (it stalls the CPU and can hijack the
    /// data bus) and hands the byte back via [`Self::finish_dmc_fetch`].
    pub fn clock_channel_timers(
        &mut self,
        cycles: u32,
        sink: &mut dyn FnMut(f32, f32),
    ) -> Option<u16> {
        if cycles > 0 {
            self.square1.clock_timer(cycles);
            self.square2.clock_timer(cycles);
            self.triangle.clock_timer(cycles);
            self.noise.clock_timer(cycles);
            self.dmc.clock_timer(cycles);

            if self.emulate_sound {
                self.sample_accum += cycles as f64;
                while self.sample_accum >= self.cycles_per_sample {
                    self.sample_accum -= self.cycles_per_sample;
                    let (l, r) = self.mix_sample();
                    sink(l, r);
                }
            }
        }
        self.dmc.pending_fetch()
    }

    /// Hand a fetched sample byte back to the DMC
    pub fn finish_dmc_fetch(&mut self, data: u8) {
        self.dmc.finish_fetch(data);
    }

    /// Approximate CPU cycles until the next DMC fetch
    pub fn cycles_to_next_dmc_fetch(&self) -> Option<u32> {
        self.dmc.cycles_to_next_fetch()
    }

    /// Whether the frame or DMC IRQ line is active
    pub fn irq_asserted(&self) -> bool {
        self.frame_counter.irq_flag || self.dmc.irq_flag
    }

    // ========================================
    // Mixer
    // ========================================

    /// Produce one stereo sample from the current channel levels
    fn mix_sample(&mut self) -> (f32, f32) {
        let sq1 = self.square1.output() as u32 * 16;
        let sq2 = self.square2.output() as u32 * 16;
        let tri = self.triangle.output() as u32 * 16;
        let noi = self.noise.output() as u32 * 16;
        let dmc = self.dmc.output() as u32 * 16;

        let pan = &self.panning;
        let sq_l = (sq1 * pan[0] + sq2 * pan[1]) >> 8;
        let sq_r = (sq1 * (256 - pan[0]) + sq2 * (256 - pan[1])) >> 8;
        let tnd_l = (3 * tri * pan[2] + 2 * noi * pan[3] + dmc * pan[4]) >> 8;
        let tnd_r = (3 * tri * (256 - pan[2]) + 2 * noi * (256 - pan[3]) + dmc * (256 - pan[4]))
            >> 8;

        let raw_l = self.square_table[sq_l as usize] + self.tnd_table[tnd_l as usize]
            - self.dc_value;
        let raw_r = self.square_table[sq_r as usize] + self.tnd_table[tnd_r as usize]
            - self.dc_value;

        // One-pole high-pass with a 2^10-sample time constant:
        // y[n] = x[n] - x[n-1] + (1 - 2^-10) * y[n-1]
        self.hp_l = raw_l - self.prev_l + self.hp_l * (1.0 - 1.0 / 1024.0);
        self.prev_l = raw_l;
        self.hp_r = raw_r - self.prev_r + self.hp_r * (1.0 - 1.0 / 1024.0);
        self.prev_r = raw_r;

        (
            self.hp_l.clamp(-1.0, 0.999_969),
            self.hp_r.clamp(-1.0, 0.999_969),
        )
    }

    // ========================================
    // Save-state capture/restore
    // ========================================

    pub(crate) fn capture(&self) -> ApuState {
        ApuState {
            square1: self.square1.clone(),
            square2: self.square2.clone(),
            triangle: self.triangle.clone(),
            noise: self.noise.clone(),
            dmc: self.dmc.clone(),
            frame_counter: self.frame_counter.clone(),
            sample_accum: self.sample_accum,
        }
    }

    pub(crate) fn restore(&mut self, state: &ApuState) {
        self.square1 = state.square1.clone();
        self.square2 = state.square2.clone();
        self.triangle = state.triangle.clone();
        self.noise = state.noise.clone();
        self.dmc = state.dmc.clone();
        self.frame_counter = state.frame_counter.clone();
        self.sample_accum = state.sample_accum;
        self.hp_l = 0.0;
        self.hp_r = 0.0;
        self.prev_l = 0.0;
        self.prev_r = 0.0;
    }
}

/// Serialised APU state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApuState {
    pub square1: PulseChannel,
    pub square2: PulseChannel,
    pub triangle: TriangleChannel,
    pub noise: NoiseChannel,
    pub dmc: DmcChannel,
    pub frame_counter: FrameCounter,
    pub sample_accum: f64,
}
