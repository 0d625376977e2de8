// APU constants - lookup tables shared by the channels and the mixer

/// Length counter lookup table
/// Maps the 5-bit length counter load value to the actual counter value
pub const LENGTH_COUNTER_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Duty cycle patterns for the pulse channels
/// Each pattern is 8 steps of one square-wave cycle
pub const DUTY_PATTERNS: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0], // 12.5%
    [0, 1, 1, 0, 0, 0, 0, 0], // 25%
    [0, 1, 1, 1, 1, 0, 0, 0], // 50%
    [1, 0, 0, 1, 1, 1, 1, 1], // 75% (25% inverted)
];

/// The triangle channel's 32-step output sequence
pub const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 15,
];

/// Noise channel timer periods in CPU cycles (NTSC)
pub const NOISE_PERIODS: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// DMC timer periods in CPU cycles (NTSC)
pub const DMC_PERIODS: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// CPU cycles a DMC sample fetch steals from the CPU
pub const DMC_FETCH_STALL_CYCLES: u32 = 4;

/// NTSC CPU clock rate in Hz, used to derive the sample timer
pub const CPU_CLOCK_HZ: f64 = 1_789_772.5;

/// Frame counter quarter/half boundaries, 4-step mode (CPU cycles)
pub const FOUR_STEP_BOUNDARIES: [i32; 4] = [7457, 14913, 22371, 29829];

/// 4-step sequence period in CPU cycles
pub const FOUR_STEP_PERIOD: i32 = 29830;

/// Frame counter boundaries, 5-step mode; the fourth step clocks nothing
pub const FIVE_STEP_BOUNDARIES: [i32; 5] = [7457, 14913, 22371, 29829, 37281];

/// 5-step sequence period in CPU cycles
pub const FIVE_STEP_PERIOD: i32 = 37282;

/// Pre-load applied by a $4017 write, compensating for the write's own
/// cycles under instruction-batched clocking
pub const FRAME_COUNTER_WRITE_PRELOAD: i32 = -6;

/// Default stereo positions (left weight out of 256) for
/// square1/square2/triangle/noise/DMC
pub const DEFAULT_PANNING: [u32; 5] = [80, 170, 100, 150, 128];
