// Configuration - host callbacks and console options
//
// The core never touches a window, an audio device or the filesystem; the
// host supplies closures at construction time and the console invokes
// them synchronously from the frame loop.

/// Frame callback: the 256x240 0xRRGGBB framebuffer, once per frame
pub type FrameCallback = Box<dyn FnMut(&[u32])>;

/// Audio callback: one stereo sample, L/R in [-1, 1)
pub type AudioCallback = Box<dyn FnMut(f32, f32)>;

/// Status callback: human-readable progress strings
pub type StatusCallback = Box<dyn FnMut(&str)>;

/// Battery callback: every CPU write into $6000-$7FFF
pub type BatteryCallback = Box<dyn FnMut(u16, u8)>;

/// Console options and host callbacks
pub struct ConsoleConfig {
    /// Called once per frame after rendering
    pub on_frame: Option<FrameCallback>,
    /// Called per output sample
    pub on_audio_sample: Option<AudioCallback>,
    /// Called with human-readable status strings
    pub on_status_update: Option<StatusCallback>,
    /// Called for every CPU write into the SRAM range
    pub on_battery_ram_write: Option<BatteryCallback>,
    /// APU output rate in Hz
    pub sample_rate: u32,
    /// Host pacing hint; the core itself never sleeps
    pub preferred_frame_rate: u32,
    /// Whether the APU synthesises samples
    pub emulate_sound: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            on_frame: None,
            on_audio_sample: None,
            on_status_update: None,
            on_battery_ram_write: None,
            sample_rate: 44_100,
            preferred_frame_rate: 60,
            emulate_sound: true,
        }
    }
}

impl ConsoleConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
