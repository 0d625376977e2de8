// Console module - the owning value and the per-frame execution loop
//
// A `Console` owns the CPU and the bus (which owns everything else) and
// drives them in lockstep, one video frame per `frame()` call:
//
//   1. Paint the backdrop.
//   2. While the frame has not ended:
//      a. If the CPU owes DMA stall cycles, burn up to 8 of them, feeding
//         the APU and advancing the PPU three dots per cycle.
//      b. Otherwise run one instruction. The APU frame counter gets the
//         cycles not already fed by mid-instruction catch-up; the channel
//         timers get them all; the PPU gets three dots per cycle minus
//         the dots catch-up already advanced.
//      c. Break as soon as the PPU reports the frame over (this can
//         happen inside an instruction via catch-up).
//      d. Sample the interrupt lines for the next instruction.
//   3. Hand the framebuffer to the host.
//
// A CPU fault (halting opcode) aborts the frame and latches a crash flag;
// further `frame()` calls fail until `reset()` or a new ROM.

use crate::bus::Bus;
use crate::cartridge::{create_mapper, mappers, Cartridge, INesError, MapperError};
use crate::config::ConsoleConfig;
use crate::cpu::{Cpu, CpuError, Interrupt};
use crate::genie::{GenieCode, GenieError};
use crate::input::Button;
use crate::save_state::{CpuState, MmapState, SaveState, SaveStateError};
use std::fmt;
use std::time::Instant;

/// Cycles of owed DMA stall consumed per loop iteration
const HALT_BATCH_CYCLES: u32 = 8;

/// Errors surfaced by the console API
#[derive(Debug)]
pub enum ConsoleError {
    /// `frame()` before a ROM was loaded
    NoCartridge,
    /// The CPU faulted earlier; reset or load a ROM to recover
    Crashed,
    /// The CPU faulted now
    Cpu(CpuError),
    /// ROM image rejected
    Rom(INesError),
    /// Mapper unsupported or misconfigured
    Mapper(MapperError),
    /// Game Genie code rejected
    Genie(GenieError),
    /// Save state rejected
    SaveState(SaveStateError),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::NoCartridge => write!(f, "no cartridge loaded"),
            ConsoleError::Crashed => write!(f, "console crashed; reset to continue"),
            ConsoleError::Cpu(e) => write!(f, "{}", e),
            ConsoleError::Rom(e) => write!(f, "{}", e),
            ConsoleError::Mapper(e) => write!(f, "{}", e),
            ConsoleError::Genie(e) => write!(f, "{}", e),
            ConsoleError::SaveState(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<INesError> for ConsoleError {
    fn from(e: INesError) -> Self {
        ConsoleError::Rom(e)
    }
}

impl From<MapperError> for ConsoleError {
    fn from(e: MapperError) -> Self {
        ConsoleError::Mapper(e)
    }
}

impl From<GenieError> for ConsoleError {
    fn from(e: GenieError) -> Self {
        ConsoleError::Genie(e)
    }
}

impl From<SaveStateError> for ConsoleError {
    fn from(e: SaveStateError) -> Self {
        ConsoleError::SaveState(e)
    }
}

/// The console: CPU + bus, driven one frame at a time
pub struct Console {
    pub cpu: Cpu,
    pub bus: Bus,
    rom_loaded: bool,
    crashed: bool,
    /// Wall-clock instant of the previous completed frame
    last_frame_at: Option<Instant>,
    /// Frames per second over the last frame interval
    fps: f64,
}

impl Console {
    /// Create a console; no cartridge is present until [`Self::load_rom`]
    pub fn new(config: ConsoleConfig) -> Self {
        Console {
            cpu: Cpu::new(),
            bus: Bus::new(mappers::blank_board(), config),
            rom_loaded: false,
            crashed: false,
            last_frame_at: None,
            fps: 0.0,
        }
    }

    // ========================================
    // Cartridge handling
    // ========================================

    /// Load an iNES image and cold-boot it
    ///
    /// # Errors
    /// [`ConsoleError::Rom`] for malformed images,
    /// [`ConsoleError::Mapper`] for unsupported boards.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), ConsoleError> {
        let cart = Cartridge::from_ines(data)?;
        let mapper_number = cart.mapper;
        let mapper = create_mapper(cart)?;

        let config = std::mem::take(&mut self.bus.config);
        self.bus = Bus::new(mapper, config);
        self.cpu = Cpu::new();
        self.cpu.reset(&mut self.bus);
        self.rom_loaded = true;
        self.crashed = false;
        self.last_frame_at = None;
        self.fps = 0.0;

        log::info!("ROM loaded, mapper {}", mapper_number);
        self.status_update(&format!("ROM loaded (mapper {})", mapper_number));
        Ok(())
    }

    /// Reset the console; RAM contents survive, the crash flag clears
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.crashed = false;
        self.status_update("Reset");
    }

    // ========================================
    // Frame loop
    // ========================================

    /// Run one video frame
    ///
    /// # Errors
    /// [`ConsoleError::NoCartridge`] before a ROM is loaded,
    /// [`ConsoleError::Crashed`] after an earlier fault,
    /// [`ConsoleError::Cpu`] when the CPU faults now.
    pub fn frame(&mut self) -> Result<(), ConsoleError> {
        if !self.rom_loaded {
            return Err(ConsoleError::NoCartridge);
        }
        if self.crashed {
            return Err(ConsoleError::Crashed);
        }

        self.bus.ppu.start_frame();
        loop {
            if self.bus.cycles_to_halt > 0 {
                // Burn owed DMA cycles in small batches so the APU and
                // PPU stay in step with the stalled CPU.
                let cycles = self.bus.cycles_to_halt.min(HALT_BATCH_CYCLES);
                self.bus.cycles_to_halt -= cycles;
                self.bus.apu.clock_frame_counter(cycles);
                self.bus.clock_apu_timers(cycles);
                self.bus.advance_ppu(3 * cycles);
                if self.bus.ppu.take_frame_ended() {
                    break;
                }
                self.poll_interrupts();
                continue;
            }

            let cycles = match self.cpu.emulate(&mut self.bus) {
                Ok(cycles) => cycles,
                Err(e) => {
                    self.crashed = true;
                    log::warn!("CPU fault: {}", e);
                    self.status_update(&format!("CPU fault: {}", e));
                    return Err(ConsoleError::Cpu(e));
                }
            };

            // The frame counter already received the catch-up cycles; the
            // channel timers get the full instruction.
            let sequencer_cycles = cycles.saturating_sub(self.bus.apu_catchup_cycles);
            self.bus.apu.clock_frame_counter(sequencer_cycles);
            self.bus.clock_apu_timers(cycles);

            let dots = (3 * cycles).saturating_sub(self.bus.ppu_catchup_dots);
            self.bus.ppu_catchup_dots = 0;
            self.bus.apu_catchup_cycles = 0;

            // VBlank may have fired during catch-up inside the instruction.
            if self.bus.ppu.take_frame_ended() {
                break;
            }
            self.bus.advance_ppu(dots);
            if self.bus.ppu.take_frame_ended() {
                break;
            }
            self.poll_interrupts();
        }

        // Deliver the VBlank NMI for the next frame's first instruction.
        self.poll_interrupts();

        let Bus { ppu, config, .. } = &mut self.bus;
        if let Some(cb) = config.on_frame.as_mut() {
            cb(ppu.frame_buffer());
        }
        self.update_fps();
        Ok(())
    }

    /// Sample the interrupt lines into the CPU's pending record
    fn poll_interrupts(&mut self) {
        if self.bus.take_nmi() {
            self.cpu.request_irq(Interrupt::Nmi);
        }
        if self.bus.irq_line_active() {
            self.cpu.request_irq(Interrupt::Normal);
        }
    }

    fn update_fps(&mut self) {
        let now = Instant::now();
        if let Some(prev) = self.last_frame_at {
            let dt = now.duration_since(prev).as_secs_f64();
            if dt > 0.0 {
                self.fps = 1.0 / dt;
            }
        }
        self.last_frame_at = Some(now);
    }

    /// Frames per second over the last frame interval
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Whether the console is in the crashed state
    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// The 256x240 framebuffer of the last completed frame
    pub fn frame_buffer(&self) -> &[u32] {
        self.bus.ppu.frame_buffer()
    }

    fn status_update(&mut self, message: &str) {
        if let Some(cb) = self.bus.config.on_status_update.as_mut() {
            cb(message);
        }
    }

    // ========================================
    // Input
    // ========================================

    /// Press a button on controller 0 or 1
    pub fn button_down(&mut self, controller: usize, button: Button) {
        if let Some(c) = self.bus.controllers.get_mut(controller) {
            c.set_button(button, true);
        }
    }

    /// Release a button on controller 0 or 1
    pub fn button_up(&mut self, controller: usize, button: Button) {
        if let Some(c) = self.bus.controllers.get_mut(controller) {
            c.set_button(button, false);
        }
    }

    /// Aim the light gun at a framebuffer position
    pub fn zapper_move(&mut self, x: i32, y: i32) {
        self.bus.zapper.set_position(x, y);
    }

    pub fn zapper_fire_down(&mut self) {
        self.bus.zapper.set_trigger(true);
    }

    pub fn zapper_fire_up(&mut self) {
        self.bus.zapper.set_trigger(false);
    }

    // ========================================
    // Game Genie
    // ========================================

    /// Add a code and enable the substitution hook
    pub fn add_genie_code(&mut self, code: &str) -> Result<(), ConsoleError> {
        let code = GenieCode::parse(code)?;
        self.bus.genie_codes.insert(code.addr(), code);
        self.bus.genie_enabled = true;
        Ok(())
    }

    /// Remove one code by its letters
    pub fn remove_genie_code(&mut self, code: &str) {
        let upper = code.to_ascii_uppercase();
        self.bus.genie_codes.retain(|_, c| c.code() != upper);
    }

    /// Drop all codes
    pub fn clear_genie_codes(&mut self) {
        self.bus.genie_codes.clear();
    }

    /// Toggle the substitution hook without touching the code table
    pub fn set_genie_enabled(&mut self, enabled: bool) {
        self.bus.genie_enabled = enabled;
    }

    // ========================================
    // Battery RAM
    // ========================================

    /// Battery-backed SRAM contents, if the board has a battery
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.bus.mapper.banks().battery_ram()
    }

    /// Restore battery-backed SRAM (typically right after `load_rom`)
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.bus.mapper.banks_mut().load_battery_ram(data);
    }

    // ========================================
    // Save states
    // ========================================

    /// Capture the complete console state
    pub fn save_state(&self) -> SaveState {
        SaveState::stamp(
            CpuState {
                mem: self.bus.ram.to_vec(),
                a: self.cpu.a,
                x: self.cpu.x,
                y: self.cpu.y,
                sp: self.cpu.sp,
                pc: self.cpu.pc,
                status: self.cpu.status,
                cycles: self.cpu.cycles,
                data_bus: self.bus.data_bus(),
                cycles_to_halt: self.bus.cycles_to_halt,
                irq: self.cpu.irq,
            },
            self.bus.ppu.capture(),
            self.bus.apu.capture(),
            MmapState {
                mapper: self.bus.mapper.save(),
                controllers: self.bus.controllers.clone(),
                zapper: self.bus.zapper.clone(),
            },
        )
    }

    /// Restore a previously captured state
    ///
    /// # Errors
    /// [`ConsoleError::SaveState`] / [`ConsoleError::Mapper`] on a
    /// structural mismatch; the console is left unchanged in that case.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), ConsoleError> {
        if state.version != crate::save_state::SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                expected: crate::save_state::SAVE_STATE_VERSION,
                found: state.version,
            }
            .into());
        }
        if state.cpu.mem.len() != self.bus.ram.len() {
            return Err(SaveStateError::Structural(format!(
                "RAM size {} does not match",
                state.cpu.mem.len()
            ))
            .into());
        }
        // The mapper restore carries the board check; run it first so a
        // mismatched state leaves the console untouched.
        self.bus.mapper.restore(&state.mmap.mapper)?;

        self.bus.ram.copy_from_slice(&state.cpu.mem);
        self.cpu.a = state.cpu.a;
        self.cpu.x = state.cpu.x;
        self.cpu.y = state.cpu.y;
        self.cpu.sp = state.cpu.sp;
        self.cpu.pc = state.cpu.pc;
        self.cpu.status = state.cpu.status;
        self.cpu.cycles = state.cpu.cycles;
        self.cpu.irq = state.cpu.irq;
        self.bus.cycles_to_halt = state.cpu.cycles_to_halt;

        // Mirroring must be in place before the PPU rebuilds its
        // nametable caches from the restored VRAM.
        self.bus.ppu.mem.set_mirroring(self.bus.mapper.mirroring());
        self.bus.ppu.restore(&state.ppu);
        self.bus.apu.restore(&state.papu);
        self.bus.controllers = state.mmap.controllers.clone();
        self.bus.zapper = state.mmap.zapper.clone();
        self.crashed = false;
        Ok(())
    }

    /// Serialise the console state to JSON
    pub fn to_json(&self) -> Result<String, ConsoleError> {
        Ok(self.save_state().to_json()?)
    }

    /// Restore console state from JSON
    pub fn from_json(&mut self, json: &str) -> Result<(), ConsoleError> {
        let state = SaveState::from_json(json)?;
        self.load_state(&state)
    }
}
