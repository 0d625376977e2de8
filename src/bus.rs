// Bus module - CPU memory map, open bus, catch-up drivers and DMA
//
// The bus owns everything the CPU can see: internal RAM, the PPU, the APU,
// the cartridge mapper, the controllers and the Game Genie table. Every
// CPU bus cycle funnels through `cpu_read`/`cpu_write`, which:
//
//   - count the cycle into `instr_bus_cycles` for the instruction in
//     progress,
//   - run the PPU forward (3 dots per counted CPU cycle) before any
//     $2000-$3FFF access, and the APU frame counter before a $4015 read,
//     so mid-instruction reads observe hardware-accurate state,
//   - track the last byte driven on the bus, which is what reads of
//     unmapped or write-only registers return ("open bus").
//
// # CPU memory map
//
// ```text
// $0000-$1FFF  2KB internal RAM, mirrored every $800
// $2000-$3FFF  PPU registers, mirrored every 8
// $4000-$4014  APU registers (write-only; reads are open bus)
// $4015        APU status
// $4016-$4017  controllers (bits 0-4), open bus above
// $4018-$5FFF  open bus on read; expansion writes reach the mapper
// $6000-$7FFF  cartridge SRAM
// $8000-$FFFF  cartridge PRG
// ```

use crate::apu::constants::DMC_FETCH_STALL_CYCLES;
use crate::apu::Apu;
use crate::cartridge::Mapper;
use crate::config::ConsoleConfig;
use crate::genie::GenieCode;
use crate::input::{Controller, Zapper};
use crate::ppu::Ppu;
use std::collections::HashMap;

/// CPU cycles an OAM DMA transfer stalls the CPU
/// (one alignment cycle plus 256 read/write pairs)
pub const OAM_DMA_STALL_CYCLES: u32 = 513;

/// The console's data bus and everything behind it
pub struct Bus {
    /// 2KB internal RAM
    pub(crate) ram: [u8; 0x800],
    pub ppu: Ppu,
    pub apu: Apu,
    pub mapper: Box<dyn Mapper>,
    pub(crate) controllers: [Controller; 2],
    pub(crate) zapper: Zapper,
    /// Host callbacks and options
    pub(crate) config: ConsoleConfig,

    /// Active Game Genie codes, keyed by 15-bit address
    pub(crate) genie_codes: HashMap<u16, GenieCode>,
    /// Whether the substitution hook is consulted
    pub(crate) genie_enabled: bool,

    /// Last byte driven on the CPU data bus
    data_bus: u8,
    /// Bus cycles consumed by the instruction in progress
    instr_bus_cycles: u32,
    /// PPU dots already advanced for this instruction via catch-up
    pub(crate) ppu_catchup_dots: u32,
    /// CPU cycles already fed to the APU frame counter via catch-up
    pub(crate) apu_catchup_cycles: u32,
    /// Dead cycles owed to DMA stalls
    pub(crate) cycles_to_halt: u32,
    /// Cycles to the next DMC fetch, snapshotted at instruction start
    dmc_fetch_snapshot: Option<u32>,
    /// NMI edge latched from the PPU, consumed at instruction boundaries
    pub(crate) nmi_pending: bool,
}

impl Bus {
    /// Build a bus around a cartridge mapper
    pub fn new(mapper: Box<dyn Mapper>, config: ConsoleConfig) -> Self {
        let mut ppu = Ppu::new();
        ppu.mem.set_mirroring(mapper.mirroring());
        let apu = Apu::new(config.sample_rate, config.emulate_sound);
        Bus {
            ram: [0; 0x800],
            ppu,
            apu,
            mapper,
            controllers: [Controller::new(), Controller::new()],
            zapper: Zapper::new(),
            config,
            genie_codes: HashMap::new(),
            genie_enabled: false,
            data_bus: 0,
            instr_bus_cycles: 0,
            ppu_catchup_dots: 0,
            apu_catchup_cycles: 0,
            cycles_to_halt: 0,
            dmc_fetch_snapshot: None,
            nmi_pending: false,
        }
    }

    /// Reset everything except RAM contents
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.mapper.reset();
        self.ppu.mem.set_mirroring(self.mapper.mirroring());
        self.controllers[0].reset();
        self.controllers[1].reset();
        self.data_bus = 0;
        self.instr_bus_cycles = 0;
        self.ppu_catchup_dots = 0;
        self.apu_catchup_cycles = 0;
        self.cycles_to_halt = 0;
        self.dmc_fetch_snapshot = None;
        self.nmi_pending = false;
    }

    // ========================================
    // Instruction bookkeeping
    // ========================================

    /// Called by the CPU before each instruction
    pub fn begin_instruction(&mut self) {
        self.instr_bus_cycles = 0;
        self.dmc_fetch_snapshot = self.apu.cycles_to_next_dmc_fetch();
    }

    /// Bus cycles consumed by the instruction in progress
    pub fn instr_bus_cycles(&self) -> u32 {
        self.instr_bus_cycles
    }

    /// Last byte driven on the data bus
    pub fn data_bus(&self) -> u8 {
        self.data_bus
    }

    /// Whether a DMC fetch lands inside the bus cycles consumed so far
    ///
    /// Used both for the open-bus hijack and the SHx `& (high+1)` drop.
    /// The comparison is instruction-granular, matching the batched
    /// clocking model.
    pub fn dmc_hijacked_this_instruction(&self) -> bool {
        matches!(self.dmc_fetch_snapshot, Some(c) if c < self.instr_bus_cycles)
    }

    // ========================================
    // CPU-visible accessors
    // ========================================

    /// One CPU read cycle
    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        self.instr_bus_cycles += 1;
        let value = self.read_decoded(addr);
        self.data_bus = value;
        value
    }

    /// One CPU write cycle
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        self.instr_bus_cycles += 1;
        self.data_bus = value;
        self.write_decoded(addr, value);
    }

    /// Raw decoded read: no cycle counting, no catch-up
    ///
    /// Used by DMA engines and the reset-vector fetch; register side
    /// effects still apply.
    pub fn load(&mut self, addr: u16) -> u8 {
        let value = self.read_decoded(addr);
        self.data_bus = value;
        value
    }

    fn read_decoded(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => {
                self.catch_up_ppu();
                self.ppu.read_register(addr & 0x0007, self.mapper.as_mut())
            }
            0x4015 => {
                self.catch_up_apu();
                self.apu.read_status(self.data_bus)
            }
            0x4016 => self.controllers[0].read() | (self.data_bus & 0xE0),
            0x4017 => {
                let mut value = self.controllers[1].read();
                if self.zapper.x >= 0
                    && self.zapper.y >= 0
                    && self
                        .ppu
                        .is_pixel_white(self.zapper.x as usize, self.zapper.y as usize)
                {
                    value |= 0x08;
                }
                if self.zapper.trigger {
                    value |= 0x10;
                }
                value | (self.data_bus & 0xE0)
            }
            0x4000..=0x4014 | 0x4018..=0x5FFF => self.open_bus_read(),
            0x6000..=0x7FFF => self.mapper.load(addr),
            0x8000..=0xFFFF => {
                let value = self.mapper.load(addr);
                self.genie_substitute(addr, value)
            }
        }
    }

    fn write_decoded(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => {
                self.catch_up_ppu();
                self.ppu
                    .write_register(addr & 0x0007, value, self.mapper.as_mut());
            }
            0x4014 => {
                self.catch_up_ppu();
                self.oam_dma(value);
            }
            0x4016 => {
                self.controllers[0].write_strobe(value);
                self.controllers[1].write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write_register(addr, value),
            0x4018..=0x5FFF => {
                self.mapper.write(addr, value);
                self.sync_mirroring();
            }
            0x6000..=0x7FFF => {
                self.mapper.write(addr, value);
                self.sync_mirroring();
                if let Some(cb) = self.config.on_battery_ram_write.as_mut() {
                    cb(addr, value);
                }
            }
            0x8000..=0xFFFF => {
                self.mapper.write(addr, value);
                self.sync_mirroring();
            }
        }
    }

    /// Open-bus read, with the DMC DMA hijack
    ///
    /// When a DMC fetch coincides with the read, the fetched byte appears
    /// on the bus instead of the stale open-bus value.
    fn open_bus_read(&mut self) -> u8 {
        if self.dmc_hijacked_this_instruction() {
            return self.mapper.load(self.apu.dmc.current_address());
        }
        self.data_bus
    }

    fn genie_substitute(&self, addr: u16, value: u8) -> u8 {
        if !self.genie_enabled {
            return value;
        }
        match self.genie_codes.get(&(addr & 0x7FFF)) {
            Some(code) => code.apply(value),
            None => value,
        }
    }

    /// Propagate a mapper-driven mirroring change into the PPU
    fn sync_mirroring(&mut self) {
        let mirroring = self.mapper.mirroring();
        if mirroring != self.ppu.mem.mirroring() {
            self.ppu.set_mirroring(mirroring, self.mapper.as_mut());
        }
    }

    // ========================================
    // Catch-up drivers
    // ========================================

    /// Bring the PPU level with the bus cycles consumed so far
    ///
    /// Re-entrant with respect to the frame loop: dots advanced here are
    /// recorded so the loop advances only the remainder.
    fn catch_up_ppu(&mut self) {
        let target = 3 * self.instr_bus_cycles;
        if target > self.ppu_catchup_dots {
            let dots = target - self.ppu_catchup_dots;
            self.ppu_catchup_dots = target;
            self.advance_ppu(dots);
        }
    }

    /// Bring the APU frame counter level with the bus cycles consumed
    ///
    /// Channel timers and the DMC stay untouched; only the sequencer (and
    /// therefore the length counters and IRQ flag a $4015 read reports)
    /// moves.
    fn catch_up_apu(&mut self) {
        let target = self.instr_bus_cycles;
        if target > self.apu_catchup_cycles {
            let cycles = target - self.apu_catchup_cycles;
            self.apu_catchup_cycles = target;
            self.apu.clock_frame_counter(cycles);
        }
    }

    /// Advance the PPU, latching any NMI edge it produces
    pub fn advance_ppu(&mut self, dots: u32) {
        self.ppu.advance(dots, self.mapper.as_mut());
        if self.ppu.take_nmi_request() {
            self.nmi_pending = true;
        }
    }

    /// Consume the latched NMI edge
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    /// Whether any maskable IRQ line (APU frame, DMC, mapper) is low
    pub fn irq_line_active(&self) -> bool {
        self.apu.irq_asserted() || self.mapper.irq_asserted()
    }

    // ========================================
    // DMA
    // ========================================

    /// OAM DMA ($4014): copy a 256-byte page into sprite memory
    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        for i in 0..256u16 {
            let value = self.load(base + i);
            self.ppu.oam_dma_write(value);
        }
        self.cycles_to_halt += OAM_DMA_STALL_CYCLES;
    }

    /// Advance the APU channel timers, servicing DMC sample fetches
    ///
    /// Each fetch is a real bus read: it stalls the CPU four cycles and
    /// leaves the sample byte on the data bus.
    pub fn clock_apu_timers(&mut self, cycles: u32) {
        let apu = &mut self.apu;
        let config = &mut self.config;
        let fetch = apu.clock_channel_timers(cycles, &mut |l, r| {
            if let Some(cb) = config.on_audio_sample.as_mut() {
                cb(l, r);
            }
        });
        if let Some(addr) = fetch {
            let value = self.mapper.load(addr);
            self.apu.finish_dmc_fetch(value);
            self.data_bus = value;
            self.cycles_to_halt += DMC_FETCH_STALL_CYCLES;
        }
    }

    // ========================================
    // Test scaffolding
    // ========================================

    /// A bus around a blank 32KB NROM board with CHR-RAM
    #[cfg(test)]
    pub fn for_tests() -> Bus {
        use crate::cartridge::{create_mapper, Cartridge, Mirroring};
        let cart = Cartridge {
            prg_rom: vec![0; 32 * 1024],
            chr_rom: Vec::new(),
            trainer: None,
            mapper: 0,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        };
        let mapper = create_mapper(cart).expect("NROM");
        Bus::new(mapper, ConsoleConfig::default())
    }

    /// Poke a byte directly into the mapped PRG-ROM
    #[cfg(test)]
    pub fn test_rom_write(&mut self, addr: u16, value: u8) {
        self.mapper.banks_mut().prg_poke(addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_mirroring() {
        let mut bus = Bus::for_tests();
        bus.cpu_write(0x0000, 0x42);
        assert_eq!(bus.cpu_read(0x0800), 0x42);
        assert_eq!(bus.cpu_read(0x1000), 0x42);
        assert_eq!(bus.cpu_read(0x1800), 0x42);

        bus.cpu_write(0x1FFF, 0x24);
        assert_eq!(bus.cpu_read(0x07FF), 0x24);
    }

    #[test]
    fn test_open_bus_returns_last_driven_byte() {
        let mut bus = Bus::for_tests();
        bus.cpu_write(0x0000, 0xAB); // drives the bus
        assert_eq!(bus.cpu_read(0x4000), 0xAB, "write-only APU reg");
        assert_eq!(bus.cpu_read(0x5123), 0xAB, "expansion area");

        // A read drives the bus too.
        bus.cpu_write(0x0010, 0x77);
        let _ = bus.cpu_read(0x0010);
        assert_eq!(bus.cpu_read(0x4018), 0x77);
    }

    #[test]
    fn test_data_bus_invariant_across_access_kinds() {
        let mut bus = Bus::for_tests();
        bus.test_rom_write(0x8000, 0x5A);
        let _ = bus.cpu_read(0x8000);
        assert_eq!(bus.data_bus(), 0x5A, "PRG read drives the bus");

        bus.cpu_write(0x0100, 0x33);
        assert_eq!(bus.data_bus(), 0x33, "write drives the bus");
    }

    #[test]
    fn test_ppu_register_mirroring_every_8() {
        let mut bus = Bus::for_tests();
        bus.cpu_write(0x2003, 0x12); // OAMADDR via the base address
        bus.cpu_write(0x200B, 0x34); // same register, first mirror
        bus.cpu_write(0x2004, 0x56); // OAM write lands at $34
        assert_eq!(bus.ppu.oam[0x34], 0x56);
    }

    #[test]
    fn test_status_read_clears_vblank_through_bus() {
        let mut bus = Bus::for_tests();
        bus.ppu.status_vblank = true;
        let status = bus.cpu_read(0x2002);
        assert_eq!(status & 0x80, 0x80);
        let status = bus.cpu_read(0x2002);
        assert_eq!(status & 0x80, 0, "consumed by the first read");
    }

    #[test]
    fn test_ppu_catchup_advances_three_dots_per_bus_cycle() {
        let mut bus = Bus::for_tests();
        bus.begin_instruction();
        let _ = bus.cpu_read(0x0000); // cycle 1, no catch-up
        let _ = bus.cpu_read(0x2002); // cycle 2, catches up to 6 dots
        assert_eq!(bus.ppu_catchup_dots, 6);
        assert_eq!(bus.ppu.cur_x, 6);
    }

    #[test]
    fn test_apu_catchup_only_on_4015_reads() {
        let mut bus = Bus::for_tests();
        bus.begin_instruction();
        let _ = bus.cpu_read(0x0000);
        assert_eq!(bus.apu_catchup_cycles, 0);
        let _ = bus.cpu_read(0x4015);
        assert_eq!(bus.apu_catchup_cycles, 2);
    }

    #[test]
    fn test_sram_and_battery_callback() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let writes: Rc<RefCell<Vec<(u16, u8)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&writes);

        let mut bus = Bus::for_tests();
        bus.config.on_battery_ram_write = Some(Box::new(move |addr, value| {
            sink.borrow_mut().push((addr, value));
        }));

        bus.cpu_write(0x6000, 0x42);
        assert_eq!(bus.cpu_read(0x6000), 0x42, "SRAM readable back");
        assert_eq!(&*writes.borrow(), &[(0x6000, 0x42)], "exactly one event");

        bus.test_rom_write(0x8000, 0x11);
        bus.cpu_write(0x8000, 0x99);
        assert_eq!(bus.cpu_read(0x8000), 0x11, "ROM unchanged by the write");
        assert_eq!(writes.borrow().len(), 1, "no battery event for ROM");
    }

    #[test]
    fn test_controller_read_has_open_bus_upper_bits() {
        let mut bus = Bus::for_tests();
        bus.controllers[0].set_button(crate::input::Button::A, true);
        bus.cpu_write(0x4016, 1);
        bus.cpu_write(0x4016, 0);
        // The strobe write left $00 on the bus; drive something else.
        bus.cpu_write(0x0000, 0xE0);
        let _ = bus.cpu_read(0x0000);
        let value = bus.cpu_read(0x4016);
        assert_eq!(value & 0x01, 1, "button A");
        assert_eq!(value & 0xE0, 0xE0, "bits 5-7 from open bus");
    }

    #[test]
    fn test_controller_reads_past_eight_return_one() {
        let mut bus = Bus::for_tests();
        bus.cpu_write(0x4016, 1);
        bus.cpu_write(0x4016, 0);
        for _ in 0..8 {
            let _ = bus.cpu_read(0x4016);
        }
        assert_eq!(bus.cpu_read(0x4016) & 0x01, 1);
    }

    #[test]
    fn test_zapper_bits_on_4017() {
        let mut bus = Bus::for_tests();
        bus.zapper.set_trigger(true);
        let value = bus.cpu_read(0x4017);
        assert_eq!(value & 0x10, 0x10, "trigger bit");
        assert_eq!(value & 0x08, 0, "no light on a dark frame");
    }

    #[test]
    fn test_oam_dma_copies_page_and_stalls() {
        let mut bus = Bus::for_tests();
        for i in 0..256u16 {
            bus.cpu_write(0x0300 + i, i as u8);
        }
        bus.cpu_write(0x2003, 0x10); // OAM address, transfers wrap from here
        bus.cpu_write(0x4014, 0x03);

        assert_eq!(bus.cycles_to_halt, OAM_DMA_STALL_CYCLES);
        assert_eq!(bus.ppu.oam[0x10], 0x00, "first byte at the OAM address");
        assert_eq!(bus.ppu.oam[0x0F], 0xFF, "copy wrapped around");
    }

    #[test]
    fn test_genie_substitution_and_disable() {
        let mut bus = Bus::for_tests();
        bus.test_rom_write(0x91D9, 0x60);

        let code = GenieCode::parse("SXIOPO").expect("valid");
        bus.genie_codes.insert(code.addr(), code);
        bus.genie_enabled = true;
        assert_eq!(bus.cpu_read(0x91D9), 0xAD, "substituted on read");

        bus.genie_enabled = false;
        assert_eq!(bus.cpu_read(0x91D9), 0x60, "original restored");
    }

    #[test]
    fn test_dmc_hijack_overrides_open_bus() {
        let mut bus = Bus::for_tests();
        bus.test_rom_write(0xC000, 0x7E);
        // Start DMC playback so a fetch is imminent.
        bus.cpu_write(0x4012, 0x00);
        bus.cpu_write(0x4013, 0x01);
        bus.cpu_write(0x4015, 0x10);

        bus.begin_instruction();
        // Burn enough bus cycles that the imminent fetch (snapshot 0)
        // falls inside the instruction.
        let _ = bus.cpu_read(0x0000);
        let _ = bus.cpu_read(0x0000);
        let value = bus.cpu_read(0x4000);
        assert_eq!(value, 0x7E, "fetched sample byte hijacks the bus");
    }

    #[test]
    fn test_dmc_fetch_stalls_and_drives_bus() {
        let mut bus = Bus::for_tests();
        bus.test_rom_write(0xC000, 0x3C);
        bus.cpu_write(0x4012, 0x00);
        bus.cpu_write(0x4013, 0x01);
        bus.cpu_write(0x4015, 0x10);

        bus.clock_apu_timers(1);
        assert_eq!(bus.cycles_to_halt, DMC_FETCH_STALL_CYCLES);
        assert_eq!(bus.data_bus(), 0x3C);
    }

    #[test]
    fn test_reset_preserves_ram() {
        let mut bus = Bus::for_tests();
        bus.cpu_write(0x0123, 0x42);
        bus.reset();
        assert_eq!(bus.cpu_read(0x0123), 0x42);
    }
}
