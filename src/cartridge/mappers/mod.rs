// Mappers module - cartridge bank-switching boards
//
// Each mapper is a struct over a shared [`Banks`] core that owns the PRG-ROM,
// CHR memory (with its decoded tile view), and SRAM, plus movable bank
// windows. The [`Mapper`] trait is the small dispatch surface the bus and
// PPU talk to; everything the boards have in common (window arithmetic,
// SRAM, tile decoding, state capture) lives in `Banks`, not in a base class.
//
// # Window model
//
// The CPU side exposes four 8KB windows at $8000/$A000/$C000/$E000; the PPU
// side exposes eight 1KB windows at $0000-$1FFF. Every board's banking
// granularity (32/16/8KB PRG, 8/4/2/1KB CHR) is expressed by pointing
// several windows at once, so reads are a single table lookup no matter the
// board.

mod mapper0;
mod mapper1;
mod mapper11;
mod mapper2;
mod mapper3;
mod mapper34;
mod mapper38;
mod mapper4;
mod mapper5;
mod mapper66;
mod mapper7;
mod mapper94;
mod mapper140;
mod mapper180;
mod mapper240;
mod mapper241;

use super::{Cartridge, Mirroring};
use crate::ppu::tile::Tile;
use serde::{Deserialize, Serialize};

use mapper0::Mapper0;
use mapper1::Mapper1;
use mapper11::Mapper11;
use mapper140::Mapper140;
use mapper180::Mapper180;
use mapper2::Mapper2;
use mapper240::Mapper240;
use mapper241::Mapper241;
use mapper3::Mapper3;
use mapper34::Mapper34;
use mapper38::Mapper38;
use mapper4::Mapper4;
use mapper5::Mapper5;
use mapper66::Mapper66;
use mapper7::Mapper7;
use mapper94::Mapper94;

/// CPU-side window size (8KB)
pub const PRG_WINDOW: usize = 8 * 1024;

/// PPU-side window size (1KB)
pub const CHR_WINDOW: usize = 1024;

/// SRAM size at $6000-$7FFF
pub const SRAM_SIZE: usize = 8 * 1024;

/// CHR-RAM size fitted when the image carries no CHR-ROM
pub const CHR_RAM_SIZE: usize = 8 * 1024;

/// Error type for mapper creation and state restore
#[derive(Debug)]
pub enum MapperError {
    /// The requested mapper number is not supported
    UnsupportedMapper(u8),
    /// A restored state does not match the loaded board
    StateMismatch {
        /// Mapper number of the loaded board
        expected: u8,
        /// Mapper number carried by the state
        found: u8,
    },
    /// Invalid cartridge configuration for the mapper
    InvalidConfiguration(String),
}

impl std::fmt::Display for MapperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapperError::UnsupportedMapper(num) => {
                write!(f, "Mapper {} is not supported", num)
            }
            MapperError::StateMismatch { expected, found } => {
                write!(
                    f,
                    "save state is for mapper {}, loaded board is mapper {}",
                    found, expected
                )
            }
            MapperError::InvalidConfiguration(msg) => {
                write!(f, "Invalid mapper configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for MapperError {}

/// Snapshot of a mapper's mutable state
///
/// `regs` carries the board-specific registers in an order each mapper
/// defines for itself; everything else is common to all boards. Byte
/// storage round-trips as plain integer sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperState {
    /// Mapper number, checked on restore
    pub mapper: u8,
    /// Board-specific register file
    pub regs: Vec<u32>,
    /// CPU-side 8KB window offsets
    pub prg_window: Vec<usize>,
    /// PPU-side 1KB window offsets
    pub chr_window: Vec<usize>,
    /// SRAM contents
    pub sram: Vec<u8>,
    /// CHR-RAM contents, present only on CHR-RAM boards
    pub chr_ram: Option<Vec<u8>>,
    /// Current nametable mirroring
    pub mirroring: Mirroring,
}

/// Shared banking core owned by every mapper
pub struct Banks {
    /// PRG-ROM data
    prg_rom: Vec<u8>,
    /// CHR-ROM or CHR-RAM data
    chr: Vec<u8>,
    /// Whether CHR memory is writable
    chr_is_ram: bool,
    /// Decoded tile view of `chr`, one tile per 16 bytes
    tiles: Vec<Tile>,
    /// 8KB SRAM at $6000-$7FFF
    sram: Vec<u8>,
    /// Battery-backed SRAM flag from the header
    has_battery: bool,
    /// Four 8KB CPU windows at $8000/$A000/$C000/$E000
    prg_window: [usize; 4],
    /// Eight 1KB PPU windows at $0000-$1FFF
    chr_window: [usize; 8],
    /// Current nametable mirroring
    mirroring: Mirroring,
}

impl Banks {
    /// Build the banking core from a parsed cartridge
    pub fn new(cart: Cartridge) -> Self {
        let chr_is_ram = cart.has_chr_ram();
        let chr = if chr_is_ram {
            vec![0u8; CHR_RAM_SIZE]
        } else {
            cart.chr_rom
        };

        let mut tiles = vec![Tile::new(); chr.len() / 16];
        for (i, tile) in tiles.iter_mut().enumerate() {
            tile.set_data(&chr[i * 16..i * 16 + 16]);
        }

        let mut banks = Banks {
            prg_rom: cart.prg_rom,
            chr,
            chr_is_ram,
            tiles,
            sram: vec![0u8; SRAM_SIZE],
            has_battery: cart.has_battery,
            prg_window: [0; 4],
            chr_window: [0; 8],
            mirroring: cart.mirroring,
        };
        // Power-on default: first PRG bank low, last PRG bank high, CHR flat.
        let last = banks.prg_bank_count_16k().saturating_sub(1);
        banks.map_prg_16k(0, 0);
        banks.map_prg_16k(1, last);
        banks.map_chr_8k(0);
        banks
    }

    /// Number of 16KB PRG banks
    pub fn prg_bank_count_16k(&self) -> usize {
        self.prg_rom.len() / (2 * PRG_WINDOW)
    }

    /// Number of 32KB PRG banks
    pub fn prg_bank_count_32k(&self) -> usize {
        (self.prg_rom.len() / (4 * PRG_WINDOW)).max(1)
    }

    /// Number of 8KB PRG banks
    pub fn prg_bank_count_8k(&self) -> usize {
        self.prg_rom.len() / PRG_WINDOW
    }

    /// Number of 8KB CHR banks
    pub fn chr_bank_count_8k(&self) -> usize {
        (self.chr.len() / (8 * CHR_WINDOW)).max(1)
    }

    /// Number of 4KB CHR banks
    pub fn chr_bank_count_4k(&self) -> usize {
        (self.chr.len() / (4 * CHR_WINDOW)).max(1)
    }

    /// Number of 1KB CHR banks
    pub fn chr_bank_count_1k(&self) -> usize {
        (self.chr.len() / CHR_WINDOW).max(1)
    }

    // ----- PRG window plumbing -----

    /// Point one 8KB window (slot 0-3) at an 8KB bank
    pub fn map_prg_8k(&mut self, slot: usize, bank: usize) {
        let count = self.prg_bank_count_8k().max(1);
        self.prg_window[slot] = (bank % count) * PRG_WINDOW;
    }

    /// Point a 16KB half (slot 0 = $8000, 1 = $C000) at a 16KB bank
    pub fn map_prg_16k(&mut self, slot: usize, bank: usize) {
        let count = self.prg_bank_count_16k().max(1);
        let base = (bank % count) * 2 * PRG_WINDOW;
        self.prg_window[slot * 2] = base;
        self.prg_window[slot * 2 + 1] = base + PRG_WINDOW;
    }

    /// Point the whole $8000-$FFFF range at a 32KB bank
    pub fn map_prg_32k(&mut self, bank: usize) {
        let count = self.prg_bank_count_32k();
        let base = (bank % count) * 4 * PRG_WINDOW;
        for (i, w) in self.prg_window.iter_mut().enumerate() {
            *w = base + i * PRG_WINDOW;
        }
    }

    /// Read through the CPU windows; `addr` must be in $8000-$FFFF
    #[inline]
    pub fn prg_read(&self, addr: u16) -> u8 {
        let offset = addr as usize - 0x8000;
        let window = offset / PRG_WINDOW;
        self.prg_rom[self.prg_window[window] + (offset % PRG_WINDOW)]
    }

    // ----- CHR window plumbing -----

    /// Point one 1KB window (slot 0-7) at a 1KB bank
    pub fn map_chr_1k(&mut self, slot: usize, bank: usize) {
        let count = self.chr_bank_count_1k();
        self.chr_window[slot] = (bank % count) * CHR_WINDOW;
    }

    /// Point a 2KB pair (slot 0-3) at a 2KB bank
    pub fn map_chr_2k(&mut self, slot: usize, bank: usize) {
        let count = (self.chr.len() / (2 * CHR_WINDOW)).max(1);
        let base = (bank % count) * 2 * CHR_WINDOW;
        self.chr_window[slot * 2] = base;
        self.chr_window[slot * 2 + 1] = base + CHR_WINDOW;
    }

    /// Point a 4KB half (slot 0 = $0000, 1 = $1000) at a 4KB bank
    pub fn map_chr_4k(&mut self, slot: usize, bank: usize) {
        let count = self.chr_bank_count_4k();
        let base = (bank % count) * 4 * CHR_WINDOW;
        for i in 0..4 {
            self.chr_window[slot * 4 + i] = base + i * CHR_WINDOW;
        }
    }

    /// Point the whole pattern space at an 8KB bank
    pub fn map_chr_8k(&mut self, bank: usize) {
        let count = self.chr_bank_count_8k();
        let base = (bank % count) * 8 * CHR_WINDOW;
        for (i, w) in self.chr_window.iter_mut().enumerate() {
            *w = base + i * CHR_WINDOW;
        }
    }

    /// Translate a PPU pattern address ($0000-$1FFF) to a physical offset
    #[inline]
    fn chr_offset(&self, addr: u16) -> usize {
        let offset = (addr as usize) & 0x1FFF;
        self.chr_window[offset / CHR_WINDOW] + (offset % CHR_WINDOW)
    }

    /// Read pattern memory through the CHR windows
    #[inline]
    pub fn chr_read(&self, addr: u16) -> u8 {
        self.chr[self.chr_offset(addr)]
    }

    /// Write pattern memory; ignored on CHR-ROM boards
    ///
    /// On CHR-RAM boards the decoded tile covering the byte is rebuilt so
    /// the renderer never sees stale pixels.
    pub fn chr_write(&mut self, addr: u16, data: u8) {
        if !self.chr_is_ram {
            return;
        }
        let offset = self.chr_offset(addr);
        self.chr[offset] = data;
        let tile_index = offset / 16;
        let tile_base = tile_index * 16;
        let row = offset % 8;
        self.tiles[tile_index].set_scanline(
            row,
            self.chr[tile_base + row],
            self.chr[tile_base + row + 8],
        );
    }

    /// Decoded tile for pattern-space tile index 0-511
    ///
    /// Index 0-255 covers pattern table 0, 256-511 pattern table 1, after
    /// window translation.
    #[inline]
    pub fn pattern_tile(&self, index: usize) -> &Tile {
        let addr = (index as u16) << 4;
        let offset = self.chr_offset(addr);
        &self.tiles[offset / 16]
    }

    // ----- SRAM -----

    /// Read SRAM; `addr` must be in $6000-$7FFF
    #[inline]
    pub fn sram_read(&self, addr: u16) -> u8 {
        self.sram[(addr as usize - 0x6000) % SRAM_SIZE]
    }

    /// Write SRAM
    #[inline]
    pub fn sram_write(&mut self, addr: u16, data: u8) {
        self.sram[(addr as usize - 0x6000) % SRAM_SIZE] = data;
    }

    /// Battery-backed SRAM contents, if the board has a battery
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery {
            Some(&self.sram)
        } else {
            None
        }
    }

    /// Replace SRAM contents (battery restore)
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.sram.len());
        self.sram[..len].copy_from_slice(&data[..len]);
    }

    /// Current nametable mirroring
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Change nametable mirroring (boards with mirroring control)
    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
    }

    /// Poke a byte through the CPU windows into the backing PRG-ROM
    #[cfg(test)]
    pub fn prg_poke(&mut self, addr: u16, value: u8) {
        let offset = addr as usize - 0x8000;
        let window = offset / PRG_WINDOW;
        let index = self.prg_window[window] + (offset % PRG_WINDOW);
        self.prg_rom[index] = value;
    }

    /// Common part of a state snapshot
    pub fn save(&self, mapper: u8, regs: Vec<u32>) -> MapperState {
        MapperState {
            mapper,
            regs,
            prg_window: self.prg_window.to_vec(),
            chr_window: self.chr_window.to_vec(),
            sram: self.sram.clone(),
            chr_ram: if self.chr_is_ram {
                Some(self.chr.clone())
            } else {
                None
            },
            mirroring: self.mirroring,
        }
    }

    /// Common part of a state restore; tile cache is rebuilt for CHR-RAM
    pub fn restore(&mut self, mapper: u8, state: &MapperState) -> Result<(), MapperError> {
        if state.mapper != mapper {
            return Err(MapperError::StateMismatch {
                expected: mapper,
                found: state.mapper,
            });
        }
        if state.prg_window.len() != 4 || state.chr_window.len() != 8 {
            return Err(MapperError::InvalidConfiguration(
                "bank window count mismatch".into(),
            ));
        }
        for (i, &w) in state.prg_window.iter().enumerate() {
            if w + PRG_WINDOW > self.prg_rom.len() {
                return Err(MapperError::InvalidConfiguration(
                    "PRG window out of range".into(),
                ));
            }
            self.prg_window[i] = w;
        }
        for (i, &w) in state.chr_window.iter().enumerate() {
            if w + CHR_WINDOW > self.chr.len() {
                return Err(MapperError::InvalidConfiguration(
                    "CHR window out of range".into(),
                ));
            }
            self.chr_window[i] = w;
        }
        self.load_battery_ram(&state.sram);
        if let Some(chr_ram) = &state.chr_ram {
            if self.chr_is_ram && chr_ram.len() == self.chr.len() {
                self.chr.copy_from_slice(chr_ram);
                for (i, tile) in self.tiles.iter_mut().enumerate() {
                    tile.set_data(&self.chr[i * 16..i * 16 + 16]);
                }
            }
        }
        self.mirroring = state.mirroring;
        Ok(())
    }
}

/// The dispatch surface a cartridge board exposes to the bus and PPU
///
/// Address decoding for RAM, PPU registers and controllers lives on the bus;
/// a mapper only sees the cartridge range ($6000-$FFFF on the CPU side,
/// $0000-$1FFF on the PPU side) plus any low writes its board snoops.
pub trait Mapper {
    /// CPU read in $6000-$FFFF
    fn load(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.banks().sram_read(addr),
            0x8000..=0xFFFF => self.banks().prg_read(addr),
            _ => 0,
        }
    }

    /// CPU write in $4020-$FFFF (bank switching, SRAM)
    fn write(&mut self, addr: u16, data: u8);

    /// PPU pattern read in $0000-$1FFF
    fn chr_load(&mut self, addr: u16) -> u8 {
        self.banks().chr_read(addr)
    }

    /// PPU pattern write in $0000-$1FFF (CHR-RAM only)
    fn chr_write(&mut self, addr: u16, data: u8) {
        self.banks_mut().chr_write(addr, data);
    }

    /// Decoded tile for pattern-space tile index 0-511
    fn pattern_tile(&self, index: usize) -> &Tile {
        self.banks().pattern_tile(index)
    }

    /// Current nametable mirroring
    fn mirroring(&self) -> Mirroring {
        self.banks().mirroring()
    }

    /// Scanline IRQ clock, driven by the PPU at the rendering boundary
    fn clock_irq_counter(&mut self) {}

    /// Whether the board is holding its IRQ line low
    fn irq_asserted(&self) -> bool {
        false
    }

    /// Pattern-fetch latch hook (MMC2-style boards); default is a no-op
    fn latch_access(&mut self, _addr: u16) {}

    /// Reset board registers to their power-on state
    fn reset(&mut self);

    /// Snapshot mutable state
    fn save(&self) -> MapperState;

    /// Restore a snapshot taken from the same board
    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError>;

    /// Shared banking core
    fn banks(&self) -> &Banks;

    /// Shared banking core, mutable
    fn banks_mut(&mut self) -> &mut Banks;
}

/// An empty NROM board, mounted by the console before a cartridge loads
///
/// Unlike [`create_mapper`] this cannot fail: the board is mapper 0 with
/// blank 32KB PRG and CHR-RAM.
pub(crate) fn blank_board() -> Box<dyn Mapper> {
    Box::new(Mapper0::new(Cartridge {
        prg_rom: vec![0; 32 * 1024],
        chr_rom: Vec::new(),
        trainer: None,
        mapper: 0,
        mirroring: Mirroring::Horizontal,
        has_battery: false,
    }))
}

/// Create the board implementation for a cartridge
///
/// # Errors
/// Returns [`MapperError::UnsupportedMapper`] for mapper numbers outside the
/// supported set.
pub fn create_mapper(cart: Cartridge) -> Result<Box<dyn Mapper>, MapperError> {
    let number = cart.mapper;
    let mapper: Box<dyn Mapper> = match number {
        0 => Box::new(Mapper0::new(cart)),
        1 => Box::new(Mapper1::new(cart)),
        2 => Box::new(Mapper2::new(cart)),
        3 => Box::new(Mapper3::new(cart)),
        4 => Box::new(Mapper4::new(cart)),
        5 => Box::new(Mapper5::new(cart)),
        7 => Box::new(Mapper7::new(cart)),
        11 => Box::new(Mapper11::new(cart)),
        34 => Box::new(Mapper34::new(cart)),
        38 => Box::new(Mapper38::new(cart)),
        66 => Box::new(Mapper66::new(cart)),
        94 => Box::new(Mapper94::new(cart)),
        140 => Box::new(Mapper140::new(cart)),
        180 => Box::new(Mapper180::new(cart)),
        240 => Box::new(Mapper240::new(cart)),
        241 => Box::new(Mapper241::new(cart)),
        _ => return Err(MapperError::UnsupportedMapper(number)),
    };
    log::debug!("created mapper {}", number);
    Ok(mapper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cart(prg_16k: usize, chr_8k: usize, mapper: u8) -> Cartridge {
        let mut prg_rom = vec![0u8; prg_16k * 16 * 1024];
        // Tag each 16KB bank with its index for banking tests.
        for (bank, chunk) in prg_rom.chunks_mut(16 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr_rom = vec![0u8; chr_8k * 8 * 1024];
        for (bank, chunk) in chr_rom.chunks_mut(8 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        }
    }

    #[test]
    fn test_default_windows() {
        let banks = Banks::new(test_cart(4, 1, 0));
        assert_eq!(banks.prg_read(0x8000), 0, "first bank low");
        assert_eq!(banks.prg_read(0xC000), 3, "last bank high");
    }

    #[test]
    fn test_prg_16k_mapping() {
        let mut banks = Banks::new(test_cart(4, 1, 0));
        banks.map_prg_16k(0, 2);
        assert_eq!(banks.prg_read(0x8000), 2);
        assert_eq!(banks.prg_read(0xBFFF), 2);
        assert_eq!(banks.prg_read(0xC000), 3, "high half untouched");
    }

    #[test]
    fn test_prg_bank_wraps() {
        let mut banks = Banks::new(test_cart(2, 1, 0));
        banks.map_prg_16k(0, 5); // 5 % 2 == 1
        assert_eq!(banks.prg_read(0x8000), 1);
    }

    #[test]
    fn test_chr_4k_mapping() {
        let mut banks = Banks::new(test_cart(1, 2, 0));
        banks.map_chr_4k(0, 3); // second half of 8KB bank 1
        assert_eq!(banks.chr_read(0x0000), 1);
        assert_eq!(banks.chr_read(0x1000), 0, "other half untouched");
    }

    #[test]
    fn test_chr_ram_write_rebuilds_tile() {
        let cart = Cartridge {
            chr_rom: Vec::new(),
            ..test_cart(1, 0, 0)
        };
        let mut banks = Banks::new(cart);
        banks.chr_write(0x0000, 0x80); // tile 0, row 0, plane 0
        assert_eq!(banks.chr_read(0x0000), 0x80);
        assert_eq!(banks.pattern_tile(0).pixels[0], 1, "tile re-decoded");
    }

    #[test]
    fn test_chr_rom_write_ignored() {
        let mut banks = Banks::new(test_cart(1, 1, 0));
        let before = banks.chr_read(0x0000);
        banks.chr_write(0x0000, 0xFF);
        assert_eq!(banks.chr_read(0x0000), before);
    }

    #[test]
    fn test_sram_round_trip() {
        let mut banks = Banks::new(test_cart(1, 1, 0));
        banks.sram_write(0x6000, 0x42);
        banks.sram_write(0x7FFF, 0x99);
        assert_eq!(banks.sram_read(0x6000), 0x42);
        assert_eq!(banks.sram_read(0x7FFF), 0x99);
    }

    #[test]
    fn test_battery_ram_gated_by_header() {
        let banks = Banks::new(test_cart(1, 1, 0));
        assert!(banks.battery_ram().is_none());

        let cart = Cartridge {
            has_battery: true,
            ..test_cart(1, 1, 0)
        };
        let banks = Banks::new(cart);
        assert!(banks.battery_ram().is_some());
    }

    #[test]
    fn test_unsupported_mapper() {
        let cart = test_cart(1, 1, 99);
        assert!(matches!(
            create_mapper(cart),
            Err(MapperError::UnsupportedMapper(99))
        ));
    }

    #[test]
    fn test_state_mismatch_rejected() {
        let mut m0 = create_mapper(test_cart(1, 1, 0)).expect("mapper 0");
        let mut state = m0.save();
        state.mapper = 4;
        assert!(matches!(
            m0.restore(&state),
            Err(MapperError::StateMismatch { .. })
        ));
    }

    #[test]
    fn test_state_round_trip_preserves_windows_and_sram() {
        let mut mapper = create_mapper(test_cart(4, 2, 2)).expect("mapper 2");
        mapper.write(0x8000, 2); // swap low bank
        mapper.banks_mut().sram_write(0x6123, 0xAB);
        let state = mapper.save();

        let mut fresh = create_mapper(test_cart(4, 2, 2)).expect("mapper 2");
        fresh.restore(&state).expect("restore");
        assert_eq!(fresh.load(0x8000), 2);
        assert_eq!(fresh.banks().sram_read(0x6123), 0xAB);
    }
}
