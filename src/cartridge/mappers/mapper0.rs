// Mapper 0 (NROM) - no banking hardware
//
// Memory layout:
// - CPU $6000-$7FFF: 8KB PRG-RAM
// - CPU $8000-$BFFF: first 16KB of PRG-ROM
// - CPU $C000-$FFFF: last 16KB of PRG-ROM (mirror of the first on 16KB boards)
// - PPU $0000-$1FFF: 8KB CHR-ROM or CHR-RAM

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

/// Mapper 0 implementation (NROM)
///
/// The launch-era board: Super Mario Bros., Donkey Kong, Excitebike.
pub struct Mapper0 {
    banks: Banks,
}

impl Mapper0 {
    pub fn new(cart: Cartridge) -> Self {
        Mapper0 {
            banks: Banks::new(cart),
        }
    }
}

impl Mapper for Mapper0 {
    fn write(&mut self, addr: u16, data: u8) {
        // Writes above $8000 hit ROM and are ignored.
        if let 0x6000..=0x7FFF = addr {
            self.banks.sram_write(addr, data);
        }
    }

    fn reset(&mut self) {
        let last = self.banks.prg_bank_count_16k().saturating_sub(1);
        self.banks.map_prg_16k(0, 0);
        self.banks.map_prg_16k(1, last);
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(0, Vec::new())
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(0, state)
    }

    fn banks(&self) -> &Banks {
        &self.banks
    }

    fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Mirroring;

    fn nrom(prg_16k: usize) -> Mapper0 {
        let mut prg_rom = vec![0u8; prg_16k * 16 * 1024];
        for (bank, chunk) in prg_rom.chunks_mut(16 * 1024).enumerate() {
            chunk.fill(bank as u8 + 1);
        }
        Mapper0::new(Cartridge {
            prg_rom,
            chr_rom: vec![0u8; 8 * 1024],
            trainer: None,
            mapper: 0,
            mirroring: Mirroring::Vertical,
            has_battery: false,
        })
    }

    #[test]
    fn test_16k_board_mirrors_prg() {
        let mut m = nrom(1);
        assert_eq!(m.load(0x8000), 1);
        assert_eq!(m.load(0xC000), 1, "$C000 mirrors the single bank");
    }

    #[test]
    fn test_32k_board_is_flat() {
        let mut m = nrom(2);
        assert_eq!(m.load(0x8000), 1);
        assert_eq!(m.load(0xC000), 2);
    }

    #[test]
    fn test_rom_writes_ignored() {
        let mut m = nrom(1);
        m.write(0x8000, 0xFF);
        assert_eq!(m.load(0x8000), 1, "ROM contents unchanged");
    }

    #[test]
    fn test_sram_write_and_read() {
        let mut m = nrom(1);
        m.write(0x6000, 0x42);
        assert_eq!(m.load(0x6000), 0x42);
    }
}
