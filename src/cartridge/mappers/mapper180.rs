// Mapper 180 (Crazy Climber board) - inverted UNROM
//
// Memory layout:
// - CPU $8000-$BFFF: fixed, first 16KB PRG-ROM bank
// - CPU $C000-$FFFF: switchable 16KB PRG-ROM bank
// - PPU $0000-$1FFF: 8KB CHR-RAM
//
// Like UNROM but with the fixed and switchable halves swapped.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper180 {
    banks: Banks,
    prg_bank: u8,
}

impl Mapper180 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper180 {
            banks: Banks::new(cart),
            prg_bank: 0,
        };
        mapper.banks.map_prg_16k(0, 0);
        mapper.banks.map_prg_16k(1, 0);
        mapper
    }
}

impl Mapper for Mapper180 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.prg_bank = data & 0x07;
                self.banks.map_prg_16k(1, self.prg_bank as usize);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.banks.map_prg_16k(0, 0);
        self.banks.map_prg_16k(1, 0);
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(180, vec![self.prg_bank as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(180, state)?;
        self.prg_bank = state.regs.first().copied().unwrap_or(0) as u8;
        Ok(())
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

    #[test]
    fn test_high_bank_switches_low_bank_fixed() {
        let mut prg_rom = vec![0u8; 8 * 16 * 1024];
        for (bank, chunk) in prg_rom.chunks_mut(16 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut m = Mapper180::new(Cartridge {
            prg_rom,
            chr_rom: Vec::new(),
            trainer: None,
            mapper: 180,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        });

        assert_eq!(m.load(0x8000), 0, "low half fixed to first bank");
        m.write(0x8000, 4);
        assert_eq!(m.load(0xC000), 4, "high half switches");
        assert_eq!(m.load(0x8000), 0, "low half still fixed");
    }
}
