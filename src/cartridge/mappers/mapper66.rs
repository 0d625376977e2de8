// Mapper 66 (GxROM) - combined 32KB PRG / 8KB CHR select
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: switchable 8KB CHR-ROM bank
//
// A single write to $8000-$FFFF sets both: bits 4-5 PRG, bits 0-1 CHR.
// Used by Super Mario Bros. + Duck Hunt and Dragon Power.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper66 {
    banks: Banks,
    reg: u8,
}

impl Mapper66 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper66 {
            banks: Banks::new(cart),
            reg: 0,
        };
        mapper.apply();
        mapper
    }

    fn apply(&mut self) {
        self.banks.map_prg_32k(((self.reg >> 4) & 0x03) as usize);
        self.banks.map_chr_8k((self.reg & 0x03) as usize);
    }
}

impl Mapper for Mapper66 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.reg = data;
                self.apply();
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.reg = 0;
        self.apply();
    }

    fn save(&self) -> MapperState {
        self.banks.save(66, vec![self.reg as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(66, state)?;
        self.reg = state.regs.first().copied().unwrap_or(0) as u8;
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
    fn test_combined_select() {
        let mut prg_rom = vec![0u8; 4 * 32 * 1024];
        for (bank, chunk) in prg_rom.chunks_mut(32 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr_rom = vec![0u8; 4 * 8 * 1024];
        for (bank, chunk) in chr_rom.chunks_mut(8 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut m = Mapper66::new(Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper: 66,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        });

        m.write(0x8000, 0x23); // PRG 2, CHR 3
        assert_eq!(m.load(0x8000), 2);
        assert_eq!(m.chr_load(0x0000), 3);
    }
}
