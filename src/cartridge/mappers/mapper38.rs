// Mapper 38 (Crime Busters board) - low-register PRG/CHR select
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: switchable 8KB CHR-ROM bank
//
// The register sits at $7000-$7FFF: bits 0-1 PRG, bits 2-3 CHR.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper38 {
    banks: Banks,
    reg: u8,
}

impl Mapper38 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper38 {
            banks: Banks::new(cart),
            reg: 0,
        };
        mapper.apply();
        mapper
    }

    fn apply(&mut self) {
        self.banks.map_prg_32k((self.reg & 0x03) as usize);
        self.banks.map_chr_8k(((self.reg >> 2) & 0x03) as usize);
    }
}

impl Mapper for Mapper38 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            // The register shadows the top half of the SRAM range.
            0x7000..=0x7FFF => {
                self.reg = data;
                self.apply();
            }
            0x6000..=0x6FFF => self.banks.sram_write(addr, data),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.reg = 0;
        self.apply();
    }

    fn save(&self) -> MapperState {
        self.banks.save(38, vec![self.reg as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(38, state)?;
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
    fn test_register_at_7000() {
        let mut prg_rom = vec![0u8; 4 * 32 * 1024];
        for (bank, chunk) in prg_rom.chunks_mut(32 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr_rom = vec![0u8; 4 * 8 * 1024];
        for (bank, chunk) in chr_rom.chunks_mut(8 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut m = Mapper38::new(Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper: 38,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        });

        m.write(0x7123, 0b0000_1110); // PRG 2, CHR 3
        assert_eq!(m.load(0x8000), 2);
        assert_eq!(m.chr_load(0x0000), 3);

        m.write(0x8000, 0xFF); // ROM range is not the register
        assert_eq!(m.load(0x8000), 2);
    }
}
