// Mapper 240 - combined select below the SRAM range
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: switchable 8KB CHR-ROM bank
//
// The register sits in $4020-$5FFF: bits 4-7 PRG, bits 0-3 CHR. SRAM at
// $6000-$7FFF is real on this board.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper240 {
    banks: Banks,
    reg: u8,
}

impl Mapper240 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper240 {
            banks: Banks::new(cart),
            reg: 0,
        };
        mapper.apply();
        mapper
    }

    fn apply(&mut self) {
        self.banks.map_prg_32k(((self.reg >> 4) & 0x0F) as usize);
        self.banks.map_chr_8k((self.reg & 0x0F) as usize);
    }
}

impl Mapper for Mapper240 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4020..=0x5FFF => {
                self.reg = data;
                self.apply();
            }
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.reg = 0;
        self.apply();
    }

    fn save(&self) -> MapperState {
        self.banks.save(240, vec![self.reg as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(240, state)?;
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
    fn test_register_below_sram() {
        let mut prg_rom = vec![0u8; 2 * 32 * 1024];
        prg_rom[32 * 1024..].fill(1);
        let mut chr_rom = vec![0u8; 2 * 8 * 1024];
        chr_rom[8 * 1024..].fill(1);

        let mut m = Mapper240::new(Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper: 240,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        });

        m.write(0x5000, 0x11); // PRG 1, CHR 1
        assert_eq!(m.load(0x8000), 1);
        assert_eq!(m.chr_load(0x0000), 1);

        m.write(0x6000, 0x42);
        assert_eq!(m.load(0x6000), 0x42, "SRAM untouched by the register");
    }
}
