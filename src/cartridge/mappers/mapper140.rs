// Mapper 140 (Jaleco JF-11/JF-14) - low-register PRG/CHR select
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: switchable 8KB CHR-ROM bank
//
// The register occupies the whole $6000-$7FFF range: bits 4-5 PRG,
// bits 0-3 CHR. The board has no SRAM.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper140 {
    banks: Banks,
    reg: u8,
}

impl Mapper140 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper140 {
            banks: Banks::new(cart),
            reg: 0,
        };
        mapper.apply();
        mapper
    }

    fn apply(&mut self) {
        self.banks.map_prg_32k(((self.reg >> 4) & 0x03) as usize);
        self.banks.map_chr_8k((self.reg & 0x0F) as usize);
    }
}

impl Mapper for Mapper140 {
    fn load(&mut self, addr: u16) -> u8 {
        match addr {
            // No SRAM behind the register range.
            0x6000..=0x7FFF => 0,
            0x8000..=0xFFFF => self.banks().prg_read(addr),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.reg = data;
            self.apply();
        }
    }

    fn reset(&mut self) {
        self.reg = 0;
        self.apply();
    }

    fn save(&self) -> MapperState {
        self.banks.save(140, vec![self.reg as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(140, state)?;
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
