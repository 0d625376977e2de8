// Mapper 7 (AxROM) - 32KB PRG switching with single-screen mirroring
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: 8KB CHR-RAM
//
// Writes to $8000-$FFFF: bits 0-2 select the PRG bank, bit 4 selects which
// nametable the single screen shows. Used by Battletoads and Marble Madness.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::{Cartridge, Mirroring};

pub struct Mapper7 {
    banks: Banks,
    /// Last value written to the bank register
    reg: u8,
}

impl Mapper7 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper7 {
            banks: Banks::new(cart),
            reg: 0,
        };
        mapper.apply();
        mapper
    }

    fn apply(&mut self) {
        self.banks.map_prg_32k((self.reg & 0x07) as usize);
        self.banks.set_mirroring(if self.reg & 0x10 != 0 {
            Mirroring::SingleScreenHigh
        } else {
            Mirroring::SingleScreenLow
        });
    }
}

impl Mapper for Mapper7 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.reg = data;
                self.apply();
                log::trace!("AxROM: PRG bank {}, screen {}", data & 7, (data >> 4) & 1);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.reg = 0;
        self.apply();
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(7, vec![self.reg as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(7, state)?;
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
