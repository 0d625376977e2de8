// Mapper 241 - plain 32KB PRG select
//
// Memory layout:
// - CPU $8000-$FFFF: switchable 32KB PRG-ROM bank
// - PPU $0000-$1FFF: 8KB CHR-ROM or CHR-RAM
//
// Any write to $8000-$FFFF selects the PRG bank; CHR is fixed.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper241 {
    banks: Banks,
    prg_bank: u8,
}

impl Mapper241 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper241 {
            banks: Banks::new(cart),
            prg_bank: 0,
        };
        mapper.banks.map_prg_32k(0);
        mapper
    }
}

impl Mapper for Mapper241 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.prg_bank = data;
                self.banks.map_prg_32k(data as usize);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.banks.map_prg_32k(0);
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(241, vec![self.prg_bank as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(241, state)?;
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
