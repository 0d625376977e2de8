// Mapper 2 (UNROM) - 16KB PRG switching, fixed top bank
//
// Memory layout:
// - CPU $8000-$BFFF: switchable 16KB PRG-ROM bank
// - CPU $C000-$FFFF: fixed, last 16KB PRG-ROM bank
// - PPU $0000-$1FFF: 8KB CHR-RAM
//
// Any write to $8000-$FFFF selects the low bank. Used by Mega Man,
// Castlevania and Contra.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper2 {
    banks: Banks,
    /// Currently selected low 16KB bank
    prg_bank: u8,
}

impl Mapper2 {
    pub fn new(cart: Cartridge) -> Self {
        Mapper2 {
            banks: Banks::new(cart),
            prg_bank: 0,
        }
    }
}

impl Mapper for Mapper2 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.prg_bank = data;
                self.banks.map_prg_16k(0, data as usize);
                log::trace!("UNROM: PRG bank {} at $8000", data);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        let last = self.banks.prg_bank_count_16k().saturating_sub(1);
        self.banks.map_prg_16k(0, 0);
        self.banks.map_prg_16k(1, last);
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(2, vec![self.prg_bank as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(2, state)?;
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
