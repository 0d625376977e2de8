// Mapper 94 (UN1ROM) - UNROM variant with a shifted bank register
//
// Memory layout:
// - CPU $8000-$BFFF: switchable 16KB PRG-ROM bank
// - CPU $C000-$FFFF: fixed, last 16KB PRG-ROM bank
// - PPU $0000-$1FFF: 8KB CHR-RAM
//
// The bank number sits in bits 2-4 of any write to $8000-$FFFF.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper94 {
    banks: Banks,
    prg_bank: u8,
}

impl Mapper94 {
    pub fn new(cart: Cartridge) -> Self {
        Mapper94 {
            banks: Banks::new(cart),
            prg_bank: 0,
        }
    }
}

impl Mapper for Mapper94 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.prg_bank = (data >> 2) & 0x07;
                self.banks.map_prg_16k(0, self.prg_bank as usize);
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
        self.banks.save(94, vec![self.prg_bank as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(94, state)?;
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
