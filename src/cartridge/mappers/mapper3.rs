// Mapper 3 (CNROM) - 8KB CHR switching
//
// Memory layout:
// - CPU $8000-$FFFF: fixed 16KB or 32KB PRG-ROM
// - PPU $0000-$1FFF: switchable 8KB CHR-ROM bank
//
// Any write to $8000-$FFFF selects the CHR bank. Used by Gradius and
// Arkanoid.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::Cartridge;

pub struct Mapper3 {
    banks: Banks,
    /// Currently selected 8KB CHR bank
    chr_bank: u8,
}

impl Mapper3 {
    pub fn new(cart: Cartridge) -> Self {
        Mapper3 {
            banks: Banks::new(cart),
            chr_bank: 0,
        }
    }
}

impl Mapper for Mapper3 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => {
                self.chr_bank = data;
                self.banks.map_chr_8k(data as usize);
                log::trace!("CNROM: CHR bank {}", data);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
        let last = self.banks.prg_bank_count_16k().saturating_sub(1);
        self.banks.map_prg_16k(0, 0);
        self.banks.map_prg_16k(1, last);
        self.banks.map_chr_8k(0);
    }

    fn save(&self) -> MapperState {
        self.banks.save(3, vec![self.chr_bank as u32])
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(3, state)?;
        self.chr_bank = state.regs.first().copied().unwrap_or(0) as u8;
        Ok(())
    }

    fn banks(&self) -> &Banks {
        &self.banks
    }

    fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }
}
