// Mapper 1 (MMC1) - serial shift-register board
//
// Memory layout:
// - CPU $6000-$7FFF: 8KB PRG-RAM (battery-backed on some games)
// - CPU $8000-$BFFF: 16KB PRG-ROM bank (switchable or fixed by mode)
// - CPU $C000-$FFFF: 16KB PRG-ROM bank (switchable or fixed by mode)
// - PPU $0000-$0FFF: 4KB CHR bank 0
// - PPU $1000-$1FFF: 4KB CHR bank 1
//
// All $8000-$FFFF writes feed a 5-bit serial shift register, LSB first.
// Bit 7 of a write resets the register and forces fix-last PRG mode. The
// fifth write transfers the accumulated value into one of four internal
// registers selected by address bits 13-14:
//
//   $8000-$9FFF control:  bits 0-1 mirroring, 2-3 PRG mode, 4 CHR mode
//   $A000-$BFFF CHR bank 0
//   $C000-$DFFF CHR bank 1 (ignored in 8KB CHR mode)
//   $E000-$FFFF PRG bank
//
// Used by The Legend of Zelda, Metroid and Mega Man 2.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::{Cartridge, Mirroring};

pub struct Mapper1 {
    banks: Banks,
    /// Serial shift register (5 bits)
    shift: u8,
    /// Writes accumulated in the shift register (0-4)
    write_count: u8,
    /// Control register
    control: u8,
    /// CHR bank 0 register
    chr_bank_0: u8,
    /// CHR bank 1 register
    chr_bank_1: u8,
    /// PRG bank register
    prg_bank: u8,
}

impl Mapper1 {
    pub fn new(cart: Cartridge) -> Self {
        let mut mapper = Mapper1 {
            banks: Banks::new(cart),
            shift: 0,
            write_count: 0,
            // Power-on: fix-last PRG mode, 4KB CHR mode.
            control: 0x1C,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        };
        mapper.apply();
        mapper
    }

    fn serial_write(&mut self, addr: u16, data: u8) {
        if data & 0x80 != 0 {
            self.shift = 0;
            self.write_count = 0;
            self.control |= 0x0C;
            self.apply();
            return;
        }

        self.shift = (self.shift >> 1) | ((data & 1) << 4);
        self.write_count += 1;
        if self.write_count < 5 {
            return;
        }

        let value = self.shift & 0x1F;
        self.shift = 0;
        self.write_count = 0;
        match addr {
            0x8000..=0x9FFF => self.control = value,
            0xA000..=0xBFFF => self.chr_bank_0 = value,
            0xC000..=0xDFFF => self.chr_bank_1 = value,
            _ => self.prg_bank = value & 0x0F,
        }
        self.apply();
    }

    /// Re-derive bank windows and mirroring from the register file
    fn apply(&mut self) {
        match self.control & 0x03 {
            0 => self.banks.set_mirroring(Mirroring::SingleScreenLow),
            1 => self.banks.set_mirroring(Mirroring::SingleScreenHigh),
            2 => self.banks.set_mirroring(Mirroring::Vertical),
            _ => self.banks.set_mirroring(Mirroring::Horizontal),
        }

        let prg = self.prg_bank as usize;
        let last = self.banks.prg_bank_count_16k().saturating_sub(1);
        match (self.control >> 2) & 0x03 {
            // 32KB mode, low bit of the bank number ignored
            0 | 1 => self.banks.map_prg_32k(prg >> 1),
            // Fix first bank at $8000, switch $C000
            2 => {
                self.banks.map_prg_16k(0, 0);
                self.banks.map_prg_16k(1, prg);
            }
            // Fix last bank at $C000, switch $8000
            _ => {
                self.banks.map_prg_16k(0, prg);
                self.banks.map_prg_16k(1, last);
            }
        }

        if self.control & 0x10 == 0 {
            // 8KB CHR mode, low bit ignored
            self.banks.map_chr_8k(self.chr_bank_0 as usize >> 1);
        } else {
            self.banks.map_chr_4k(0, self.chr_bank_0 as usize);
            self.banks.map_chr_4k(1, self.chr_bank_1 as usize);
        }
    }
}

impl Mapper for Mapper1 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => self.serial_write(addr, data),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.shift = 0;
        self.write_count = 0;
        self.control = 0x1C;
        self.chr_bank_0 = 0;
        self.chr_bank_1 = 0;
        self.prg_bank = 0;
        self.apply();
    }

    fn save(&self) -> MapperState {
        self.banks.save(
            1,
            vec![
                self.shift as u32,
                self.write_count as u32,
                self.control as u32,
                self.chr_bank_0 as u32,
                self.chr_bank_1 as u32,
                self.prg_bank as u32,
            ],
        )
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(1, state)?;
        let reg = |i: usize| state.regs.get(i).copied().unwrap_or(0) as u8;
        self.shift = reg(0);
        self.write_count = reg(1);
        self.control = reg(2);
        self.chr_bank_0 = reg(3);
        self.chr_bank_1 = reg(4);
        self.prg_bank = reg(5);
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

    fn mmc1() -> Mapper1 {
        let mut prg_rom = vec![0u8; 8 * 16 * 1024];
        for (bank, chunk) in prg_rom.chunks_mut(16 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr_rom = vec![0u8; 4 * 4 * 1024];
        for (bank, chunk) in chr_rom.chunks_mut(4 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        Mapper1::new(Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper: 1,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        })
    }

    /// Clock five bits into the shift register, LSB first
    fn serial(m: &mut Mapper1, addr: u16, value: u8) {
        for i in 0..5 {
            m.write(addr, (value >> i) & 1);
        }
    }

    #[test]
    fn test_power_on_fixes_last_bank() {
        let mut m = mmc1();
        assert_eq!(m.load(0xC000), 7);
    }

    #[test]
    fn test_serial_prg_switch() {
        let mut m = mmc1();
        serial(&mut m, 0xE000, 3);
        assert_eq!(m.load(0x8000), 3);
        assert_eq!(m.load(0xC000), 7, "fix-last mode holds the top bank");
    }

    #[test]
    fn test_reset_bit_aborts_serial_write() {
        let mut m = mmc1();
        m.write(0x8000, 1);
        m.write(0x8000, 1);
        m.write(0x8000, 0x80); // reset mid-stream
        serial(&mut m, 0xE000, 5);
        assert_eq!(m.load(0x8000), 5, "full five bits land after reset");
    }

    #[test]
    fn test_mirroring_control() {
        let mut m = mmc1();
        serial(&mut m, 0x8000, 0x02 | 0x0C); // vertical, fix-last
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        serial(&mut m, 0x8000, 0x03 | 0x0C);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn test_chr_4k_mode() {
        let mut m = mmc1();
        serial(&mut m, 0x8000, 0x1C); // 4KB CHR mode
        serial(&mut m, 0xA000, 2);
        serial(&mut m, 0xC000, 3);
        assert_eq!(m.chr_load(0x0000), 2);
        assert_eq!(m.chr_load(0x1000), 3);
    }

    #[test]
    fn test_prg_32k_mode_ignores_low_bit() {
        let mut m = mmc1();
        serial(&mut m, 0x8000, 0x00 | 0x10); // 32KB PRG, 4KB CHR
        serial(&mut m, 0xE000, 5); // banks 4+5
        assert_eq!(m.load(0x8000), 4);
        assert_eq!(m.load(0xC000), 5);
    }
}
