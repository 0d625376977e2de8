// Mapper 4 (MMC3) - 8KB banking with a scanline IRQ counter
//
// Memory layout:
// - CPU $6000-$7FFF: 8KB PRG-RAM
// - CPU $8000-$FFFF: four 8KB PRG windows, two switchable
// - PPU $0000-$1FFF: two 2KB + four 1KB CHR windows
//
// Register pairs, selected by address range and A0:
//
//   $8000 even: bank select (target 0-7, PRG mode bit 6, CHR inversion bit 7)
//   $8001 odd:  bank data for the selected target
//   $A000 even: mirroring (0 = vertical, 1 = horizontal)
//   $A001 odd:  PRG-RAM protect (stored, not enforced)
//   $C000 even: IRQ latch value
//   $C001 odd:  IRQ reload request
//   $E000 even: IRQ disable + acknowledge
//   $E001 odd:  IRQ enable
//
// The IRQ counter is clocked once per rendered scanline by the PPU; it
// counts down and asserts the IRQ line when it runs out, reloading from the
// latch. Used by Super Mario Bros. 3 and Kirby's Adventure.

use super::{Banks, Mapper, MapperError, MapperState};
use crate::cartridge::{Cartridge, Mirroring};

pub struct Mapper4 {
    banks: Banks,
    /// Bank select register: target in bits 0-2, PRG mode bit 6, CHR mode bit 7
    bank_select: u8,
    /// The eight banking registers R0-R7
    bank_regs: [u8; 8],
    /// PRG-RAM protect register (stored only)
    ram_protect: u8,
    /// IRQ counter reload value
    irq_latch: u8,
    /// IRQ down-counter
    irq_counter: u8,
    /// Reload requested by a $C001 write
    irq_reload: bool,
    /// IRQ generation enabled
    irq_enabled: bool,
    /// IRQ line state
    irq_flag: bool,
    /// Four-screen boards ignore the mirroring register
    four_screen: bool,
}

impl Mapper4 {
    pub fn new(cart: Cartridge) -> Self {
        let four_screen = cart.mirroring == Mirroring::FourScreen;
        let mut mapper = Mapper4 {
            banks: Banks::new(cart),
            bank_select: 0,
            bank_regs: [0; 8],
            ram_protect: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_flag: false,
            four_screen,
        };
        mapper.apply();
        mapper
    }

    /// Re-derive bank windows from R0-R7 and the mode bits
    fn apply(&mut self) {
        let r = |i: usize| self.bank_regs[i] as usize;
        let last = self.banks.prg_bank_count_8k().saturating_sub(1);
        let second_last = last.saturating_sub(1);

        if self.bank_select & 0x40 == 0 {
            // $8000 swappable, $C000 fixed to second-last
            self.banks.map_prg_8k(0, r(6));
            self.banks.map_prg_8k(1, r(7));
            self.banks.map_prg_8k(2, second_last);
        } else {
            // $C000 swappable, $8000 fixed to second-last
            self.banks.map_prg_8k(0, second_last);
            self.banks.map_prg_8k(1, r(7));
            self.banks.map_prg_8k(2, r(6));
        }
        self.banks.map_prg_8k(3, last);

        // CHR: R0/R1 are 2KB banks, R2-R5 are 1KB banks; bit 7 swaps the
        // pattern-table halves (A12 inversion).
        let invert = self.bank_select & 0x80 != 0;
        let big = if invert { 4 } else { 0 };
        let small = if invert { 0 } else { 4 };
        self.banks.map_chr_1k(big, r(0) & !1);
        self.banks.map_chr_1k(big + 1, r(0) | 1);
        self.banks.map_chr_1k(big + 2, r(1) & !1);
        self.banks.map_chr_1k(big + 3, r(1) | 1);
        self.banks.map_chr_1k(small, r(2));
        self.banks.map_chr_1k(small + 1, r(3));
        self.banks.map_chr_1k(small + 2, r(4));
        self.banks.map_chr_1k(small + 3, r(5));
    }

    fn register_write(&mut self, addr: u16, data: u8) {
        match (addr & 0xE000, addr & 1) {
            (0x8000, 0) => {
                self.bank_select = data;
                self.apply();
            }
            (0x8000, _) => {
                let target = (self.bank_select & 0x07) as usize;
                self.bank_regs[target] = data;
                self.apply();
            }
            (0xA000, 0) => {
                if !self.four_screen {
                    self.banks.set_mirroring(if data & 1 == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    });
                }
            }
            (0xA000, _) => self.ram_protect = data,
            (0xC000, 0) => self.irq_latch = data,
            (0xC000, _) => self.irq_reload = true,
            (0xE000, 0) => {
                self.irq_enabled = false;
                self.irq_flag = false;
            }
            (0xE000, _) => self.irq_enabled = true,
            _ => {}
        }
    }
}

impl Mapper for Mapper4 {
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => self.banks.sram_write(addr, data),
            0x8000..=0xFFFF => self.register_write(addr, data),
            _ => {}
        }
    }

    fn clock_irq_counter(&mut self) {
        // The counter runs whether or not IRQs are enabled; the enable
        // bit only gates the line.
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_flag = true;
            log::trace!("MMC3 IRQ fired, latch {}", self.irq_latch);
        }
    }

    fn irq_asserted(&self) -> bool {
        self.irq_flag
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.bank_regs = [0; 8];
        self.ram_protect = 0;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_flag = false;
        self.apply();
    }

    fn save(&self) -> MapperState {
        let mut regs = vec![self.bank_select as u32];
        regs.extend(self.bank_regs.iter().map(|&r| r as u32));
        regs.push(self.ram_protect as u32);
        regs.push(self.irq_latch as u32);
        regs.push(self.irq_counter as u32);
        regs.push(self.irq_reload as u32);
        regs.push(self.irq_enabled as u32);
        regs.push(self.irq_flag as u32);
        self.banks.save(4, regs)
    }

    fn restore(&mut self, state: &MapperState) -> Result<(), MapperError> {
        self.banks.restore(4, state)?;
        let reg = |i: usize| state.regs.get(i).copied().unwrap_or(0);
        self.bank_select = reg(0) as u8;
        for i in 0..8 {
            self.bank_regs[i] = reg(1 + i) as u8;
        }
        self.ram_protect = reg(9) as u8;
        self.irq_latch = reg(10) as u8;
        self.irq_counter = reg(11) as u8;
        self.irq_reload = reg(12) != 0;
        self.irq_enabled = reg(13) != 0;
        self.irq_flag = reg(14) != 0;
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

    fn mmc3() -> Mapper4 {
        let mut prg_rom = vec![0u8; 8 * 16 * 1024]; // 16 x 8KB banks
        for (bank, chunk) in prg_rom.chunks_mut(8 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr_rom = vec![0u8; 128 * 1024]; // 128 x 1KB banks
        for (bank, chunk) in chr_rom.chunks_mut(1024).enumerate() {
            chunk.fill(bank as u8);
        }
        Mapper4::new(Cartridge {
            prg_rom,
            chr_rom,
            trainer: None,
            mapper: 4,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        })
    }

    #[test]
    fn test_power_on_prg_layout() {
        let mut m = mmc3();
        assert_eq!(m.load(0xE000), 15, "last bank fixed at $E000");
        assert_eq!(m.load(0xC000), 14, "second-last at $C000 in mode 0");
    }

    #[test]
    fn test_prg_swap_mode() {
        let mut m = mmc3();
        m.write(0x8000, 6); // target R6
        m.write(0x8001, 3);
        assert_eq!(m.load(0x8000), 3);

        m.write(0x8000, 6 | 0x40); // PRG mode 1
        assert_eq!(m.load(0xC000), 3, "R6 moves to $C000");
        assert_eq!(m.load(0x8000), 14, "second-last at $8000");
    }

    #[test]
    fn test_chr_inversion() {
        let mut m = mmc3();
        m.write(0x8000, 0); // target R0 (2KB at $0000)
        m.write(0x8001, 8);
        assert_eq!(m.chr_load(0x0000), 8);
        assert_eq!(m.chr_load(0x0400), 9, "2KB bank pairs 1KB banks");

        m.write(0x8000, 0x80); // invert A12
        assert_eq!(m.chr_load(0x1000), 8, "R0 moves to the high table");
    }

    #[test]
    fn test_mirroring_register() {
        let mut m = mmc3();
        m.write(0xA000, 0);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        m.write(0xA000, 1);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn test_irq_counts_scanlines() {
        let mut m = mmc3();
        m.write(0xC000, 2); // latch
        m.write(0xC001, 0); // reload request
        m.write(0xE001, 0); // enable

        m.clock_irq_counter(); // reload -> 2
        m.clock_irq_counter(); // 2 -> 1
        assert!(!m.irq_asserted());
        m.clock_irq_counter(); // 1 -> 0, fires
        assert!(m.irq_asserted());

        m.write(0xE000, 0); // acknowledge + disable
        assert!(!m.irq_asserted());
    }

    #[test]
    fn test_counter_runs_while_irqs_disabled() {
        let mut m = mmc3();
        m.write(0xC000, 3);
        m.write(0xC001, 0);
        m.clock_irq_counter(); // reload -> 3, IRQs still off
        m.clock_irq_counter(); // 2
        m.clock_irq_counter(); // 1
        assert!(!m.irq_asserted());

        // Re-enabling just before expiry keeps the hardware fire time.
        m.write(0xE001, 0);
        m.clock_irq_counter(); // 0, fires on schedule
        assert!(m.irq_asserted());
    }

    #[test]
    fn test_irq_disabled_never_asserts() {
        let mut m = mmc3();
        m.write(0xC000, 1);
        for _ in 0..10 {
            m.clock_irq_counter();
        }
        assert!(!m.irq_asserted());
    }
}
