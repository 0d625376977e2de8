// NES console core
//
// A cycle-aware emulation core: 6502 CPU (official and documented
// unofficial opcodes), PPU with mid-instruction catch-up, APU with all
// five channels and DMC DMA, the bank-switching mapper set, controllers
// and light gun. The host drives it one frame at a time and receives
// video/audio through callbacks; there is no front-end in this crate.

// Public modules
pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod console;
pub mod cpu;
pub mod genie;
pub mod input;
pub mod ppu;
pub mod save_state;

// Re-export main types for convenience
pub use apu::Apu;
pub use bus::Bus;
pub use cartridge::{create_mapper, Cartridge, INesError, INesHeader, Mapper, MapperError, Mirroring};
pub use config::ConsoleConfig;
pub use console::{Console, ConsoleError};
pub use cpu::{Cpu, CpuError, Interrupt};
pub use genie::{GenieCode, GenieError};
pub use input::{Button, Controller, Zapper};
pub use ppu::Ppu;
pub use save_state::{SaveState, SaveStateError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_components() {
        // Test that the core pieces can be instantiated together.
        let _cpu = Cpu::new();
        let _ppu = Ppu::new();
        let _apu = Apu::new(44_100, true);
        let _controller = Controller::new();
        let _console = Console::new(ConsoleConfig::default());
    }
}
