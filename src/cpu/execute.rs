// CPU interpreter - addressing modes and instruction execution
//
// `emulate` runs exactly one instruction (servicing a pending interrupt
// first) and returns the CPU cycles it consumed, including branch and
// page-crossing penalties. All operand traffic, including the dummy reads
// of indexed addressing and the dummy writes of read-modify-write
// instructions, goes through the bus so it lands on the data bus and
// reaches the mapped hardware.

use super::opcodes::{AddrMode, Op, OPCODES};
use super::{flags, vectors, Cpu, CpuError};
use crate::bus::Bus;

/// How an instruction touches its operand; selects the dummy-read rule
/// for indexed addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Pure read: dummy read only on a page crossing
    Read,
    /// Store or RMW: the partial-address dummy read always happens
    Write,
}

/// A resolved operand
struct Operand {
    addr: u16,
    page_crossed: bool,
}

impl Cpu {
    /// Execute one instruction; returns the cycles consumed
    ///
    /// # Errors
    /// [`CpuError::InvalidOpcode`] when the fetched opcode has no table
    /// entry (a halting opcode on hardware).
    pub fn emulate(&mut self, bus: &mut Bus) -> Result<u32, CpuError> {
        bus.begin_instruction();
        self.service_interrupt(bus);

        let opcode_pc = self.pc;
        let opcode = bus.cpu_read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let entry = OPCODES[opcode as usize];
        if entry.op == Op::Invalid {
            return Err(CpuError::InvalidOpcode {
                opcode,
                pc: opcode_pc,
            });
        }

        if entry.op == Op::Jsr {
            // JSR's bus order is special: the return address (pointing at
            // the instruction's last byte) is pushed between the two
            // operand fetches, leaving the target high byte as the final
            // bus read.
            let lo = bus.cpu_read(self.pc) as u16;
            self.pc = self.pc.wrapping_add(1);
            self.stack_push_u16(bus, self.pc);
            let hi = bus.cpu_read(self.pc) as u16;
            self.pc = (hi << 8) | lo;
            self.cycles += entry.cycles as u64;
            return Ok(entry.cycles as u32);
        }

        let access = if entry.op.is_store() || entry.op.is_rmw() {
            Access::Write
        } else {
            Access::Read
        };

        let mut cycles = entry.cycles as u32;
        let operand = self.resolve_operand(bus, entry.mode, access);
        if operand.page_crossed && entry.page_penalty {
            cycles += 1;
        }
        cycles += self.execute_op(bus, entry.op, entry.mode, operand.addr);

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    // ========================================
    // Addressing modes
    // ========================================

    /// Produce the effective address, issuing the mode's dummy reads
    fn resolve_operand(&mut self, bus: &mut Bus, mode: AddrMode, access: Access) -> Operand {
        let mut page_crossed = false;
        let addr = match mode {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            AddrMode::ZeroPage => self.fetch_operand_byte(bus) as u16,
            AddrMode::ZeroPageX => {
                let base = self.fetch_operand_byte(bus);
                // The unindexed address is read while the index is added.
                let _ = bus.cpu_read(base as u16);
                base.wrapping_add(self.x) as u16
            }
            AddrMode::ZeroPageY => {
                let base = self.fetch_operand_byte(bus);
                let _ = bus.cpu_read(base as u16);
                base.wrapping_add(self.y) as u16
            }
            AddrMode::Absolute => self.fetch_operand_word(bus),
            AddrMode::AbsoluteX => {
                let base = self.fetch_operand_word(bus);
                self.indexed_address(bus, base, self.x, access, &mut page_crossed)
            }
            AddrMode::AbsoluteY => {
                let base = self.fetch_operand_word(bus);
                self.indexed_address(bus, base, self.y, access, &mut page_crossed)
            }
            AddrMode::Indirect => {
                let ptr = self.fetch_operand_word(bus);
                let lo = bus.cpu_read(ptr) as u16;
                // 6502 bug: the high byte wraps within the pointer's page.
                let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let hi = bus.cpu_read(hi_addr) as u16;
                (hi << 8) | lo
            }
            AddrMode::IndirectX => {
                let base = self.fetch_operand_byte(bus);
                // The pre-indexed pointer is read before X is applied.
                let _ = bus.cpu_read(base as u16);
                let ptr = base.wrapping_add(self.x);
                let lo = bus.cpu_read(ptr as u16) as u16;
                let hi = bus.cpu_read(ptr.wrapping_add(1) as u16) as u16;
                (hi << 8) | lo
            }
            AddrMode::IndirectY => {
                let ptr = self.fetch_operand_byte(bus);
                let lo = bus.cpu_read(ptr as u16) as u16;
                let hi = bus.cpu_read(ptr.wrapping_add(1) as u16) as u16;
                let base = (hi << 8) | lo;
                self.indexed_address(bus, base, self.y, access, &mut page_crossed)
            }
            AddrMode::Relative => {
                let offset = self.fetch_operand_byte(bus) as i8;
                self.pc.wrapping_add(offset as u16)
            }
        };
        Operand { addr, page_crossed }
    }

    /// Indexed effective address with the partial-address dummy read
    fn indexed_address(
        &mut self,
        bus: &mut Bus,
        base: u16,
        index: u8,
        access: Access,
        page_crossed: &mut bool,
    ) -> u16 {
        let addr = base.wrapping_add(index as u16);
        *page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        if *page_crossed || access == Access::Write {
            // The CPU reads from the address before the carry into the
            // high byte resolves.
            let partial = (base & 0xFF00) | (addr & 0x00FF);
            let _ = bus.cpu_read(partial);
        }
        addr
    }

    #[inline]
    fn fetch_operand_byte(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.cpu_read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    #[inline]
    fn fetch_operand_word(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch_operand_byte(bus) as u16;
        let hi = self.fetch_operand_byte(bus) as u16;
        (hi << 8) | lo
    }

    // ========================================
    // Instruction semantics
    // ========================================

    /// Execute the operation; returns extra cycles (branches)
    fn execute_op(&mut self, bus: &mut Bus, op: Op, mode: AddrMode, addr: u16) -> u32 {
        match op {
            // ----- Loads and stores -----
            Op::Lda => {
                self.a = bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Ldx => {
                self.x = bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Ldy => {
                self.y = bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.y);
            }
            Op::Lax => {
                let value = bus.cpu_read(addr);
                self.a = value;
                self.x = value;
                self.update_zero_and_negative_flags(value);
            }
            Op::Sta => bus.cpu_write(addr, self.a),
            Op::Stx => bus.cpu_write(addr, self.x),
            Op::Sty => bus.cpu_write(addr, self.y),
            Op::Sax => bus.cpu_write(addr, self.a & self.x),

            // ----- Arithmetic -----
            Op::Adc => {
                let value = bus.cpu_read(addr);
                self.add_with_carry(value);
            }
            Op::Sbc => {
                let value = bus.cpu_read(addr);
                self.add_with_carry(!value);
            }
            Op::Cmp => {
                let value = bus.cpu_read(addr);
                self.compare(self.a, value);
            }
            Op::Cpx => {
                let value = bus.cpu_read(addr);
                self.compare(self.x, value);
            }
            Op::Cpy => {
                let value = bus.cpu_read(addr);
                self.compare(self.y, value);
            }

            // ----- Logic -----
            Op::And => {
                self.a &= bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Ora => {
                self.a |= bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Eor => {
                self.a ^= bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Bit => {
                let value = bus.cpu_read(addr);
                self.update_flag(flags::ZERO, self.a & value == 0);
                self.update_flag(flags::NEGATIVE, value & 0x80 != 0);
                self.update_flag(flags::OVERFLOW, value & 0x40 != 0);
            }

            // ----- Increments / decrements -----
            Op::Inc => self.rmw(bus, mode, addr, |cpu, v| {
                let r = v.wrapping_add(1);
                cpu.update_zero_and_negative_flags(r);
                r
            }),
            Op::Dec => self.rmw(bus, mode, addr, |cpu, v| {
                let r = v.wrapping_sub(1);
                cpu.update_zero_and_negative_flags(r);
                r
            }),
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_and_negative_flags(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.y);
            }

            // ----- Shifts and rotates -----
            Op::Asl => self.rmw(bus, mode, addr, Cpu::op_asl),
            Op::Lsr => self.rmw(bus, mode, addr, Cpu::op_lsr),
            Op::Rol => self.rmw(bus, mode, addr, Cpu::op_rol),
            Op::Ror => self.rmw(bus, mode, addr, Cpu::op_ror),

            // ----- RMW + accumulator combos (unofficial) -----
            Op::Slo => self.rmw(bus, mode, addr, |cpu, v| {
                let r = Cpu::op_asl(cpu, v);
                cpu.a |= r;
                cpu.update_zero_and_negative_flags(cpu.a);
                r
            }),
            Op::Sre => self.rmw(bus, mode, addr, |cpu, v| {
                let r = Cpu::op_lsr(cpu, v);
                cpu.a ^= r;
                cpu.update_zero_and_negative_flags(cpu.a);
                r
            }),
            Op::Rla => self.rmw(bus, mode, addr, |cpu, v| {
                let r = Cpu::op_rol(cpu, v);
                cpu.a &= r;
                cpu.update_zero_and_negative_flags(cpu.a);
                r
            }),
            Op::Rra => self.rmw(bus, mode, addr, |cpu, v| {
                let r = Cpu::op_ror(cpu, v);
                cpu.add_with_carry(r);
                r
            }),
            Op::Dcp => self.rmw(bus, mode, addr, |cpu, v| {
                let r = v.wrapping_sub(1);
                cpu.compare(cpu.a, r);
                r
            }),
            Op::Isc => self.rmw(bus, mode, addr, |cpu, v| {
                let r = v.wrapping_add(1);
                cpu.add_with_carry(!r);
                r
            }),

            // ----- Branches -----
            Op::Bpl => return self.branch(addr, !self.get_flag(flags::NEGATIVE)),
            Op::Bmi => return self.branch(addr, self.get_flag(flags::NEGATIVE)),
            Op::Bvc => return self.branch(addr, !self.get_flag(flags::OVERFLOW)),
            Op::Bvs => return self.branch(addr, self.get_flag(flags::OVERFLOW)),
            Op::Bcc => return self.branch(addr, !self.get_flag(flags::CARRY)),
            Op::Bcs => return self.branch(addr, self.get_flag(flags::CARRY)),
            Op::Bne => return self.branch(addr, !self.get_flag(flags::ZERO)),
            Op::Beq => return self.branch(addr, self.get_flag(flags::ZERO)),

            // ----- Jumps and subroutines -----
            Op::Jmp => self.pc = addr,
            Op::Jsr => unreachable!("JSR is sequenced before operand resolution"),
            Op::Rts => {
                let addr = self.stack_pop_u16(bus);
                self.pc = addr.wrapping_add(1);
            }
            Op::Rti => {
                let status = self.stack_pop(bus);
                self.status = (status & !flags::BREAK) | flags::UNUSED;
                self.pc = self.stack_pop_u16(bus);
            }
            Op::Brk => {
                // BRK pushes the address of the byte after its padding.
                self.stack_push_u16(bus, self.pc.wrapping_add(1));
                let pushed = self.status | flags::BREAK | flags::UNUSED;
                self.stack_push(bus, pushed);
                self.set_flag(flags::INTERRUPT_DISABLE);
                let lo = bus.cpu_read(vectors::IRQ) as u16;
                let hi = bus.cpu_read(vectors::IRQ.wrapping_add(1)) as u16;
                self.pc = (hi << 8) | lo;
            }

            // ----- Stack and transfers -----
            Op::Pha => self.stack_push(bus, self.a),
            Op::Php => {
                let pushed = self.status | flags::BREAK | flags::UNUSED;
                self.stack_push(bus, pushed);
            }
            Op::Pla => {
                self.a = self.stack_pop(bus);
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Plp => {
                let status = self.stack_pop(bus);
                self.status = (status & !flags::BREAK) | flags::UNUSED;
            }
            Op::Tax => {
                self.x = self.a;
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.update_zero_and_negative_flags(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Tsx => {
                self.x = self.sp;
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Txs => self.sp = self.x,

            // ----- Flags -----
            Op::Clc => self.clear_flag(flags::CARRY),
            Op::Sec => self.set_flag(flags::CARRY),
            Op::Cli => self.clear_flag(flags::INTERRUPT_DISABLE),
            Op::Sei => self.set_flag(flags::INTERRUPT_DISABLE),
            Op::Clv => self.clear_flag(flags::OVERFLOW),
            Op::Cld => self.clear_flag(flags::DECIMAL),
            Op::Sed => self.set_flag(flags::DECIMAL),

            // ----- NOP family -----
            Op::Nop => {}
            Op::Skb | Op::Ign => {
                // The operand read still happens and is observable.
                let _ = bus.cpu_read(addr);
            }

            // ----- Immediate-mode unofficials -----
            Op::Alr => {
                let value = self.a & bus.cpu_read(addr);
                self.update_flag(flags::CARRY, value & 0x01 != 0);
                self.a = value >> 1;
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Anc => {
                self.a &= bus.cpu_read(addr);
                self.update_zero_and_negative_flags(self.a);
                self.update_flag(flags::CARRY, self.a & 0x80 != 0);
            }
            Op::Arr => {
                let and = self.a & bus.cpu_read(addr);
                let carry_in = if self.get_flag(flags::CARRY) { 0x80 } else { 0 };
                self.a = (and >> 1) | carry_in;
                self.update_zero_and_negative_flags(self.a);
                self.update_flag(flags::CARRY, self.a & 0x40 != 0);
                let v = ((self.a >> 6) ^ (self.a >> 5)) & 0x01;
                self.update_flag(flags::OVERFLOW, v != 0);
            }
            Op::Axs => {
                let value = bus.cpu_read(addr);
                let operand = (self.a & self.x) as u16;
                let result = operand.wrapping_sub(value as u16);
                self.update_flag(flags::CARRY, operand >= value as u16);
                self.x = result as u8;
                self.update_zero_and_negative_flags(self.x);
            }
            Op::Ane => {
                // Magic constant $FF, matching the emulated CPU revision.
                let value = bus.cpu_read(addr);
                self.a = (self.a | 0xFF) & self.x & value;
                self.update_zero_and_negative_flags(self.a);
            }
            Op::Lxa => {
                let value = bus.cpu_read(addr);
                let result = (self.a | 0xFF) & value;
                self.a = result;
                self.x = result;
                self.update_zero_and_negative_flags(result);
            }
            Op::Lae => {
                let value = bus.cpu_read(addr) & self.sp;
                self.a = value;
                self.x = value;
                self.sp = value;
                self.update_zero_and_negative_flags(value);
            }

            // ----- Stores with the high-byte glitch -----
            Op::Sha => {
                let value = self.a & self.x;
                bus.cpu_write(addr, self.glitched_high_and(bus_high(addr), value, bus));
            }
            Op::Shs => {
                self.sp = self.a & self.x;
                let value = self.sp;
                bus.cpu_write(addr, self.glitched_high_and(bus_high(addr), value, bus));
            }
            Op::Shx => {
                let value = self.x;
                bus.cpu_write(addr, self.glitched_high_and(bus_high(addr), value, bus));
            }
            Op::Shy => {
                let value = self.y;
                bus.cpu_write(addr, self.glitched_high_and(bus_high(addr), value, bus));
            }

            Op::Invalid => unreachable!("invalid opcodes error out before dispatch"),
        }
        0
    }

    // ----- shared operation bodies -----

    fn add_with_carry(&mut self, value: u8) {
        let carry = u16::from(self.get_flag(flags::CARRY));
        let sum = self.a as u16 + value as u16 + carry;
        let result = sum as u8;
        self.update_flag(flags::CARRY, sum > 0xFF);
        self.update_flag(
            flags::OVERFLOW,
            (self.a ^ result) & (value ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.update_zero_and_negative_flags(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.update_flag(flags::CARRY, register >= value);
        self.update_zero_and_negative_flags(result);
    }

    fn op_asl(cpu: &mut Cpu, value: u8) -> u8 {
        cpu.update_flag(flags::CARRY, value & 0x80 != 0);
        let result = value << 1;
        cpu.update_zero_and_negative_flags(result);
        result
    }

    fn op_lsr(cpu: &mut Cpu, value: u8) -> u8 {
        cpu.update_flag(flags::CARRY, value & 0x01 != 0);
        let result = value >> 1;
        cpu.update_zero_and_negative_flags(result);
        result
    }

    fn op_rol(cpu: &mut Cpu, value: u8) -> u8 {
        let carry_in = u8::from(cpu.get_flag(flags::CARRY));
        cpu.update_flag(flags::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        cpu.update_zero_and_negative_flags(result);
        result
    }

    fn op_ror(cpu: &mut Cpu, value: u8) -> u8 {
        let carry_in = if cpu.get_flag(flags::CARRY) { 0x80 } else { 0 };
        cpu.update_flag(flags::CARRY, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        cpu.update_zero_and_negative_flags(result);
        result
    }

    /// Read-modify-write pattern: read, write back the original (a real
    /// bus cycle), then write the result
    fn rmw(&mut self, bus: &mut Bus, mode: AddrMode, addr: u16, f: impl Fn(&mut Cpu, u8) -> u8) {
        if mode == AddrMode::Accumulator {
            self.a = f(self, self.a);
        } else {
            let value = bus.cpu_read(addr);
            bus.cpu_write(addr, value);
            let result = f(self, value);
            bus.cpu_write(addr, result);
        }
    }

    /// Taken branches cost one cycle, two when crossing a page
    fn branch(&mut self, target: u16, condition: bool) -> u32 {
        if !condition {
            return 0;
        }
        let penalty = if (self.pc & 0xFF00) != (target & 0xFF00) {
            2
        } else {
            1
        };
        self.pc = target;
        penalty
    }

    /// The SHx family's `& (high + 1)` factor, dropped when a DMC fetch
    /// lands inside the instruction (the DMA overrides the value the CPU
    /// was holding on the bus)
    fn glitched_high_and(&self, high: u8, value: u8, bus: &Bus) -> u8 {
        if bus.dmc_hijacked_this_instruction() {
            value
        } else {
            value & high.wrapping_add(1)
        }
    }
}

#[inline]
fn bus_high(addr: u16) -> u8 {
    (addr >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bus with RAM-resident test programs
    fn bus() -> Bus {
        Bus::for_tests()
    }

    /// Load a program into RAM at $0200 and point the CPU at it
    fn setup(program: &[u8]) -> (Cpu, Bus) {
        let mut cpu = Cpu::new();
        let mut bus = bus();
        for (i, &b) in program.iter().enumerate() {
            bus.cpu_write(0x0200 + i as u16, b);
        }
        cpu.pc = 0x0200;
        (cpu, bus)
    }

    #[test]
    fn test_lda_immediate_sets_flags() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x00, 0xA9, 0x80]);
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 2);
        assert!(cpu.get_flag(flags::ZERO));

        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.get_flag(flags::NEGATIVE));
    }

    #[test]
    fn test_adc_overflow_and_carry() {
        // LDA #$7F; ADC #$01 -> $80, V set, C clear
        let (mut cpu, mut bus) = setup(&[0xA9, 0x7F, 0x69, 0x01]);
        cpu.emulate(&mut bus).unwrap();
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.get_flag(flags::OVERFLOW));
        assert!(!cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::NEGATIVE));
    }

    #[test]
    fn test_sbc_borrows() {
        // SEC; LDA #$10; SBC #$20 -> $F0, C clear (borrow)
        let (mut cpu, mut bus) = setup(&[0x38, 0xA9, 0x10, 0xE9, 0x20]);
        for _ in 0..3 {
            cpu.emulate(&mut bus).unwrap();
        }
        assert_eq!(cpu.a, 0xF0);
        assert!(!cpu.get_flag(flags::CARRY));
    }

    #[test]
    fn test_absolute_x_page_cross_costs_a_cycle() {
        // LDX #$01; LDA $02FF,X
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0xBD, 0xFF, 0x02]);
        bus.cpu_write(0x0300, 0x42);
        cpu.emulate(&mut bus).unwrap();
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 5, "4 + 1 page-crossing cycle");
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn test_absolute_x_no_cross_is_base_cycles() {
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0xBD, 0x00, 0x03]);
        bus.cpu_write(0x0301, 0x24);
        cpu.emulate(&mut bus).unwrap();
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.a, 0x24);
    }

    #[test]
    fn test_page_cross_dummy_read_is_a_real_bus_cycle() {
        // LDA $02FF,X with X=1: dummy read at $0200, real read at $0300.
        // Five bus cycles: opcode, two operands, dummy read, real read.
        let (mut cpu, mut bus) = setup(&[0xA2, 0x01, 0xBD, 0xFF, 0x02]);
        bus.cpu_write(0x0300, 0x42);
        cpu.emulate(&mut bus).unwrap();
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.instr_bus_cycles(), 5, "the dummy read was issued");
        assert_eq!(bus.data_bus(), 0x42, "final read wins the bus");
    }

    #[test]
    fn test_sta_indexed_always_dummy_reads() {
        // STA $0210,X with X=0: 5 cycles, and the target is read before
        // the write (same address when no crossing).
        let (mut cpu, mut bus) = setup(&[0x9D, 0x10, 0x02]);
        cpu.a = 0x55;
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 5);
        assert_eq!(bus.load(0x0210), 0x55);
    }

    #[test]
    fn test_zero_page_x_wraps() {
        // LDX #$10; STA $F8,X -> $08, not $108
        let (mut cpu, mut bus) = setup(&[0xA2, 0x10, 0x95, 0xF8]);
        cpu.a = 0x77;
        cpu.emulate(&mut bus).unwrap();
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0008), 0x77);
    }

    #[test]
    fn test_indirect_jmp_page_wrap_bug() {
        // JMP ($02FF): high byte comes from $0200, not $0300.
        let (mut cpu, mut bus) = setup(&[0x6C, 0xFF, 0x02]);
        bus.cpu_write(0x02FF, 0x34);
        bus.cpu_write(0x0300, 0x99); // would be the fixed behaviour
        // $0200 holds 0x6C (the opcode itself) -> high byte 0x6C.
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x6C34);
    }

    #[test]
    fn test_indirect_x_pointer_wraps_in_zero_page() {
        // LDX #$05; LDA ($FE,X) -> pointer at $03/$04
        let (mut cpu, mut bus) = setup(&[0xA2, 0x05, 0xA1, 0xFE]);
        bus.cpu_write(0x0003, 0x20);
        bus.cpu_write(0x0004, 0x02);
        bus.cpu_write(0x0220, 0xAB);
        cpu.emulate(&mut bus).unwrap();
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 6);
        assert_eq!(cpu.a, 0xAB);
    }

    #[test]
    fn test_indirect_y_page_cross() {
        // LDY #$01; LDA ($10),Y with pointer $02FF -> read $0300, 6 cycles
        let (mut cpu, mut bus) = setup(&[0xA0, 0x01, 0xB1, 0x10]);
        bus.cpu_write(0x0010, 0xFF);
        bus.cpu_write(0x0011, 0x02);
        bus.cpu_write(0x0300, 0x5A);
        cpu.emulate(&mut bus).unwrap();
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 6);
        assert_eq!(cpu.a, 0x5A);
    }

    #[test]
    fn test_branch_cycle_penalties() {
        // BNE taken, same page: 3 cycles.
        let (mut cpu, mut bus) = setup(&[0xD0, 0x10]);
        cpu.clear_flag(flags::ZERO);
        assert_eq!(cpu.emulate(&mut bus).unwrap(), 3);
        assert_eq!(cpu.pc, 0x0212);

        // BEQ not taken: 2 cycles.
        let (mut cpu, mut bus) = setup(&[0xF0, 0x10]);
        cpu.clear_flag(flags::ZERO);
        assert_eq!(cpu.emulate(&mut bus).unwrap(), 2);
        assert_eq!(cpu.pc, 0x0202);

        // Taken across a page (backwards): 4 cycles.
        let (mut cpu, mut bus) = setup(&[0x10, 0x80]);
        cpu.clear_flag(flags::NEGATIVE);
        assert_eq!(cpu.emulate(&mut bus).unwrap(), 4);
        assert_eq!(cpu.pc, 0x0182);
    }

    #[test]
    fn test_rmw_dummy_write() {
        // INC $0210: the original value is written back before the result.
        // Observable as the final state being original+1 with 6 cycles.
        let (mut cpu, mut bus) = setup(&[0xEE, 0x10, 0x02]);
        bus.cpu_write(0x0210, 0x41);
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 6);
        assert_eq!(bus.load(0x0210), 0x42);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        // JSR $0220 ... RTS back to $0203.
        let (mut cpu, mut bus) = setup(&[0x20, 0x20, 0x02]);
        bus.cpu_write(0x0220, 0x60); // RTS
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 6);
        assert_eq!(cpu.pc, 0x0220);
        // Return address on the stack is the last instruction byte.
        assert_eq!(bus.load(0x01FD), 0x02);
        assert_eq!(bus.load(0x01FC), 0x02);

        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 6);
        assert_eq!(cpu.pc, 0x0203);
    }

    #[test]
    fn test_jsr_leaves_target_high_on_data_bus() {
        let (mut cpu, mut bus) = setup(&[0x20, 0x20, 0x02]);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.data_bus(), 0x02, "high-byte fetch is the last cycle");
    }

    #[test]
    fn test_brk_pushes_and_vectors() {
        let (mut cpu, mut bus) = setup(&[0x00, 0xFF]);
        bus.test_rom_write(0xFFFE, 0x00);
        bus.test_rom_write(0xFFFF, 0x03);
        cpu.clear_flag(flags::INTERRUPT_DISABLE);
        let cycles = cpu.emulate(&mut bus).unwrap();
        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc, 0x0300, "vectored through $FFFE/$FFFF");
        let pushed_status = bus.load(0x01FB);
        assert_eq!(pushed_status & flags::BREAK, flags::BREAK, "B set for BRK");
        let pushed_pc =
            (bus.load(0x01FD) as u16) << 8 | bus.load(0x01FC) as u16;
        assert_eq!(pushed_pc, 0x0202, "PC+2 from the BRK opcode");
        assert!(cpu.get_flag(flags::INTERRUPT_DISABLE));
    }

    #[test]
    fn test_php_plp_break_handling() {
        let (mut cpu, mut bus) = setup(&[0x08, 0x28]);
        cpu.clear_flag(flags::BREAK);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(
            bus.load(0x01FD) & flags::BREAK,
            flags::BREAK,
            "PHP pushes B set"
        );
        cpu.emulate(&mut bus).unwrap();
        assert!(!cpu.get_flag(flags::BREAK), "PLP does not restore B");
        assert!(cpu.get_flag(flags::UNUSED));
    }

    #[test]
    fn test_invalid_opcode_reports_location() {
        let (mut cpu, mut bus) = setup(&[0x02]);
        match cpu.emulate(&mut bus) {
            Err(CpuError::InvalidOpcode { opcode, pc }) => {
                assert_eq!(opcode, 0x02);
                assert_eq!(pc, 0x0200);
            }
            other => panic!("expected invalid opcode, got {:?}", other),
        }
    }

    #[test]
    fn test_unofficial_lax() {
        let (mut cpu, mut bus) = setup(&[0xA7, 0x42]);
        bus.cpu_write(0x0042, 0x5A);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.x, 0x5A);
    }

    #[test]
    fn test_unofficial_sax() {
        let (mut cpu, mut bus) = setup(&[0x87, 0x42]);
        cpu.a = 0xF0;
        cpu.x = 0x3C;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0042), 0x30);
    }

    #[test]
    fn test_unofficial_dcp() {
        let (mut cpu, mut bus) = setup(&[0xC7, 0x42]);
        bus.cpu_write(0x0042, 0x11);
        cpu.a = 0x10;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0042), 0x10);
        assert!(cpu.get_flag(flags::ZERO), "CMP against decremented value");
        assert!(cpu.get_flag(flags::CARRY));
    }

    #[test]
    fn test_unofficial_isc() {
        let (mut cpu, mut bus) = setup(&[0x38, 0xE7, 0x42]); // SEC; ISC $42
        bus.cpu_write(0x0042, 0x0F);
        cpu.a = 0x20;
        cpu.emulate(&mut bus).unwrap();
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0042), 0x10);
        assert_eq!(cpu.a, 0x10, "SBC of the incremented value");
    }

    #[test]
    fn test_unofficial_slo() {
        let (mut cpu, mut bus) = setup(&[0x07, 0x42]);
        bus.cpu_write(0x0042, 0x81);
        cpu.a = 0x01;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0042), 0x02);
        assert_eq!(cpu.a, 0x03);
        assert!(cpu.get_flag(flags::CARRY), "bit 7 shifted out");
    }

    #[test]
    fn test_unofficial_alr_arr_anc() {
        // ALR #$FF with A=$03 -> A & imm = 3, LSR -> 1, C=1
        let (mut cpu, mut bus) = setup(&[0x4B, 0xFF]);
        cpu.a = 0x03;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.get_flag(flags::CARRY));

        // ANC #$80 with A=$80 -> N and C set
        let (mut cpu, mut bus) = setup(&[0x0B, 0x80]);
        cpu.a = 0x80;
        cpu.emulate(&mut bus).unwrap();
        assert!(cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::NEGATIVE));

        // ARR #$FF with A=$FF, C=1 -> A = $FF >> 1 | $80
        let (mut cpu, mut bus) = setup(&[0x38, 0x6B, 0xFF]);
        cpu.a = 0xFF;
        cpu.emulate(&mut bus).unwrap();
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0xFF);
        assert!(cpu.get_flag(flags::CARRY), "bit 6 of the result");
    }

    #[test]
    fn test_unofficial_axs() {
        let (mut cpu, mut bus) = setup(&[0xCB, 0x02]);
        cpu.a = 0x0F;
        cpu.x = 0x06; // A & X = 6
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.x, 0x04);
        assert!(cpu.get_flag(flags::CARRY), "no borrow");
    }

    #[test]
    fn test_unofficial_ane_lxa_magic_ff() {
        // ANE: A = (A | $FF) & X & imm = X & imm
        let (mut cpu, mut bus) = setup(&[0x8B, 0x0F]);
        cpu.a = 0x00;
        cpu.x = 0x3C;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x0C);

        // LXA: A = X = imm
        let (mut cpu, mut bus) = setup(&[0xAB, 0x5A]);
        cpu.a = 0x00;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.x, 0x5A);
    }

    #[test]
    fn test_unofficial_lae() {
        let (mut cpu, mut bus) = setup(&[0xBB, 0x42, 0x00]); // LAE $0042,Y
        cpu.sp = 0xF0;
        cpu.y = 0;
        bus.cpu_write(0x0042, 0xFF);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.a, 0xF0);
        assert_eq!(cpu.x, 0xF0);
        assert_eq!(cpu.sp, 0xF0);
    }

    #[test]
    fn test_unofficial_shy_masks_with_high_plus_one() {
        // SHY $0210,X with X=0: stores Y & ($02 + 1).
        let (mut cpu, mut bus) = setup(&[0x9C, 0x10, 0x02]);
        cpu.y = 0xFF;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.load(0x0210), 0x03);
    }

    #[test]
    fn test_unofficial_shs_sets_sp() {
        let (mut cpu, mut bus) = setup(&[0x9B, 0x10, 0x02]); // SHS $0210,Y
        cpu.a = 0xF3;
        cpu.x = 0x5F;
        cpu.y = 0;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(cpu.sp, 0x53, "SP = A & X");
        assert_eq!(bus.load(0x0210), 0x53 & 0x03);
    }

    #[test]
    fn test_data_bus_tracks_every_cycle() {
        // After LDA #$42 the last bus activity is the operand fetch.
        let (mut cpu, mut bus) = setup(&[0xA9, 0x42]);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.data_bus(), 0x42);

        // After STA $0210 the write value is on the bus.
        let (mut cpu, mut bus) = setup(&[0x8D, 0x10, 0x02]);
        cpu.a = 0x7E;
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.data_bus(), 0x7E);
    }

    #[test]
    fn test_instruction_counts_bus_cycles() {
        // LDA $0210 performs 4 bus cycles: opcode, two operands, read.
        let (mut cpu, mut bus) = setup(&[0xAD, 0x10, 0x02]);
        cpu.emulate(&mut bus).unwrap();
        assert_eq!(bus.instr_bus_cycles(), 4);
    }
}
