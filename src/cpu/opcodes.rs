// Opcode table - flat dispatch array for the 6502 interpreter
//
// Each slot is an `OpEntry { op, mode, bytes, cycles, page_penalty }`.
// `cycles` is the base count; `page_penalty` marks loads that pay one
// extra cycle when an indexed access crosses a page. Branch penalties are
// applied by the interpreter. Slots with `Op::Invalid` are the halting
// opcodes; fetching one raises an invalid-opcode error.
//
// The unofficial instructions carried here are the documented set:
// ALR, ANC, ARR, AXS, LAX, SAX, DCP, ISC, RLA, RRA, SLO, SRE, the
// immediate/absolute NOP variants (SKB/IGN), SHA, SHS, SHY, SHX, LAE,
// ANE, LXA, the duplicate implied NOPs, and SBC $EB.

/// Instruction mnemonics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Official
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Unofficial
    Alr, Anc, Ane, Arr, Axs, Dcp, Ign, Isc, Lae, Lax, Lxa, Rla, Rra, Sax,
    Sha, Shs, Shx, Shy, Skb, Slo, Sre,
    /// Unmapped slot; raises an invalid-opcode error
    Invalid,
}

/// Addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

/// One dispatch-table entry
#[derive(Debug, Clone, Copy)]
pub struct OpEntry {
    pub op: Op,
    pub mode: AddrMode,
    pub bytes: u8,
    pub cycles: u8,
    /// Pay one extra cycle on an indexed page crossing
    pub page_penalty: bool,
}

const fn entry(op: Op, mode: AddrMode, bytes: u8, cycles: u8) -> OpEntry {
    OpEntry {
        op,
        mode,
        bytes,
        cycles,
        page_penalty: false,
    }
}

/// Entry for a load that pays the page-crossing cycle
const fn entry_p(op: Op, mode: AddrMode, bytes: u8, cycles: u8) -> OpEntry {
    OpEntry {
        op,
        mode,
        bytes,
        cycles,
        page_penalty: true,
    }
}

const INVALID: OpEntry = entry(Op::Invalid, AddrMode::Implied, 1, 0);

use AddrMode::*;
use Op::*;

/// The 256-entry dispatch table, indexed by opcode
pub const OPCODES: [OpEntry; 256] = [
    // 0x00
    entry(Brk, Implied, 1, 7),
    entry(Ora, IndirectX, 2, 6),
    INVALID,
    entry(Slo, IndirectX, 2, 8),
    entry(Ign, ZeroPage, 2, 3),
    entry(Ora, ZeroPage, 2, 3),
    entry(Asl, ZeroPage, 2, 5),
    entry(Slo, ZeroPage, 2, 5),
    entry(Php, Implied, 1, 3),
    entry(Ora, Immediate, 2, 2),
    entry(Asl, Accumulator, 1, 2),
    entry(Anc, Immediate, 2, 2),
    entry(Ign, Absolute, 3, 4),
    entry(Ora, Absolute, 3, 4),
    entry(Asl, Absolute, 3, 6),
    entry(Slo, Absolute, 3, 6),
    // 0x10
    entry(Bpl, Relative, 2, 2),
    entry_p(Ora, IndirectY, 2, 5),
    INVALID,
    entry(Slo, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(Ora, ZeroPageX, 2, 4),
    entry(Asl, ZeroPageX, 2, 6),
    entry(Slo, ZeroPageX, 2, 6),
    entry(Clc, Implied, 1, 2),
    entry_p(Ora, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Slo, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(Ora, AbsoluteX, 3, 4),
    entry(Asl, AbsoluteX, 3, 7),
    entry(Slo, AbsoluteX, 3, 7),
    // 0x20
    entry(Jsr, Absolute, 3, 6),
    entry(And, IndirectX, 2, 6),
    INVALID,
    entry(Rla, IndirectX, 2, 8),
    entry(Bit, ZeroPage, 2, 3),
    entry(And, ZeroPage, 2, 3),
    entry(Rol, ZeroPage, 2, 5),
    entry(Rla, ZeroPage, 2, 5),
    entry(Plp, Implied, 1, 4),
    entry(And, Immediate, 2, 2),
    entry(Rol, Accumulator, 1, 2),
    entry(Anc, Immediate, 2, 2),
    entry(Bit, Absolute, 3, 4),
    entry(And, Absolute, 3, 4),
    entry(Rol, Absolute, 3, 6),
    entry(Rla, Absolute, 3, 6),
    // 0x30
    entry(Bmi, Relative, 2, 2),
    entry_p(And, IndirectY, 2, 5),
    INVALID,
    entry(Rla, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(And, ZeroPageX, 2, 4),
    entry(Rol, ZeroPageX, 2, 6),
    entry(Rla, ZeroPageX, 2, 6),
    entry(Sec, Implied, 1, 2),
    entry_p(And, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Rla, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(And, AbsoluteX, 3, 4),
    entry(Rol, AbsoluteX, 3, 7),
    entry(Rla, AbsoluteX, 3, 7),
    // 0x40
    entry(Rti, Implied, 1, 6),
    entry(Eor, IndirectX, 2, 6),
    INVALID,
    entry(Sre, IndirectX, 2, 8),
    entry(Ign, ZeroPage, 2, 3),
    entry(Eor, ZeroPage, 2, 3),
    entry(Lsr, ZeroPage, 2, 5),
    entry(Sre, ZeroPage, 2, 5),
    entry(Pha, Implied, 1, 3),
    entry(Eor, Immediate, 2, 2),
    entry(Lsr, Accumulator, 1, 2),
    entry(Alr, Immediate, 2, 2),
    entry(Jmp, Absolute, 3, 3),
    entry(Eor, Absolute, 3, 4),
    entry(Lsr, Absolute, 3, 6),
    entry(Sre, Absolute, 3, 6),
    // 0x50
    entry(Bvc, Relative, 2, 2),
    entry_p(Eor, IndirectY, 2, 5),
    INVALID,
    entry(Sre, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(Eor, ZeroPageX, 2, 4),
    entry(Lsr, ZeroPageX, 2, 6),
    entry(Sre, ZeroPageX, 2, 6),
    entry(Cli, Implied, 1, 2),
    entry_p(Eor, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Sre, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(Eor, AbsoluteX, 3, 4),
    entry(Lsr, AbsoluteX, 3, 7),
    entry(Sre, AbsoluteX, 3, 7),
    // 0x60
    entry(Rts, Implied, 1, 6),
    entry(Adc, IndirectX, 2, 6),
    INVALID,
    entry(Rra, IndirectX, 2, 8),
    entry(Ign, ZeroPage, 2, 3),
    entry(Adc, ZeroPage, 2, 3),
    entry(Ror, ZeroPage, 2, 5),
    entry(Rra, ZeroPage, 2, 5),
    entry(Pla, Implied, 1, 4),
    entry(Adc, Immediate, 2, 2),
    entry(Ror, Accumulator, 1, 2),
    entry(Arr, Immediate, 2, 2),
    entry(Jmp, Indirect, 3, 5),
    entry(Adc, Absolute, 3, 4),
    entry(Ror, Absolute, 3, 6),
    entry(Rra, Absolute, 3, 6),
    // 0x70
    entry(Bvs, Relative, 2, 2),
    entry_p(Adc, IndirectY, 2, 5),
    INVALID,
    entry(Rra, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(Adc, ZeroPageX, 2, 4),
    entry(Ror, ZeroPageX, 2, 6),
    entry(Rra, ZeroPageX, 2, 6),
    entry(Sei, Implied, 1, 2),
    entry_p(Adc, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Rra, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(Adc, AbsoluteX, 3, 4),
    entry(Ror, AbsoluteX, 3, 7),
    entry(Rra, AbsoluteX, 3, 7),
    // 0x80
    entry(Skb, Immediate, 2, 2),
    entry(Sta, IndirectX, 2, 6),
    entry(Skb, Immediate, 2, 2),
    entry(Sax, IndirectX, 2, 6),
    entry(Sty, ZeroPage, 2, 3),
    entry(Sta, ZeroPage, 2, 3),
    entry(Stx, ZeroPage, 2, 3),
    entry(Sax, ZeroPage, 2, 3),
    entry(Dey, Implied, 1, 2),
    entry(Skb, Immediate, 2, 2),
    entry(Txa, Implied, 1, 2),
    entry(Ane, Immediate, 2, 2),
    entry(Sty, Absolute, 3, 4),
    entry(Sta, Absolute, 3, 4),
    entry(Stx, Absolute, 3, 4),
    entry(Sax, Absolute, 3, 4),
    // 0x90
    entry(Bcc, Relative, 2, 2),
    entry(Sta, IndirectY, 2, 6),
    INVALID,
    entry(Sha, IndirectY, 2, 6),
    entry(Sty, ZeroPageX, 2, 4),
    entry(Sta, ZeroPageX, 2, 4),
    entry(Stx, ZeroPageY, 2, 4),
    entry(Sax, ZeroPageY, 2, 4),
    entry(Tya, Implied, 1, 2),
    entry(Sta, AbsoluteY, 3, 5),
    entry(Txs, Implied, 1, 2),
    entry(Shs, AbsoluteY, 3, 5),
    entry(Shy, AbsoluteX, 3, 5),
    entry(Sta, AbsoluteX, 3, 5),
    entry(Shx, AbsoluteY, 3, 5),
    entry(Sha, AbsoluteY, 3, 5),
    // 0xA0
    entry(Ldy, Immediate, 2, 2),
    entry(Lda, IndirectX, 2, 6),
    entry(Ldx, Immediate, 2, 2),
    entry(Lax, IndirectX, 2, 6),
    entry(Ldy, ZeroPage, 2, 3),
    entry(Lda, ZeroPage, 2, 3),
    entry(Ldx, ZeroPage, 2, 3),
    entry(Lax, ZeroPage, 2, 3),
    entry(Tay, Implied, 1, 2),
    entry(Lda, Immediate, 2, 2),
    entry(Tax, Implied, 1, 2),
    entry(Lxa, Immediate, 2, 2),
    entry(Ldy, Absolute, 3, 4),
    entry(Lda, Absolute, 3, 4),
    entry(Ldx, Absolute, 3, 4),
    entry(Lax, Absolute, 3, 4),
    // 0xB0
    entry(Bcs, Relative, 2, 2),
    entry_p(Lda, IndirectY, 2, 5),
    INVALID,
    entry_p(Lax, IndirectY, 2, 5),
    entry(Ldy, ZeroPageX, 2, 4),
    entry(Lda, ZeroPageX, 2, 4),
    entry(Ldx, ZeroPageY, 2, 4),
    entry(Lax, ZeroPageY, 2, 4),
    entry(Clv, Implied, 1, 2),
    entry_p(Lda, AbsoluteY, 3, 4),
    entry(Tsx, Implied, 1, 2),
    entry_p(Lae, AbsoluteY, 3, 4),
    entry_p(Ldy, AbsoluteX, 3, 4),
    entry_p(Lda, AbsoluteX, 3, 4),
    entry_p(Ldx, AbsoluteY, 3, 4),
    entry_p(Lax, AbsoluteY, 3, 4),
    // 0xC0
    entry(Cpy, Immediate, 2, 2),
    entry(Cmp, IndirectX, 2, 6),
    entry(Skb, Immediate, 2, 2),
    entry(Dcp, IndirectX, 2, 8),
    entry(Cpy, ZeroPage, 2, 3),
    entry(Cmp, ZeroPage, 2, 3),
    entry(Dec, ZeroPage, 2, 5),
    entry(Dcp, ZeroPage, 2, 5),
    entry(Iny, Implied, 1, 2),
    entry(Cmp, Immediate, 2, 2),
    entry(Dex, Implied, 1, 2),
    entry(Axs, Immediate, 2, 2),
    entry(Cpy, Absolute, 3, 4),
    entry(Cmp, Absolute, 3, 4),
    entry(Dec, Absolute, 3, 6),
    entry(Dcp, Absolute, 3, 6),
    // 0xD0
    entry(Bne, Relative, 2, 2),
    entry_p(Cmp, IndirectY, 2, 5),
    INVALID,
    entry(Dcp, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(Cmp, ZeroPageX, 2, 4),
    entry(Dec, ZeroPageX, 2, 6),
    entry(Dcp, ZeroPageX, 2, 6),
    entry(Cld, Implied, 1, 2),
    entry_p(Cmp, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Dcp, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(Cmp, AbsoluteX, 3, 4),
    entry(Dec, AbsoluteX, 3, 7),
    entry(Dcp, AbsoluteX, 3, 7),
    // 0xE0
    entry(Cpx, Immediate, 2, 2),
    entry(Sbc, IndirectX, 2, 6),
    entry(Skb, Immediate, 2, 2),
    entry(Isc, IndirectX, 2, 8),
    entry(Cpx, ZeroPage, 2, 3),
    entry(Sbc, ZeroPage, 2, 3),
    entry(Inc, ZeroPage, 2, 5),
    entry(Isc, ZeroPage, 2, 5),
    entry(Inx, Implied, 1, 2),
    entry(Sbc, Immediate, 2, 2),
    entry(Nop, Implied, 1, 2),
    entry(Sbc, Immediate, 2, 2), // unofficial SBC $EB
    entry(Cpx, Absolute, 3, 4),
    entry(Sbc, Absolute, 3, 4),
    entry(Inc, Absolute, 3, 6),
    entry(Isc, Absolute, 3, 6),
    // 0xF0
    entry(Beq, Relative, 2, 2),
    entry_p(Sbc, IndirectY, 2, 5),
    INVALID,
    entry(Isc, IndirectY, 2, 8),
    entry(Ign, ZeroPageX, 2, 4),
    entry(Sbc, ZeroPageX, 2, 4),
    entry(Inc, ZeroPageX, 2, 6),
    entry(Isc, ZeroPageX, 2, 6),
    entry(Sed, Implied, 1, 2),
    entry_p(Sbc, AbsoluteY, 3, 4),
    entry(Nop, Implied, 1, 2),
    entry(Isc, AbsoluteY, 3, 7),
    entry_p(Ign, AbsoluteX, 3, 4),
    entry_p(Sbc, AbsoluteX, 3, 4),
    entry(Inc, AbsoluteX, 3, 7),
    entry(Isc, AbsoluteX, 3, 7),
];

impl Op {
    /// Whether this instruction only stores (indexed modes always issue
    /// the partial-address dummy read)
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Op::Sta | Op::Stx | Op::Sty | Op::Sax | Op::Sha | Op::Shs | Op::Shx | Op::Shy
        )
    }

    /// Whether this instruction is read-modify-write (dummy write of the
    /// original value before the modified one)
    pub fn is_rmw(self) -> bool {
        matches!(
            self,
            Op::Asl
                | Op::Lsr
                | Op::Rol
                | Op::Ror
                | Op::Inc
                | Op::Dec
                | Op::Slo
                | Op::Sre
                | Op::Rla
                | Op::Rra
                | Op::Dcp
                | Op::Isc
        )
    }
}
