//! Opcode decoding.
//!
//! Both tables are split into the usual `x` (bits 6-7), `y` (bits 3-5) and
//! `z` (bits 0-2) fields, with `y` further split into `p` (bits 4-5) and `q`
//! (bit 3). Decoding is total: every byte maps to an [`Instruction`], the
//! eleven holes in the primary table map to [`Instruction::Illegal`].
//! Immediate operands are not part of the decoded value; the CPU fetches them
//! while executing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// 8-bit operand as selected by a 3-bit register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Register(Register),
    IndirectHl,
    /// The byte following the opcode.
    Immediate,
}

impl Operand8 {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Register(Register::B),
            1 => Self::Register(Register::C),
            2 => Self::Register(Register::D),
            3 => Self::Register(Register::E),
            4 => Self::Register(Register::H),
            5 => Self::Register(Register::L),
            6 => Self::IndirectHl,
            _ => Self::Register(Register::A),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
}

impl Operand16 {
    /// `rp[p]` table: BC, DE, HL, SP.
    fn from_p_sp(p: u8) -> Self {
        match p & 0x03 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Sp,
        }
    }

    /// `rp2[p]` table used by PUSH/POP: BC, DE, HL, AF.
    fn from_p_af(p: u8) -> Self {
        match p & 0x03 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Af,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticLogic {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl ArithmeticLogic {
    fn from_y(y: u8) -> Self {
        match y & 0x07 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Cp,
        }
    }
}

/// CB-prefix rotate and shift operations, also used by RLCA/RRCA/RLA/RRA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateShift {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl RotateShift {
    fn from_y(y: u8) -> Self {
        match y & 0x07 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Rl,
            3 => Self::Rr,
            4 => Self::Sla,
            5 => Self::Sra,
            6 => Self::Swap,
            _ => Self::Srl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    NonZero,
    Zero,
    NonCarry,
    Carry,
}

impl Condition {
    fn from_y(y: u8) -> Self {
        match y & 0x03 {
            0 => Self::NonZero,
            1 => Self::Zero,
            2 => Self::NonCarry,
            _ => Self::Carry,
        }
    }
}

/// Memory operand of `LD (rr),A` / `LD A,(rr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    Bc,
    De,
    HlInc,
    HlDec,
}

impl Indirect {
    fn from_p(p: u8) -> Self {
        match p & 0x03 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::HlInc,
            _ => Self::HlDec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    Daa,
    Cpl,
    Scf,
    Ccf,
    /// LD rr,nn
    LoadImm16(Operand16),
    /// LD (nn),SP
    StoreSp,
    /// ADD HL,rr
    AddHl(Operand16),
    /// LD (rr),A
    StoreA(Indirect),
    /// LD A,(rr)
    LoadA(Indirect),
    Inc16(Operand16),
    Dec16(Operand16),
    Inc8(Operand8),
    Dec8(Operand8),
    /// LD dst,src including LD r,n
    Load(Operand8, Operand8),
    /// RLCA, RRCA, RLA, RRA: like the CB forms but Z is always cleared
    RotateA(RotateShift),
    Jr(Condition),
    Jp(Condition),
    JpHl,
    Call(Condition),
    Ret(Condition),
    Reti,
    Rst(u8),
    Push(Operand16),
    Pop(Operand16),
    ArithmeticLogic8(ArithmeticLogic, Operand8),
    /// LDH (n),A
    StoreHighImm,
    /// LDH A,(n)
    LoadHighImm,
    /// LD (FF00+C),A
    StoreHighC,
    /// LD A,(FF00+C)
    LoadHighC,
    /// LD (nn),A
    StoreAbs,
    /// LD A,(nn)
    LoadAbs,
    /// ADD SP,e
    AddSp,
    /// LD HL,SP+e
    LoadHlSpOffset,
    /// LD SP,HL
    LoadSpHl,
    /// 0xCB; the next byte is decoded with [`decode_cb`].
    Prefix,
    RotateShift(RotateShift, Operand8),
    Bit(u8, Operand8),
    Res(u8, Operand8),
    Set(u8, Operand8),
    /// Unused opcode; locks the CPU when executed.
    Illegal(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fields {
    x: u8,
    y: u8,
    z: u8,
    p: u8,
    q: u8,
}

impl Fields {
    const fn split(op: u8) -> Self {
        let y = (op >> 3) & 0x07;
        Self {
            x: op >> 6,
            y,
            z: op & 0x07,
            p: y >> 1,
            q: y & 0x01,
        }
    }
}

/// Decode a primary-table opcode.
pub fn decode(op: u8) -> Instruction {
    use Instruction::*;

    let Fields { x, y, z, p, q } = Fields::split(op);
    match (x, z) {
        (0, 0) => match y {
            0 => Nop,
            1 => StoreSp,
            2 => Stop,
            3 => Jr(Condition::Always),
            _ => Jr(Condition::from_y(y - 4)),
        },
        (0, 1) if q == 0 => LoadImm16(Operand16::from_p_sp(p)),
        (0, 1) => AddHl(Operand16::from_p_sp(p)),
        (0, 2) if q == 0 => StoreA(Indirect::from_p(p)),
        (0, 2) => LoadA(Indirect::from_p(p)),
        (0, 3) if q == 0 => Inc16(Operand16::from_p_sp(p)),
        (0, 3) => Dec16(Operand16::from_p_sp(p)),
        (0, 4) => Inc8(Operand8::from_bits(y)),
        (0, 5) => Dec8(Operand8::from_bits(y)),
        (0, 6) => Load(Operand8::from_bits(y), Operand8::Immediate),
        (0, _) => match y {
            0 => RotateA(self::RotateShift::Rlc),
            1 => RotateA(self::RotateShift::Rrc),
            2 => RotateA(self::RotateShift::Rl),
            3 => RotateA(self::RotateShift::Rr),
            4 => Daa,
            5 => Cpl,
            6 => Scf,
            _ => Ccf,
        },
        (1, 6) if y == 6 => Halt,
        (1, _) => Load(Operand8::from_bits(y), Operand8::from_bits(z)),
        (2, _) => ArithmeticLogic8(ArithmeticLogic::from_y(y), Operand8::from_bits(z)),
        (_, 0) => match y {
            0..=3 => Ret(Condition::from_y(y)),
            4 => StoreHighImm,
            5 => AddSp,
            6 => LoadHighImm,
            _ => LoadHlSpOffset,
        },
        (_, 1) if q == 0 => Pop(Operand16::from_p_af(p)),
        (_, 1) => match p {
            0 => Ret(Condition::Always),
            1 => Reti,
            2 => JpHl,
            _ => LoadSpHl,
        },
        (_, 2) => match y {
            0..=3 => Jp(Condition::from_y(y)),
            4 => StoreHighC,
            5 => StoreAbs,
            6 => LoadHighC,
            _ => LoadAbs,
        },
        (_, 3) => match y {
            0 => Jp(Condition::Always),
            1 => Prefix,
            6 => Di,
            7 => Ei,
            _ => Illegal(op),
        },
        (_, 4) => match y {
            0..=3 => Call(Condition::from_y(y)),
            _ => Illegal(op),
        },
        (_, 5) if q == 0 => Push(Operand16::from_p_af(p)),
        (_, 5) if p == 0 => Call(Condition::Always),
        (_, 5) => Illegal(op),
        (_, 6) => ArithmeticLogic8(ArithmeticLogic::from_y(y), Operand8::Immediate),
        _ => Rst(y * 8),
    }
}

/// Decode the byte following a 0xCB prefix.
pub fn decode_cb(op: u8) -> Instruction {
    let Fields { x, y, z, .. } = Fields::split(op);
    let operand = Operand8::from_bits(z);
    match x {
        0 => Instruction::RotateShift(RotateShift::from_y(y), operand),
        1 => Instruction::Bit(y, operand),
        2 => Instruction::Res(y, operand),
        _ => Instruction::Set(y, operand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ILLEGAL: [u8; 11] = [
        0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
    ];

    #[test]
    fn only_the_eleven_holes_are_illegal() {
        for op in 0..=255u8 {
            let illegal = matches!(decode(op), Instruction::Illegal(_));
            assert_eq!(illegal, ILLEGAL.contains(&op), "opcode {op:02X}");
        }
    }

    #[test]
    fn spot_checks_primary_table() {
        use Instruction::*;
        assert_eq!(decode(0x00), Nop);
        assert_eq!(decode(0x08), StoreSp);
        assert_eq!(decode(0x18), Jr(Condition::Always));
        assert_eq!(decode(0x38), Jr(Condition::Carry));
        assert_eq!(decode(0x31), LoadImm16(Operand16::Sp));
        assert_eq!(decode(0x3A), LoadA(Indirect::HlDec));
        assert_eq!(
            decode(0x3E),
            Load(Operand8::Register(Register::A), Operand8::Immediate)
        );
        assert_eq!(
            decode(0x36),
            Load(Operand8::IndirectHl, Operand8::Immediate)
        );
        assert_eq!(decode(0x76), Halt);
        assert_eq!(
            decode(0x70),
            Load(Operand8::IndirectHl, Operand8::Register(Register::B))
        );
        assert_eq!(
            decode(0xBE),
            ArithmeticLogic8(ArithmeticLogic::Cp, Operand8::IndirectHl)
        );
        assert_eq!(decode(0xC9), Ret(Condition::Always));
        assert_eq!(decode(0xD9), Reti);
        assert_eq!(decode(0xE9), JpHl);
        assert_eq!(decode(0xF1), Pop(Operand16::Af));
        assert_eq!(decode(0xF5), Push(Operand16::Af));
        assert_eq!(decode(0xCD), Call(Condition::Always));
        assert_eq!(decode(0xCB), Prefix);
        assert_eq!(
            decode(0xEE),
            ArithmeticLogic8(ArithmeticLogic::Xor, Operand8::Immediate)
        );
        assert_eq!(decode(0x07), RotateA(super::RotateShift::Rlc));
        assert_eq!(decode(0x1F), RotateA(super::RotateShift::Rr));
        assert_eq!(decode(0xFF), Rst(0x38));
        assert_eq!(decode(0xF8), LoadHlSpOffset);
        assert_eq!(decode(0xE8), AddSp);
    }

    #[test]
    fn cb_table_is_regular() {
        assert_eq!(
            decode_cb(0x37),
            Instruction::RotateShift(RotateShift::Swap, Operand8::Register(Register::A))
        );
        assert_eq!(decode_cb(0x7E), Instruction::Bit(7, Operand8::IndirectHl));
        assert_eq!(
            decode_cb(0x80),
            Instruction::Res(0, Operand8::Register(Register::B))
        );
        assert_eq!(
            decode_cb(0xFF),
            Instruction::Set(7, Operand8::Register(Register::A))
        );
    }
}
