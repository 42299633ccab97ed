//! Flag arithmetic for the 8-bit and 16-bit ALU operations.
//!
//! Every function is pure: it takes operands plus the incoming flags and
//! returns the result together with the outgoing flags. Flags an operation
//! does not touch are carried over from the input.

use crate::decode::{ArithmeticLogic, RotateShift};

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
    pub h: bool,
    pub c: bool,
}

impl Flags {
    pub const fn from_byte(f: u8) -> Self {
        Self {
            z: f & FLAG_Z != 0,
            n: f & FLAG_N != 0,
            h: f & FLAG_H != 0,
            c: f & FLAG_C != 0,
        }
    }

    /// Packed F register value; the low nibble is always zero.
    pub const fn to_byte(self) -> u8 {
        (if self.z { FLAG_Z } else { 0 })
            | (if self.n { FLAG_N } else { 0 })
            | (if self.h { FLAG_H } else { 0 })
            | (if self.c { FLAG_C } else { 0 })
    }
}

/// ADD/ADC/SUB/SBC/AND/XOR/OR/CP. For CP the returned value is `a`.
pub fn alu8(op: ArithmeticLogic, a: u8, b: u8, flags: Flags) -> (u8, Flags) {
    let carry_in = flags.c as u8;
    match op {
        ArithmeticLogic::Add | ArithmeticLogic::Adc => {
            let cin = if op == ArithmeticLogic::Adc {
                carry_in
            } else {
                0
            };
            let wide = a as u16 + b as u16 + cin as u16;
            let r = wide as u8;
            let f = Flags {
                z: r == 0,
                n: false,
                h: (a & 0x0F) + (b & 0x0F) + cin > 0x0F,
                c: wide > 0xFF,
            };
            (r, f)
        }
        ArithmeticLogic::Sub | ArithmeticLogic::Sbc | ArithmeticLogic::Cp => {
            let cin = if op == ArithmeticLogic::Sbc {
                carry_in
            } else {
                0
            };
            let r = a.wrapping_sub(b).wrapping_sub(cin);
            let f = Flags {
                z: r == 0,
                n: true,
                h: (a & 0x0F) < (b & 0x0F) + cin,
                c: (a as u16) < b as u16 + cin as u16,
            };
            if op == ArithmeticLogic::Cp {
                (a, f)
            } else {
                (r, f)
            }
        }
        ArithmeticLogic::And => {
            let r = a & b;
            (
                r,
                Flags {
                    z: r == 0,
                    n: false,
                    h: true,
                    c: false,
                },
            )
        }
        ArithmeticLogic::Xor | ArithmeticLogic::Or => {
            let r = if op == ArithmeticLogic::Xor {
                a ^ b
            } else {
                a | b
            };
            (
                r,
                Flags {
                    z: r == 0,
                    ..Flags::default()
                },
            )
        }
    }
}

/// INC r: carry untouched.
pub fn inc8(v: u8, flags: Flags) -> (u8, Flags) {
    let r = v.wrapping_add(1);
    (
        r,
        Flags {
            z: r == 0,
            n: false,
            h: v & 0x0F == 0x0F,
            c: flags.c,
        },
    )
}

/// DEC r: carry untouched.
pub fn dec8(v: u8, flags: Flags) -> (u8, Flags) {
    let r = v.wrapping_sub(1);
    (
        r,
        Flags {
            z: r == 0,
            n: true,
            h: v & 0x0F == 0,
            c: flags.c,
        },
    )
}

/// ADD HL,rr: half carry from bit 11, carry from bit 15, zero untouched.
pub fn add16_hl(hl: u16, rr: u16, flags: Flags) -> (u16, Flags) {
    let (r, carry) = hl.overflowing_add(rr);
    (
        r,
        Flags {
            z: flags.z,
            n: false,
            h: (hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF,
            c: carry,
        },
    )
}

/// ADD SP,e and LD HL,SP+e: flags come from the unsigned low-byte add.
pub fn add_sp_offset(sp: u16, offset: i8) -> (u16, Flags) {
    let unsigned = offset as u8 as u16;
    let r = sp.wrapping_add_signed(offset as i16);
    (
        r,
        Flags {
            z: false,
            n: false,
            h: (sp & 0x000F) + (unsigned & 0x000F) > 0x000F,
            c: (sp & 0x00FF) + unsigned > 0x00FF,
        },
    )
}

/// CB rotate/shift/swap. Z reflects the result.
pub fn rotate_shift(op: RotateShift, v: u8, flags: Flags) -> (u8, Flags) {
    let carry_in = flags.c as u8;
    let (r, c) = match op {
        RotateShift::Rlc => (v.rotate_left(1), v & 0x80 != 0),
        RotateShift::Rrc => (v.rotate_right(1), v & 0x01 != 0),
        RotateShift::Rl => ((v << 1) | carry_in, v & 0x80 != 0),
        RotateShift::Rr => ((v >> 1) | (carry_in << 7), v & 0x01 != 0),
        RotateShift::Sla => (v << 1, v & 0x80 != 0),
        RotateShift::Sra => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
        RotateShift::Swap => (v.rotate_left(4), false),
        RotateShift::Srl => (v >> 1, v & 0x01 != 0),
    };
    (
        r,
        Flags {
            z: r == 0,
            n: false,
            h: false,
            c,
        },
    )
}

/// BIT n,r: carry untouched, no result.
pub fn bit(n: u8, v: u8, flags: Flags) -> Flags {
    Flags {
        z: v & (1 << (n & 0x07)) == 0,
        n: false,
        h: true,
        c: flags.c,
    }
}

/// Decimal adjust after an 8-bit BCD add or subtract.
pub fn daa(a: u8, flags: Flags) -> (u8, Flags) {
    let mut adjust = 0u8;
    let mut carry = flags.c;
    if flags.n {
        if flags.h {
            adjust |= 0x06;
        }
        if flags.c {
            adjust |= 0x60;
        }
        let r = a.wrapping_sub(adjust);
        return (
            r,
            Flags {
                z: r == 0,
                n: true,
                h: false,
                c: carry,
            },
        );
    }
    if flags.h || a & 0x0F > 0x09 {
        adjust |= 0x06;
    }
    if flags.c || a > 0x99 {
        adjust |= 0x60;
        carry = true;
    }
    let r = a.wrapping_add(adjust);
    (
        r,
        Flags {
            z: r == 0,
            n: false,
            h: false,
            c: carry,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPS: [ArithmeticLogic; 8] = [
        ArithmeticLogic::Add,
        ArithmeticLogic::Adc,
        ArithmeticLogic::Sub,
        ArithmeticLogic::Sbc,
        ArithmeticLogic::And,
        ArithmeticLogic::Xor,
        ArithmeticLogic::Or,
        ArithmeticLogic::Cp,
    ];

    /// Reference model using signed wide integers.
    fn reference(op: ArithmeticLogic, a: u8, b: u8, c: bool) -> (u8, Flags) {
        let (a, b, c) = (a as i32, b as i32, c as i32);
        let (r, n, h, carry) = match op {
            ArithmeticLogic::Add => (a + b, false, (a % 16) + (b % 16) >= 16, a + b >= 256),
            ArithmeticLogic::Adc => (
                a + b + c,
                false,
                (a % 16) + (b % 16) + c >= 16,
                a + b + c >= 256,
            ),
            ArithmeticLogic::Sub | ArithmeticLogic::Cp => {
                (a - b, true, (a % 16) - (b % 16) < 0, a - b < 0)
            }
            ArithmeticLogic::Sbc => {
                (a - b - c, true, (a % 16) - (b % 16) - c < 0, a - b - c < 0)
            }
            ArithmeticLogic::And => (a & b, false, true, false),
            ArithmeticLogic::Xor => (a ^ b, false, false, false),
            ArithmeticLogic::Or => (a | b, false, false, false),
        };
        let byte = r.rem_euclid(256) as u8;
        let flags = Flags {
            z: byte == 0,
            n,
            h,
            c: carry,
        };
        if op == ArithmeticLogic::Cp {
            (a as u8, flags)
        } else {
            (byte, flags)
        }
    }

    #[test]
    fn alu8_matches_reference_for_all_operands() {
        for op in OPS {
            for a in 0..=255u8 {
                for b in 0..=255u8 {
                    for carry in [false, true] {
                        let flags = Flags {
                            c: carry,
                            ..Flags::default()
                        };
                        assert_eq!(
                            alu8(op, a, b, flags),
                            reference(op, a, b, carry),
                            "{op:?} a={a:02X} b={b:02X} c={carry}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn inc_dec_preserve_carry() {
        for v in 0..=255u8 {
            for carry in [false, true] {
                let flags = Flags {
                    c: carry,
                    ..Flags::default()
                };
                let (r, f) = inc8(v, flags);
                assert_eq!(r, v.wrapping_add(1));
                assert_eq!(f.h, (v as u32 % 16) + 1 >= 16);
                assert_eq!(f.c, carry);
                assert!(!f.n);

                let (r, f) = dec8(v, flags);
                assert_eq!(r, v.wrapping_sub(1));
                assert_eq!(f.h, (v as i32 % 16) - 1 < 0);
                assert_eq!(f.c, carry);
                assert!(f.n);
            }
        }
    }

    #[test]
    fn add16_half_carry_from_bit_11() {
        let zero = Flags {
            z: true,
            ..Flags::default()
        };
        let (r, f) = add16_hl(0x0FFF, 0x0001, zero);
        assert_eq!(r, 0x1000);
        assert!(f.h && !f.c && f.z);
        let (r, f) = add16_hl(0xFFFF, 0x0001, Flags::default());
        assert_eq!(r, 0);
        assert!(f.h && f.c && !f.z);
    }

    #[test]
    fn sp_offset_flags_use_low_byte() {
        let (r, f) = add_sp_offset(0x00FF, 1);
        assert_eq!(r, 0x0100);
        assert!(f.h && f.c);
        let (r, f) = add_sp_offset(0x0100, -1);
        assert_eq!(r, 0x00FF);
        assert!(!f.h && !f.c);
        let (r, f) = add_sp_offset(0xFFF8, 8);
        assert_eq!(r, 0x0000);
        assert!(f.h && f.c && !f.z);
    }

    #[test]
    fn rotates_distinguish_circular_and_through_carry() {
        let set = Flags {
            c: true,
            ..Flags::default()
        };
        assert_eq!(
            rotate_shift(RotateShift::Rlc, 0x80, Flags::default()).0,
            0x01
        );
        let zero_carry = Flags {
            z: true,
            c: true,
            ..Flags::default()
        };
        assert_eq!(
            rotate_shift(RotateShift::Rl, 0x80, Flags::default()),
            (0x00, zero_carry)
        );
        assert_eq!(rotate_shift(RotateShift::Rl, 0x00, set).0, 0x01);
        assert_eq!(rotate_shift(RotateShift::Rr, 0x00, set).0, 0x80);
        assert_eq!(
            rotate_shift(RotateShift::Rrc, 0x01, Flags::default()).0,
            0x80
        );
        assert_eq!(
            rotate_shift(RotateShift::Sra, 0x81, Flags::default()),
            (0xC0, set)
        );
        assert_eq!(
            rotate_shift(RotateShift::Srl, 0x81, Flags::default()).0,
            0x40
        );
        assert_eq!(
            rotate_shift(RotateShift::Swap, 0xA5, set),
            (0x5A, Flags::default())
        );
    }

    #[test]
    fn daa_after_bcd_add_and_sub() {
        let (sum, f) = alu8(ArithmeticLogic::Add, 0x45, 0x38, Flags::default());
        assert_eq!(daa(sum, f).0, 0x83);
        let (sum, f) = alu8(ArithmeticLogic::Add, 0x99, 0x01, Flags::default());
        let (r, f) = daa(sum, f);
        assert_eq!(r, 0x00);
        assert!(f.z && f.c);
        let (diff, f) = alu8(ArithmeticLogic::Sub, 0x42, 0x05, Flags::default());
        assert_eq!(daa(diff, f).0, 0x37);
    }

    #[test]
    fn flags_byte_low_nibble_is_zero() {
        for f in 0..=255u8 {
            assert_eq!(Flags::from_byte(f).to_byte(), f & 0xF0);
        }
    }
}
