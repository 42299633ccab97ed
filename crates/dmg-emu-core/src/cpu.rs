use log::warn;

use crate::alu::{self, Flags};
use crate::bus::Bus;
use crate::decode::{
    self, ArithmeticLogic, Condition, Indirect, Instruction, Operand8, Operand16, Register,
};
use crate::interrupts::{INTERRUPT_MASK, Interrupt};

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DMG_BOOT_A: u8 = 0x01;
const DMG_BOOT_F: u8 = 0xB0;
const DMG_BOOT_B: u8 = 0x00;
const DMG_BOOT_C: u8 = 0x13;
const DMG_BOOT_D: u8 = 0x00;
const DMG_BOOT_E: u8 = 0xD8;
const DMG_BOOT_H: u8 = 0x01;
const DMG_BOOT_L: u8 = 0x4D;

/// Machine cycles spent dispatching an interrupt.
const INTERRUPT_DISPATCH_CYCLES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    /// Waiting for `IF & IE` to become non-zero.
    Halted,
    /// Executed an unused opcode; only a reset recovers.
    Locked(u8),
}

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    /// Machine cycles executed since construction.
    pub cycles: u64,
    pub ime: bool,
    /// Set by EI; becomes `ime` after the following instruction.
    ime_scheduled: bool,
    state: CpuState,
}

impl Cpu {
    /// Post-boot register state, as left by the DMG boot ROM.
    pub fn new() -> Self {
        Self {
            a: DMG_BOOT_A,
            f: DMG_BOOT_F,
            b: DMG_BOOT_B,
            c: DMG_BOOT_C,
            d: DMG_BOOT_D,
            e: DMG_BOOT_E,
            h: DMG_BOOT_H,
            l: DMG_BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            cycles: 0,
            ime: false,
            ime_scheduled: false,
            state: CpuState::Running,
        }
    }

    /// Neutral power-on state for running a boot ROM mapped at 0x0000.
    pub fn new_power_on() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: 0x0000,
            sp: 0x0000,
            cycles: 0,
            ime: false,
            ime_scheduled: false,
            state: CpuState::Running,
        }
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    pub fn set_af(&mut self, val: u16) {
        let [a, f] = val.to_be_bytes();
        self.a = a;
        self.f = f & 0xF0;
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn set_bc(&mut self, val: u16) {
        [self.b, self.c] = val.to_be_bytes();
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn set_de(&mut self, val: u16) {
        [self.d, self.e] = val.to_be_bytes();
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, val: u16) {
        [self.h, self.l] = val.to_be_bytes();
    }

    pub fn flags(&self) -> Flags {
        Flags::from_byte(self.f)
    }

    fn set_flags(&mut self, flags: Flags) {
        self.f = flags.to_byte();
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.pc,
            self.sp,
            self.cycles
        )
    }

    fn fetch8(&mut self, bus: &mut Bus) -> u8 {
        let val = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    pub fn push16(&mut self, bus: &mut Bus, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, lo);
    }

    pub fn pop16(&mut self, bus: &mut Bus) -> u16 {
        let lo = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_be_bytes([hi, lo])
    }

    fn reg(&self, r: Register) -> u8 {
        match r {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
        }
    }

    fn reg_mut(&mut self, r: Register) -> &mut u8 {
        match r {
            Register::A => &mut self.a,
            Register::B => &mut self.b,
            Register::C => &mut self.c,
            Register::D => &mut self.d,
            Register::E => &mut self.e,
            Register::H => &mut self.h,
            Register::L => &mut self.l,
        }
    }

    fn read_operand(&mut self, bus: &mut Bus, op: Operand8) -> u8 {
        match op {
            Operand8::Register(r) => self.reg(r),
            Operand8::IndirectHl => bus.read(self.hl()),
            Operand8::Immediate => self.fetch8(bus),
        }
    }

    fn write_operand(&mut self, bus: &mut Bus, op: Operand8, val: u8) {
        match op {
            Operand8::Register(r) => *self.reg_mut(r) = val,
            Operand8::IndirectHl => bus.write(self.hl(), val),
            // Decoding never produces an immediate destination.
            Operand8::Immediate => {}
        }
    }

    fn read_pair(&self, rr: Operand16) -> u16 {
        match rr {
            Operand16::Bc => self.bc(),
            Operand16::De => self.de(),
            Operand16::Hl => self.hl(),
            Operand16::Sp => self.sp,
            Operand16::Af => self.af(),
        }
    }

    fn write_pair(&mut self, rr: Operand16, val: u16) {
        match rr {
            Operand16::Bc => self.set_bc(val),
            Operand16::De => self.set_de(val),
            Operand16::Hl => self.set_hl(val),
            Operand16::Sp => self.sp = val,
            Operand16::Af => self.set_af(val),
        }
    }

    /// Address of an `(rr)` operand, applying the HL post-increment/decrement.
    fn indirect_addr(&mut self, ind: Indirect) -> u16 {
        match ind {
            Indirect::Bc => self.bc(),
            Indirect::De => self.de(),
            Indirect::HlInc => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn condition(&self, cond: Condition) -> bool {
        let f = self.flags();
        match cond {
            Condition::Always => true,
            Condition::NonZero => !f.z,
            Condition::Zero => f.z,
            Condition::NonCarry => !f.c,
            Condition::Carry => f.c,
        }
    }

    /// Execute one instruction, or idle one cycle while halted or locked,
    /// then advance the rest of the machine and service interrupts.
    /// Returns the machine cycles consumed.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        let cycles = match self.state {
            CpuState::Running => {
                #[cfg(feature = "cpu-trace")]
                log::trace!("{}", self.debug_state());
                let opcode = self.fetch8(bus);
                self.execute(decode::decode(opcode), bus)
            }
            CpuState::Halted | CpuState::Locked(_) => 1,
        };
        bus.tick(cycles);

        let dispatch = self.handle_interrupts(bus);
        if dispatch > 0 {
            bus.tick(dispatch);
        }

        if self.ime_scheduled {
            self.ime_scheduled = false;
            self.ime = true;
        }

        let total = cycles + dispatch;
        self.cycles += total as u64;
        total
    }

    /// Wake from HALT on any enabled request and dispatch the highest
    /// priority one if IME is set. Returns the cycles spent dispatching.
    fn handle_interrupts(&mut self, bus: &mut Bus) -> u32 {
        let pending = bus.if_reg & bus.ie_reg & INTERRUPT_MASK;
        if pending == 0 {
            return 0;
        }
        match self.state {
            CpuState::Locked(_) => return 0,
            CpuState::Halted => self.state = CpuState::Running,
            CpuState::Running => {}
        }
        if !self.ime {
            return 0;
        }
        let Some(source) = Interrupt::highest_priority(pending) else {
            return 0;
        };

        self.ime = false;
        bus.if_reg &= !source.mask();
        let pc = self.pc;
        self.push16(bus, pc);
        self.pc = source.vector();
        INTERRUPT_DISPATCH_CYCLES
    }

    fn execute(&mut self, instr: Instruction, bus: &mut Bus) -> u32 {
        use Instruction::*;

        match instr {
            Nop => 1,
            Stop => {
                // Padding byte.
                self.fetch8(bus);
                1
            }
            Halt => {
                self.state = CpuState::Halted;
                1
            }
            Di => {
                self.ime = false;
                self.ime_scheduled = false;
                1
            }
            Ei => {
                self.ime_scheduled = true;
                1
            }
            Daa => {
                let (r, f) = alu::daa(self.a, self.flags());
                self.a = r;
                self.set_flags(f);
                1
            }
            Cpl => {
                self.a = !self.a;
                let f = Flags {
                    n: true,
                    h: true,
                    ..self.flags()
                };
                self.set_flags(f);
                1
            }
            Scf => {
                let f = Flags {
                    n: false,
                    h: false,
                    c: true,
                    ..self.flags()
                };
                self.set_flags(f);
                1
            }
            Ccf => {
                let old = self.flags();
                self.set_flags(Flags {
                    n: false,
                    h: false,
                    c: !old.c,
                    ..old
                });
                1
            }
            LoadImm16(rr) => {
                let val = self.fetch16(bus);
                self.write_pair(rr, val);
                3
            }
            StoreSp => {
                let addr = self.fetch16(bus);
                let [hi, lo] = self.sp.to_be_bytes();
                bus.write(addr, lo);
                bus.write(addr.wrapping_add(1), hi);
                5
            }
            AddHl(rr) => {
                let (r, f) = alu::add16_hl(self.hl(), self.read_pair(rr), self.flags());
                self.set_hl(r);
                self.set_flags(f);
                2
            }
            StoreA(ind) => {
                let addr = self.indirect_addr(ind);
                bus.write(addr, self.a);
                2
            }
            LoadA(ind) => {
                let addr = self.indirect_addr(ind);
                self.a = bus.read(addr);
                2
            }
            Inc16(rr) => {
                self.write_pair(rr, self.read_pair(rr).wrapping_add(1));
                2
            }
            Dec16(rr) => {
                self.write_pair(rr, self.read_pair(rr).wrapping_sub(1));
                2
            }
            Inc8(op) | Dec8(op) => {
                let v = self.read_operand(bus, op);
                let (r, f) = if matches!(instr, Inc8(_)) {
                    alu::inc8(v, self.flags())
                } else {
                    alu::dec8(v, self.flags())
                };
                self.write_operand(bus, op, r);
                self.set_flags(f);
                if op == Operand8::IndirectHl { 3 } else { 1 }
            }
            Load(dst, src) => {
                let v = self.read_operand(bus, src);
                self.write_operand(bus, dst, v);
                match (dst, src) {
                    (Operand8::IndirectHl, Operand8::Immediate) => 3,
                    (Operand8::IndirectHl, _) | (_, Operand8::IndirectHl) => 2,
                    (_, Operand8::Immediate) => 2,
                    _ => 1,
                }
            }
            RotateA(op) => {
                let (r, f) = alu::rotate_shift(op, self.a, self.flags());
                self.a = r;
                self.set_flags(Flags { z: false, ..f });
                1
            }
            Jr(cond) => {
                let offset = self.fetch8(bus) as i8;
                if self.condition(cond) {
                    self.pc = self.pc.wrapping_add_signed(offset as i16);
                    3
                } else {
                    2
                }
            }
            Jp(cond) => {
                let addr = self.fetch16(bus);
                if self.condition(cond) {
                    self.pc = addr;
                    4
                } else {
                    3
                }
            }
            JpHl => {
                self.pc = self.hl();
                1
            }
            Call(cond) => {
                let addr = self.fetch16(bus);
                if self.condition(cond) {
                    let ret = self.pc;
                    self.push16(bus, ret);
                    self.pc = addr;
                    6
                } else {
                    3
                }
            }
            Ret(Condition::Always) => {
                self.pc = self.pop16(bus);
                4
            }
            Ret(cond) => {
                if self.condition(cond) {
                    self.pc = self.pop16(bus);
                    5
                } else {
                    2
                }
            }
            Reti => {
                self.pc = self.pop16(bus);
                self.ime = true;
                4
            }
            Rst(vector) => {
                let ret = self.pc;
                self.push16(bus, ret);
                self.pc = vector as u16;
                4
            }
            Push(rr) => {
                let val = self.read_pair(rr);
                self.push16(bus, val);
                4
            }
            Pop(rr) => {
                let val = self.pop16(bus);
                self.write_pair(rr, val);
                3
            }
            ArithmeticLogic8(op, src) => {
                let v = self.read_operand(bus, src);
                let (r, f) = alu::alu8(op, self.a, v, self.flags());
                if op != ArithmeticLogic::Cp {
                    self.a = r;
                }
                self.set_flags(f);
                if matches!(src, Operand8::Register(_)) {
                    1
                } else {
                    2
                }
            }
            StoreHighImm => {
                let addr = 0xFF00 | self.fetch8(bus) as u16;
                bus.write(addr, self.a);
                3
            }
            LoadHighImm => {
                let addr = 0xFF00 | self.fetch8(bus) as u16;
                self.a = bus.read(addr);
                3
            }
            StoreHighC => {
                bus.write(0xFF00 | self.c as u16, self.a);
                2
            }
            LoadHighC => {
                self.a = bus.read(0xFF00 | self.c as u16);
                2
            }
            StoreAbs => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.a);
                4
            }
            LoadAbs => {
                let addr = self.fetch16(bus);
                self.a = bus.read(addr);
                4
            }
            AddSp => {
                let offset = self.fetch8(bus) as i8;
                let (r, f) = alu::add_sp_offset(self.sp, offset);
                self.sp = r;
                self.set_flags(f);
                4
            }
            LoadHlSpOffset => {
                let offset = self.fetch8(bus) as i8;
                let (r, f) = alu::add_sp_offset(self.sp, offset);
                self.set_hl(r);
                self.set_flags(f);
                3
            }
            LoadSpHl => {
                self.sp = self.hl();
                2
            }
            Prefix => {
                let opcode = self.fetch8(bus);
                self.execute_cb(decode::decode_cb(opcode), bus)
            }
            RotateShift(..) | Bit(..) | Res(..) | Set(..) => self.execute_cb(instr, bus),
            Illegal(op) => {
                warn!(
                    "Illegal opcode {op:02X} at {:04X}; CPU locked",
                    self.pc.wrapping_sub(1)
                );
                self.state = CpuState::Locked(op);
                1
            }
        }
    }

    /// CB-prefixed instructions, cycles include the prefix fetch.
    fn execute_cb(&mut self, instr: Instruction, bus: &mut Bus) -> u32 {
        let (op, cycles_hl) = match instr {
            Instruction::Bit(_, op) => (op, 3),
            Instruction::RotateShift(_, op) | Instruction::Res(_, op) | Instruction::Set(_, op) => {
                (op, 4)
            }
            _ => return 0,
        };
        let v = self.read_operand(bus, op);
        match instr {
            Instruction::RotateShift(kind, _) => {
                let (r, f) = alu::rotate_shift(kind, v, self.flags());
                self.write_operand(bus, op, r);
                self.set_flags(f);
            }
            Instruction::Bit(n, _) => {
                let f = alu::bit(n, v, self.flags());
                self.set_flags(f);
            }
            Instruction::Res(n, _) => self.write_operand(bus, op, v & !(1 << n)),
            Instruction::Set(n, _) => self.write_operand(bus, op, v | (1 << n)),
            _ => {}
        }
        if op == Operand8::IndirectHl {
            cycles_hl
        } else {
            2
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
