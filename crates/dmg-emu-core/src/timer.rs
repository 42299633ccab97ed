use crate::interrupts::Interrupt;

/// Divider and timer unit (DIV/TIMA/TMA/TAC).
///
/// The 16-bit divider advances once per T-cycle (four per machine cycle). TAC
/// selects which divider bit clocks TIMA; TIMA advances on a falling edge of
/// that bit while the timer is enabled.
pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
}

const TAC_ENABLE: u8 = 0x04;

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF04 => self.reset_div(if_reg),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                let prev = Self::signal_with(self.div, self.tac);
                self.tac = val & 0x07;
                let new = Self::signal_with(self.div, self.tac);
                if prev && !new {
                    self.increment(if_reg);
                }
            }
            _ => {}
        }
    }

    /// Advance the divider by `cycles` T-cycles, clocking TIMA on every
    /// falling edge of the selected bit.
    pub fn step(&mut self, cycles: u16, if_reg: &mut u8) {
        for _ in 0..cycles {
            let prev = Self::signal_with(self.div, self.tac);
            self.div = self.div.wrapping_add(1);
            let new = Self::signal_with(self.div, self.tac);
            if prev && !new {
                self.increment(if_reg);
            }
        }
    }

    /// Reset the internal divider counter. If the selected bit was high the
    /// reset is itself a falling edge and clocks TIMA.
    pub fn reset_div(&mut self, if_reg: &mut u8) {
        let prev = Self::signal_with(self.div, self.tac);
        self.div = 0;
        if prev {
            self.increment(if_reg);
        }
    }

    fn increment(&mut self, if_reg: &mut u8) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            Interrupt::Timer.request(if_reg);
        } else {
            self.tima = next;
        }
    }

    /// Divider bit selected by the TAC clock field.
    pub fn selected_bit(tac: u8) -> u8 {
        match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        tac & TAC_ENABLE != 0 && (div >> Self::selected_bit(tac)) & 1 != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
