//! Interrupt sources shared by the CPU, PPU, timer and serial unit.
//!
//! IF (0xFF0F) and IE (0xFFFF) use the same bit layout. Lower bits have
//! higher priority when several requests are pending at once.

/// One of the five interrupt sources, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

/// Mask of the five implemented interrupt bits.
pub const INTERRUPT_MASK: u8 = 0x1F;

impl Interrupt {
    /// All sources ordered from highest to lowest priority.
    pub const PRIORITY: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Bit of this source in IF/IE.
    pub const fn mask(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::LcdStat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    /// Fixed handler address jumped to when the interrupt is serviced.
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }

    /// Highest-priority source present in `pending`, if any.
    pub fn highest_priority(pending: u8) -> Option<Interrupt> {
        Self::PRIORITY
            .into_iter()
            .find(|source| pending & source.mask() != 0)
    }

    /// Set this source's bit in an IF register value.
    #[inline]
    pub fn request(self, if_reg: &mut u8) {
        *if_reg |= self.mask();
    }
}
