//! LCD register file (0xFF40-0xFF4B, minus the DMA trigger at 0xFF46).
//!
//! LCDC, STAT and the palettes are stored as single bytes wrapped in newtypes
//! with named bit accessors. The PPU mode lives in STAT bits 0-1 and can only
//! be changed through [`Lcd::set_mode`]; the LY=LYC flag only through
//! [`Lcd::check_lyc`].

use crate::interrupts::Interrupt;

/// PPU mode as reported in STAT bits 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    PixelTransfer = 3,
}

impl Mode {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Mode::HBlank,
            1 => Mode::VBlank,
            2 => Mode::OamSearch,
            _ => Mode::PixelTransfer,
        }
    }
}

/// LCDC (0xFF40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lcdc(pub u8);

impl Lcdc {
    #[inline]
    fn bit(self, n: u8) -> bool {
        self.0 & (1 << n) != 0
    }

    /// Background and window display. Sprites are unaffected.
    pub fn bg_window_enable(self) -> bool {
        self.bit(0)
    }

    pub fn obj_enable(self) -> bool {
        self.bit(1)
    }

    pub fn obj_height(self) -> u8 {
        if self.bit(2) { 16 } else { 8 }
    }

    pub fn bg_map_base(self) -> u16 {
        if self.bit(3) { 0x9C00 } else { 0x9800 }
    }

    /// True selects 0x8000 unsigned tile addressing, false 0x9000 signed.
    pub fn unsigned_tile_data(self) -> bool {
        self.bit(4)
    }

    pub fn window_enable(self) -> bool {
        self.bit(5)
    }

    pub fn window_map_base(self) -> u16 {
        if self.bit(6) { 0x9C00 } else { 0x9800 }
    }

    pub fn lcd_enable(self) -> bool {
        self.bit(7)
    }
}

/// STAT (0xFF41).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat(pub u8);

impl Stat {
    const LYC_FLAG: u8 = 0x04;
    const HBLANK_IRQ: u8 = 0x08;
    const VBLANK_IRQ: u8 = 0x10;
    const OAM_IRQ: u8 = 0x20;
    const LYC_IRQ: u8 = 0x40;
    const WRITABLE: u8 = 0x78;

    pub fn mode(self) -> Mode {
        Mode::from_bits(self.0)
    }

    pub fn lyc_flag(self) -> bool {
        self.0 & Self::LYC_FLAG != 0
    }

    pub fn hblank_irq(self) -> bool {
        self.0 & Self::HBLANK_IRQ != 0
    }

    pub fn vblank_irq(self) -> bool {
        self.0 & Self::VBLANK_IRQ != 0
    }

    pub fn oam_irq(self) -> bool {
        self.0 & Self::OAM_IRQ != 0
    }

    pub fn lyc_irq(self) -> bool {
        self.0 & Self::LYC_IRQ != 0
    }

    fn with_mode(self, mode: Mode) -> Self {
        Stat((self.0 & !0x03) | mode as u8)
    }

    fn with_lyc_flag(self, on: bool) -> Self {
        if on {
            Stat(self.0 | Self::LYC_FLAG)
        } else {
            Stat(self.0 & !Self::LYC_FLAG)
        }
    }

    /// Apply a CPU write: only the interrupt-enable bits change.
    fn with_written(self, val: u8) -> Self {
        Stat((self.0 & !Self::WRITABLE) | (val & Self::WRITABLE))
    }
}

/// BGP/OBP0/OBP1: four packed 2-bit shades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Palette(pub u8);

impl Palette {
    #[inline(always)]
    pub fn shade(self, color_id: u8) -> u8 {
        (self.0 >> ((color_id & 0x03) * 2)) & 0x03
    }
}

#[derive(Debug, Clone, Default)]
pub struct Lcd {
    pub lcdc: Lcdc,
    stat: Stat,
    pub scy: u8,
    pub scx: u8,
    ly: u8,
    pub lyc: u8,
    pub bgp: Palette,
    pub obp0: Palette,
    pub obp1: Palette,
    pub wy: u8,
    pub wx: u8,
    /// Combined STAT interrupt line, for rising-edge detection.
    stat_line: bool,
}

impl Lcd {
    pub fn new() -> Self {
        Self {
            stat: Stat(Mode::OamSearch as u8),
            ..Self::default()
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc.0,
            0xFF41 => self.stat.0 | 0x80,
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp.0,
            0xFF48 => self.obp0.0,
            0xFF49 => self.obp1.0,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF40 => self.lcdc = Lcdc(val),
            0xFF41 => {
                self.stat = self.stat.with_written(val);
                self.update_stat_irq(if_reg);
            }
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => self.reset_ly(if_reg),
            0xFF45 => {
                self.lyc = val;
                self.check_lyc(if_reg);
            }
            0xFF47 => self.bgp = Palette(val),
            0xFF48 => self.obp0 = Palette(val),
            0xFF49 => self.obp1 = Palette(val),
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    pub fn lcdc(&self) -> Lcdc {
        self.lcdc
    }

    pub fn stat(&self) -> Stat {
        self.stat
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> Mode {
        self.stat.mode()
    }

    pub fn set_mode(&mut self, mode: Mode, if_reg: &mut u8) {
        self.stat = self.stat.with_mode(mode);
        self.update_stat_irq(if_reg);
    }

    /// Advance LY by one line and re-run the LYC comparison.
    pub fn bump_ly(&mut self, if_reg: &mut u8) {
        self.ly = self.ly.wrapping_add(1);
        self.check_lyc(if_reg);
    }

    pub fn reset_ly(&mut self, if_reg: &mut u8) {
        self.ly = 0;
        self.check_lyc(if_reg);
    }

    /// Recompute the LY=LYC flag and request LCD-STAT if the combined STAT
    /// line rose.
    ///
    /// A fresh match raises nothing while an enabled mode source already
    /// holds the line high, e.g. LY ticking over at the end of HBlank with
    /// the HBlank source on.
    pub fn check_lyc(&mut self, if_reg: &mut u8) {
        self.stat = self.stat.with_lyc_flag(self.ly == self.lyc);
        self.update_stat_irq(if_reg);
    }

    /// LCD switched off: mode 0, LY 0 and a quiet STAT line.
    pub(crate) fn power_off(&mut self) {
        self.ly = 0;
        self.stat = self.stat.with_mode(Mode::HBlank);
        self.stat_line = false;
    }

    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let stat = self.stat;
        let mode_signal = match stat.mode() {
            Mode::HBlank => stat.hblank_irq(),
            Mode::VBlank => stat.vblank_irq(),
            Mode::OamSearch => stat.oam_irq(),
            Mode::PixelTransfer => false,
        };
        let line = mode_signal || (stat.lyc_flag() && stat.lyc_irq());
        if line && !self.stat_line {
            Interrupt::LcdStat.request(if_reg);
        }
        self.stat_line = line;
    }
}
