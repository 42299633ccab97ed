use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::interrupts::Interrupt;
use crate::lcd::{Lcd, Lcdc, Mode};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const SCREEN_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

// Dot at which each mode ends, counted from the start of the line
const OAM_SEARCH_END: u16 = 80;
const PIXEL_TRANSFER_END: u16 = OAM_SEARCH_END + 172;
const LINE_DOTS: u16 = 456;

// Number of lines spent in VBlank
const VBLANK_LINES: u8 = 10;
const LAST_LINE: u8 = SCREEN_HEIGHT as u8 + VBLANK_LINES - 1;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

const VRAM_BASE: u16 = 0x8000;

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
}

/// Registers latched when OAM search ends; the line renders from these.
#[derive(Copy, Clone, Default)]
struct LineState {
    scx: u8,
    scy: u8,
    ly: u8,
    wx: u8,
    wy: u8,
    lcdc: Lcdc,
}

/// Published copy of the screen and VRAM.
pub struct FrameBuffers {
    screen: Box<[u8; SCREEN_PIXELS]>,
    vram: Box<[u8; VRAM_SIZE]>,
    generation: u64,
}

impl FrameBuffers {
    fn new() -> Self {
        Self {
            screen: Box::new([0; SCREEN_PIXELS]),
            vram: Box::new([0; VRAM_SIZE]),
            generation: 0,
        }
    }

    /// Shade indices 0-3, row-major 160x144.
    pub fn screen(&self) -> &[u8] {
        &self.screen[..]
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram[..]
    }

    /// Number of swaps that produced this content.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Read-only handle on the published frame, shareable across threads.
///
/// Every read holds the same lock the swap takes, so a reader never sees a
/// half-copied frame.
#[derive(Clone)]
pub struct FrontBuffer {
    inner: Arc<Mutex<FrameBuffers>>,
}

impl FrontBuffer {
    pub fn with_frame<R>(&self, f: impl FnOnce(&FrameBuffers) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn screen_snapshot(&self) -> Vec<u8> {
        self.with_frame(|frame| frame.screen().to_vec())
    }

    pub fn vram_snapshot(&self) -> Vec<u8> {
        self.with_frame(|frame| frame.vram().to_vec())
    }

    pub fn generation(&self) -> u64 {
        self.with_frame(FrameBuffers::generation)
    }
}

pub struct Ppu {
    /// Back VRAM, owned by the emulation thread.
    vram: Box<[u8; VRAM_SIZE]>,
    pub oam: [u8; OAM_SIZE],
    /// Back screen, shade indices 0-3.
    screen: Box<[u8; SCREEN_PIXELS]>,
    front: Arc<Mutex<FrameBuffers>>,

    dot: u16,
    lcd_on: bool,
    line: LineState,
    /// Latched sprites for the current scanline, in OAM order
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Internal window line counter
    win_line_counter: u8,

    /// Indicates a completed frame is available in the back screen
    frame_ready: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: Box::new([0; VRAM_SIZE]),
            oam: [0; OAM_SIZE],
            screen: Box::new([0; SCREEN_PIXELS]),
            front: Arc::new(Mutex::new(FrameBuffers::new())),
            dot: 0,
            lcd_on: true,
            line: LineState::default(),
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            win_line_counter: 0,
            frame_ready: false,
            frame_counter: 0,
        }
    }

    /// VRAM is blocked for the CPU while the LCD draws.
    fn vram_locked(lcd: &Lcd) -> bool {
        lcd.lcdc.lcd_enable() && lcd.mode() == Mode::PixelTransfer
    }

    pub fn vram_read(&self, addr: u16, lcd: &Lcd) -> u8 {
        if Self::vram_locked(lcd) {
            return 0xFF;
        }
        self.vram_byte(addr)
    }

    pub fn vram_write(&mut self, addr: u16, val: u8, lcd: &Lcd) {
        if Self::vram_locked(lcd) {
            return;
        }
        if let Some(b) = self.vram.get_mut(addr.wrapping_sub(VRAM_BASE) as usize) {
            *b = val;
        }
    }

    pub fn oam_read(&self, addr: u16) -> u8 {
        self.oam
            .get(addr.wrapping_sub(0xFE00) as usize)
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn oam_write(&mut self, addr: u16, val: u8) {
        if let Some(b) = self.oam.get_mut(addr.wrapping_sub(0xFE00) as usize) {
            *b = val;
        }
    }

    #[inline]
    fn vram_byte(&self, addr: u16) -> u8 {
        self.vram
            .get(addr.wrapping_sub(VRAM_BASE) as usize)
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram[..]
    }

    /// Back screen as rendered so far.
    pub fn screen(&self) -> &[u8] {
        &self.screen[..]
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    /// Frames completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn front_buffer(&self) -> FrontBuffer {
        FrontBuffer {
            inner: Arc::clone(&self.front),
        }
    }

    /// Publish the back VRAM and screen to the front buffers.
    pub fn swap_buffers(&mut self) {
        let mut front = self.front.lock().unwrap_or_else(PoisonError::into_inner);
        front.screen.copy_from_slice(&self.screen[..]);
        front.vram.copy_from_slice(&self.vram[..]);
        front.generation = front.generation.wrapping_add(1);
    }

    /// React to LCDC bit 7 changing.
    pub fn set_lcd_power(&mut self, on: bool, lcd: &mut Lcd, if_reg: &mut u8) {
        if on == self.lcd_on {
            return;
        }
        self.lcd_on = on;
        self.dot = 0;
        self.win_line_counter = 0;
        if on {
            debug!("LCD on");
            lcd.reset_ly(if_reg);
            lcd.set_mode(Mode::OamSearch, if_reg);
        } else {
            debug!("LCD off");
            lcd.power_off();
        }
    }

    /// Latch scroll and window registers and pick this line's sprites.
    fn oam_search(&mut self, lcd: &Lcd) {
        self.line = LineState {
            scx: lcd.scx,
            scy: lcd.scy,
            ly: lcd.ly(),
            wx: lcd.wx,
            wy: lcd.wy,
            lcdc: lcd.lcdc,
        };

        let height = self.line.lcdc.obj_height() as i16;
        let ly = self.line.ly as i16;
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as i16 - 16;
            if ly >= y && ly < y + height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: self.oam[base + 1] as i16 - 8,
                    y,
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                };
                self.sprite_count += 1;
            }
        }
    }

    /// Color id (0-3) of one background or window map pixel.
    fn map_pixel(&self, map_base: u16, lcdc: Lcdc, x: u8, y: u8) -> u8 {
        let map_addr = map_base + (y as u16 / 8) * 32 + (x as u16 / 8);
        let tile = self.vram_byte(map_addr);
        let tile_addr = if lcdc.unsigned_tile_data() {
            VRAM_BASE + tile as u16 * 16
        } else {
            0x9000u16.wrapping_add_signed(tile as i8 as i16 * 16)
        };
        let row_addr = tile_addr + (y as u16 % 8) * 2;
        let bit = 7 - (x % 8);
        Self::color_id(self.vram_byte(row_addr), self.vram_byte(row_addr + 1), bit)
    }

    #[inline(always)]
    fn color_id(lo: u8, hi: u8, bit: u8) -> u8 {
        (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1)
    }

    fn render_scanline(&mut self, lcd: &Lcd) {
        let line = self.line;
        let ly = line.ly as usize;
        if ly >= SCREEN_HEIGHT {
            return;
        }
        let lcdc = line.lcdc;
        let row = ly * SCREEN_WIDTH;
        let mut bg_ids = [0u8; SCREEN_WIDTH];

        if lcdc.bg_window_enable() {
            let window_visible = lcdc.window_enable() && line.wy <= line.ly;
            let window_start = line.wx as i16 - 7;
            let mut window_drawn = false;
            for (x, id) in bg_ids.iter_mut().enumerate() {
                *id = if window_visible && x as i16 >= window_start {
                    window_drawn = true;
                    let wx = (x as i16 - window_start) as u8;
                    self.map_pixel(lcdc.window_map_base(), lcdc, wx, self.win_line_counter)
                } else {
                    let bx = line.scx.wrapping_add(x as u8);
                    let by = line.scy.wrapping_add(line.ly);
                    self.map_pixel(lcdc.bg_map_base(), lcdc, bx, by)
                };
                self.screen[row + x] = lcd.bgp.shade(*id);
            }
            if window_drawn {
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        } else {
            // Blank background: color id 0 at shade 0, palette ignored.
            self.screen[row..row + SCREEN_WIDTH].fill(0);
        }

        if lcdc.obj_enable() {
            self.render_sprites(lcd, &bg_ids);
        }

        #[cfg(feature = "ppu-trace")]
        log::trace!(
            "line {:3} scx={:02X} scy={:02X} wx={:02X} wy={:02X} lcdc={:02X} sprites={} win_line={}",
            line.ly,
            line.scx,
            line.scy,
            line.wx,
            line.wy,
            lcdc.0,
            self.sprite_count,
            self.win_line_counter
        );
    }

    fn render_sprites(&mut self, lcd: &Lcd, bg_ids: &[u8; SCREEN_WIDTH]) {
        let line = self.line;
        let row = line.ly as usize * SCREEN_WIDTH;
        let height = line.lcdc.obj_height() as i16;
        // Set once a sprite owns a pixel; earlier OAM entries win.
        let mut drawn = [false; SCREEN_WIDTH];

        for sprite in &self.line_sprites[..self.sprite_count] {
            let mut sprite_row = line.ly as i16 - sprite.y;
            if sprite.flags & 0x40 != 0 {
                sprite_row = height - 1 - sprite_row;
            }
            let tile = if height == 16 {
                sprite.tile & 0xFE
            } else {
                sprite.tile
            };
            let addr = VRAM_BASE + tile as u16 * 16 + sprite_row as u16 * 2;
            let lo = self.vram_byte(addr);
            let hi = self.vram_byte(addr + 1);
            let palette = if sprite.flags & 0x10 != 0 {
                lcd.obp1
            } else {
                lcd.obp0
            };

            for px in 0..8u8 {
                let x = sprite.x + px as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&x) {
                    continue;
                }
                let x = x as usize;
                if drawn[x] {
                    continue;
                }
                let bit = if sprite.flags & 0x20 != 0 { px } else { 7 - px };
                let id = Self::color_id(lo, hi, bit);
                if id == 0 {
                    continue;
                }
                drawn[x] = true;
                if sprite.flags & 0x80 != 0 && bg_ids[x] != 0 {
                    continue;
                }
                self.screen[row + x] = palette.shade(id);
            }
        }
    }

    /// Advance the scanline state machine by `dots` PPU clocks.
    pub fn tick(&mut self, dots: u32, lcd: &mut Lcd, if_reg: &mut u8) {
        let enabled = lcd.lcdc.lcd_enable();
        self.set_lcd_power(enabled, lcd, if_reg);
        if !enabled {
            return;
        }
        for _ in 0..dots {
            self.dot += 1;
            match lcd.mode() {
                Mode::OamSearch => {
                    if self.dot == OAM_SEARCH_END {
                        self.oam_search(lcd);
                        lcd.set_mode(Mode::PixelTransfer, if_reg);
                    }
                }
                Mode::PixelTransfer => {
                    if self.dot == PIXEL_TRANSFER_END {
                        self.render_scanline(lcd);
                        lcd.set_mode(Mode::HBlank, if_reg);
                    }
                }
                Mode::HBlank => {
                    if self.dot >= LINE_DOTS {
                        self.dot = 0;
                        lcd.bump_ly(if_reg);
                        if lcd.ly() == SCREEN_HEIGHT as u8 {
                            lcd.set_mode(Mode::VBlank, if_reg);
                            Interrupt::VBlank.request(if_reg);
                            self.frame_ready = true;
                            self.frame_counter = self.frame_counter.wrapping_add(1);
                        } else {
                            lcd.set_mode(Mode::OamSearch, if_reg);
                        }
                    }
                }
                Mode::VBlank => {
                    if self.dot >= LINE_DOTS {
                        self.dot = 0;
                        if lcd.ly() >= LAST_LINE {
                            self.win_line_counter = 0;
                            lcd.reset_ly(if_reg);
                            lcd.set_mode(Mode::OamSearch, if_reg);
                        } else {
                            lcd.bump_ly(if_reg);
                        }
                    }
                }
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
