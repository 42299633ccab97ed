use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};
use thiserror::Error;

use crate::{
    cartridge::Cartridge, dma::OamDma, interrupts::INTERRUPT_MASK, lcd::Lcd, ppu::Ppu,
    serial::Serial, timer::Timer,
};

pub const BOOT_ROM_SIZE: usize = 0x100;

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;

#[derive(Debug, Error)]
pub enum BootRomError {
    #[error("failed to read boot ROM {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("boot ROM must be exactly 256 bytes, got {0}")]
    InvalidSize(usize),
}

/// A validated 256-byte DMG boot ROM.
#[derive(Clone)]
pub struct BootRom(Box<[u8; BOOT_ROM_SIZE]>);

impl BootRom {
    pub fn new(data: Vec<u8>) -> Result<Self, BootRomError> {
        let len = data.len();
        let bytes: Box<[u8; BOOT_ROM_SIZE]> = data
            .into_boxed_slice()
            .try_into()
            .map_err(|_| BootRomError::InvalidSize(len))?;
        Ok(Self(bytes))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BootRomError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| BootRomError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(data)
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.0.get(addr as usize).copied().unwrap_or(0xFF)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Rom,
    Vram,
    ExternalRam,
    WorkRam,
    Echo,
    Oam,
    Unusable,
    Io,
    HighRam,
    InterruptEnable,
}

/// Half-open address ranges, searched in order.
const MEMORY_MAP: [(u32, u32, Region); 10] = [
    (0x0000, 0x8000, Region::Rom),
    (0x8000, 0xA000, Region::Vram),
    (0xA000, 0xC000, Region::ExternalRam),
    (0xC000, 0xE000, Region::WorkRam),
    (0xE000, 0xFE00, Region::Echo),
    (0xFE00, 0xFEA0, Region::Oam),
    (0xFEA0, 0xFF00, Region::Unusable),
    (0xFF00, 0xFF80, Region::Io),
    (0xFF80, 0xFFFF, Region::HighRam),
    (0xFFFF, 0x10000, Region::InterruptEnable),
];

fn region(addr: u16) -> Option<Region> {
    let addr = addr as u32;
    MEMORY_MAP
        .iter()
        .find(|(start, end, _)| (*start..*end).contains(&addr))
        .map(|&(_, _, r)| r)
}

/// Address decoder and owner of every memory-mapped component.
pub struct Bus {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    pub cart: Option<Cartridge>,
    boot_rom: Option<BootRom>,
    pub boot_mapped: bool,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub serial: Serial,
    pub ppu: Ppu,
    pub lcd: Lcd,
    pub timer: Timer,
    pub dma: OamDma,
    /// NR10-NR52, retained but not synthesized.
    audio: [u8; 0x17],
    wave_ram: [u8; 0x10],
    /// Remaining 0xFF00-0xFF7F registers without a dedicated owner.
    io: [u8; 0x80],
    joypad_select: u8,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            cart: None,
            boot_rom: None,
            boot_mapped: false,
            if_reg: 0,
            ie_reg: 0,
            serial: Serial::new(),
            ppu: Ppu::new(),
            lcd: Lcd::new(),
            timer: Timer::new(),
            dma: OamDma::new(),
            audio: [0; 0x17],
            wave_ram: [0; 0x10],
            io: [0; 0x80],
            joypad_select: 0x30,
        }
    }

    /// I/O state left behind by the DMG boot ROM.
    pub fn apply_post_boot_state(&mut self) {
        self.timer.div = 0xABCC;
        self.if_reg = 0x01;
        self.lcd.write(0xFF40, 0x91, &mut self.if_reg);
        self.lcd.write(0xFF47, 0xFC, &mut self.if_reg);
        self.boot_mapped = false;
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn load_boot_rom(&mut self, boot: BootRom) {
        info!("Boot ROM mapped at 0000-00FF");
        self.boot_rom = Some(boot);
        self.boot_mapped = true;
    }

    pub fn boot_rom(&self) -> Option<&BootRom> {
        self.boot_rom.as_ref()
    }

    pub fn save_cart_ram(&self) {
        if let Some(cart) = &self.cart
            && let Err(e) = cart.save_ram()
        {
            warn!("Failed to save RAM: {e}");
        }
    }

    pub fn if_reg(&self) -> u8 {
        self.if_reg
    }

    pub fn ie_reg(&self) -> u8 {
        self.ie_reg
    }

    pub fn read(&self, addr: u16) -> u8 {
        match region(addr) {
            Some(Region::Rom) => {
                if self.boot_mapped
                    && addr < BOOT_ROM_SIZE as u16
                    && let Some(boot) = &self.boot_rom
                {
                    return boot.read(addr);
                }
                self.cart.as_ref().map_or(0xFF, |c| c.read(addr))
            }
            Some(Region::Vram) => self.ppu.vram_read(addr, &self.lcd),
            Some(Region::ExternalRam) => self.cart.as_ref().map_or(0xFF, |c| c.read(addr)),
            Some(Region::WorkRam) => self.wram[(addr - 0xC000) as usize],
            Some(Region::Echo) => self.wram[(addr - 0xE000) as usize],
            Some(Region::Oam) => self.ppu.oam_read(addr),
            Some(Region::Io) => self.read_io(addr),
            Some(Region::HighRam) => self.hram[(addr - 0xFF80) as usize],
            Some(Region::InterruptEnable) => self.ie_reg,
            Some(Region::Unusable) | None => 0xFF,
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => 0xC0 | self.joypad_select | 0x0F,
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF26 => self.audio[(addr - 0xFF10) as usize],
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize],
            0xFF46 => self.dma.source(),
            0xFF40..=0xFF4B => self.lcd.read(addr),
            0xFF50 => 0xFF,
            _ => self.io[(addr - 0xFF00) as usize],
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match region(addr) {
            Some(Region::Rom) => {
                if let Some(cart) = &mut self.cart {
                    cart.write(addr, val);
                }
            }
            Some(Region::Vram) => self.ppu.vram_write(addr, val, &self.lcd),
            Some(Region::ExternalRam) => {
                if let Some(cart) = &mut self.cart {
                    cart.write(addr, val);
                }
            }
            Some(Region::WorkRam) => self.wram[(addr - 0xC000) as usize] = val,
            Some(Region::Echo) => self.wram[(addr - 0xE000) as usize] = val,
            Some(Region::Oam) => self.ppu.oam_write(addr, val),
            Some(Region::Io) => self.write_io(addr, val),
            Some(Region::HighRam) => self.hram[(addr - 0xFF80) as usize] = val,
            Some(Region::InterruptEnable) => self.ie_reg = val,
            Some(Region::Unusable) | None => {}
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad_select = val & 0x30,
            0xFF01 | 0xFF02 => self.serial.write(addr, val, &mut self.if_reg),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = val & INTERRUPT_MASK,
            0xFF10..=0xFF26 => self.audio[(addr - 0xFF10) as usize] = val,
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize] = val,
            0xFF40 => {
                self.lcd.write(addr, val, &mut self.if_reg);
                let on = self.lcd.lcdc.lcd_enable();
                self.ppu.set_lcd_power(on, &mut self.lcd, &mut self.if_reg);
            }
            0xFF46 => self.dma.start(val),
            0xFF41..=0xFF4B => self.lcd.write(addr, val, &mut self.if_reg),
            0xFF50 => {
                if self.boot_mapped {
                    self.boot_mapped = false;
                    info!("Boot ROM disabled");
                }
            }
            _ => self.io[(addr - 0xFF00) as usize] = val,
        }
    }

    /// Move one OAM DMA byte if a transfer is in flight.
    pub fn step_dma(&mut self) {
        if let Some((src, dst)) = self.dma.tick() {
            let val = self.read(src);
            self.ppu.oam_write(dst, val);
        }
    }

    /// Advance timer, PPU and DMA by `m_cycles` machine cycles.
    pub fn tick(&mut self, m_cycles: u32) {
        for _ in 0..m_cycles {
            self.timer.step(4, &mut self.if_reg);
            self.ppu.tick(4, &mut self.lcd, &mut self.if_reg);
            if self.dma.is_active() {
                self.step_dma();
            }
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
