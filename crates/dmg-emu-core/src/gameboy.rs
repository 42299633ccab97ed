use std::path::Path;

use log::warn;

use crate::{
    bus::{BootRom, Bus},
    cartridge::Cartridge,
    cpu::Cpu,
    ppu::FrontBuffer,
};

/// Upper bound on machine cycles [`GameBoy::run_frame`] spends waiting for
/// VBlank, a little over two frames. Keeps a switched-off LCD from hanging
/// the caller.
const FRAME_TIMEOUT_CYCLES: u64 = 2 * 17_556 + 1_000;

pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
    power_on: bool,
}

impl GameBoy {
    /// Machine in the state the boot ROM leaves behind, PC at 0x0100.
    pub fn new() -> Self {
        let mut bus = Bus::new();
        bus.apply_post_boot_state();
        Self {
            cpu: Cpu::new(),
            bus,
            power_on: false,
        }
    }

    /// Machine at power on, PC at 0x0000, for use with a boot ROM.
    pub fn new_power_on() -> Self {
        let mut bus = Bus::new();
        bus.ppu.set_lcd_power(false, &mut bus.lcd, &mut bus.if_reg);
        Self {
            cpu: Cpu::new_power_on(),
            bus,
            power_on: true,
        }
    }

    /// Power-on machine with `boot` mapped, or a post-boot machine if `None`.
    pub fn with_boot_rom(boot: Option<BootRom>) -> Self {
        match boot {
            Some(boot) => {
                let mut gb = Self::new_power_on();
                gb.bus.load_boot_rom(boot);
                gb
            }
            None => Self::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.bus.load_cart(cart);
    }

    /// Insert the ROM at `path`. On failure the slot stays empty and the
    /// machine runs against open bus.
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match Cartridge::from_file(path.as_ref()) {
            Ok(cart) => {
                self.bus.load_cart(cart);
                true
            }
            Err(e) => {
                warn!("Running without a cartridge: {e}");
                false
            }
        }
    }

    /// Map the boot ROM at `path` and restart from power on. On failure the
    /// machine keeps its current post-boot state.
    pub fn load_boot_rom_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match BootRom::from_file(path.as_ref()) {
            Ok(boot) => {
                let cart = self.bus.cart.take();
                *self = Self::with_boot_rom(Some(boot));
                if let Some(c) = cart {
                    self.bus.load_cart(c);
                }
                true
            }
            Err(e) => {
                warn!("Skipping boot ROM: {e}");
                false
            }
        }
    }

    /// Execute one instruction. Returns machine cycles consumed.
    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.bus)
    }

    /// Run at least `m_cycles` machine cycles. Returns the cycles actually run.
    pub fn run_cycles(&mut self, m_cycles: u64) -> u64 {
        let mut ran = 0u64;
        while ran < m_cycles {
            ran += self.step() as u64;
        }
        ran
    }

    /// Step until the PPU enters VBlank, then publish the frame to the front
    /// buffer. Returns machine cycles consumed.
    pub fn run_frame(&mut self) -> u64 {
        let mut ran = 0u64;
        while !self.bus.ppu.frame_ready() && ran < FRAME_TIMEOUT_CYCLES {
            ran += self.step() as u64;
        }
        self.bus.ppu.clear_frame_flag();
        self.bus.ppu.swap_buffers();
        ran
    }

    /// Handle for reading published frames from another thread.
    pub fn front_buffer(&self) -> FrontBuffer {
        self.bus.ppu.front_buffer()
    }

    /// Frames completed by the PPU.
    pub fn frames(&self) -> u64 {
        self.bus.ppu.frames()
    }

    /// Reset to the initial state while preserving the loaded cartridge and
    /// boot ROM. The front buffer handle is not preserved.
    pub fn reset(&mut self) {
        let cart = self.bus.cart.take();
        let boot = self.bus.boot_rom().cloned();
        *self = if self.power_on {
            let mut gb = Self::new_power_on();
            if let Some(b) = boot {
                gb.bus.load_boot_rom(b);
            }
            gb
        } else {
            Self::new()
        };
        if let Some(c) = cart {
            self.bus.load_cart(c);
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
