//! Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/bus/PPU/timer
//! etc). Frontends live in separate crates, drive the core via the [`gameboy`]
//! facade and read finished frames through [`ppu::FrontBuffer`].

/// Pure flag arithmetic for the ALU instructions.
pub mod alu;

/// Memory map, I/O routing and boot ROM overlay.
pub mod bus;

/// Cartridge header parsing and MBC1 banking.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// Opcode to instruction decoding.
pub mod decode;

/// OAM DMA controller.
pub mod dma;

/// High-level facade that wires the CPU and bus into a single machine.
pub mod gameboy;

/// Interrupt sources, masks and vectors.
pub mod interrupts;

/// LCD register file.
pub mod lcd;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Serial registers and debug output sink.
pub mod serial;

/// Divider/timer unit.
pub mod timer;
