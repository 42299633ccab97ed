use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const HEADER_START: usize = 0x0100;
const HEADER_LEN: usize = 0x50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    RomOnly,
    Mbc1,
    /// A controller this core does not emulate; banked as plain ROM.
    Unsupported(u8),
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cartridge image is empty")]
    Empty,
}

/// Cartridge header at 0x0100-0x014F, kept as raw bytes with field accessors.
///
/// Images shorter than the header read as zero in the missing positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    bytes: [u8; HEADER_LEN],
}

impl Header {
    pub fn parse(data: &[u8]) -> Self {
        let mut bytes = [0u8; HEADER_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = data.get(HEADER_START + i).copied().unwrap_or(0);
        }
        Self { bytes }
    }

    #[inline]
    fn byte(&self, addr: usize) -> u8 {
        self.bytes[addr - HEADER_START]
    }

    pub fn entry(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.bytes[0x00..0x04]);
        out
    }

    pub fn logo(&self) -> &[u8] {
        &self.bytes[0x04..0x34]
    }

    pub fn title(&self) -> String {
        let mut slice = &self.bytes[0x34..0x44];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    pub fn new_licensee_code(&self) -> [u8; 2] {
        [self.byte(0x0144), self.byte(0x0145)]
    }

    pub fn sgb_flag(&self) -> u8 {
        self.byte(0x0146)
    }

    pub fn cartridge_type(&self) -> u8 {
        self.byte(0x0147)
    }

    pub fn rom_size_code(&self) -> u8 {
        self.byte(0x0148)
    }

    pub fn ram_size_code(&self) -> u8 {
        self.byte(0x0149)
    }

    pub fn destination_code(&self) -> u8 {
        self.byte(0x014A)
    }

    pub fn old_licensee_code(&self) -> u8 {
        self.byte(0x014B)
    }

    pub fn version(&self) -> u8 {
        self.byte(0x014C)
    }

    pub fn header_checksum(&self) -> u8 {
        self.byte(0x014D)
    }

    pub fn global_checksum(&self) -> u16 {
        u16::from_be_bytes([self.byte(0x014E), self.byte(0x014F)])
    }

    /// Running `x = x - byte - 1` over 0x0134..=0x014C.
    pub fn computed_checksum(&self) -> u8 {
        self.bytes[0x34..=0x4C]
            .iter()
            .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
    }

    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum() == self.header_checksum()
    }

    pub fn mbc_type(&self) -> MbcType {
        match self.cartridge_type() {
            0x00 | 0x08 | 0x09 => MbcType::RomOnly,
            0x01..=0x03 => MbcType::Mbc1,
            other => MbcType::Unsupported(other),
        }
    }

    pub fn has_battery(&self) -> bool {
        self.cartridge_type() == 0x03
    }

    /// Number of 16 KiB banks announced by the header, if the code is valid.
    pub fn declared_rom_banks(&self) -> Option<usize> {
        match self.rom_size_code() {
            code @ 0x00..=0x08 => Some(2usize << code),
            _ => None,
        }
    }

    pub fn ram_size(&self) -> usize {
        match self.ram_size_code() {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        }
    }

    pub fn cartridge_type_name(&self) -> &'static str {
        match self.cartridge_type() {
            0x00 => "ROM ONLY",
            0x01 => "MBC1",
            0x02 => "MBC1+RAM",
            0x03 => "MBC1+RAM+BATTERY",
            0x05 => "MBC2",
            0x06 => "MBC2+BATTERY",
            0x08 => "ROM+RAM",
            0x09 => "ROM+RAM+BATTERY",
            0x0B..=0x0D => "MMM01",
            0x0F..=0x13 => "MBC3",
            0x19..=0x1E => "MBC5",
            0x20 => "MBC6",
            0x22 => "MBC7",
            0xFC => "POCKET CAMERA",
            0xFD => "BANDAI TAMA5",
            0xFE => "HuC3",
            0xFF => "HuC1+RAM+BATTERY",
            _ => "UNKNOWN",
        }
    }

    pub fn rom_size_name(&self) -> &'static str {
        match self.rom_size_code() {
            0x00 => "32 KiB",
            0x01 => "64 KiB",
            0x02 => "128 KiB",
            0x03 => "256 KiB",
            0x04 => "512 KiB",
            0x05 => "1 MiB",
            0x06 => "2 MiB",
            0x07 => "4 MiB",
            0x08 => "8 MiB",
            _ => "UNKNOWN",
        }
    }

    pub fn ram_size_name(&self) -> &'static str {
        match self.ram_size_code() {
            0x00 => "None",
            0x01 => "2 KiB",
            0x02 => "8 KiB",
            0x03 => "32 KiB",
            0x04 => "128 KiB",
            0x05 => "64 KiB",
            _ => "UNKNOWN",
        }
    }

    /// Publisher name. Code 0x33 defers to the two ASCII digits of the new
    /// licensee field, which share the same numbering for common publishers.
    pub fn licensee_name(&self) -> &'static str {
        let code = match self.old_licensee_code() {
            0x33 => {
                let [hi, lo] = self.new_licensee_code();
                match std::str::from_utf8(&[hi, lo])
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                {
                    Some(code) => code,
                    None => return "UNKNOWN",
                }
            }
            code => code,
        };
        match code {
            0x00 => "None",
            0x01 | 0x31 => "Nintendo",
            0x08 => "Capcom",
            0x13 | 0x69 => "Electronic Arts",
            0x18 | 0x38 => "Hudson Soft",
            0x28 => "Kemco",
            0x30 => "Viacom",
            0x32 => "Bandai",
            0x34 | 0x54 | 0xA4 => "Konami",
            0x37 => "Taito",
            0x39 => "Banpresto",
            0x41 => "Ubi Soft",
            0x42 => "Atlus",
            0x49 => "Irem",
            0x51 => "Acclaim",
            0x52 => "Activision",
            0x56 => "LJN",
            0x60 => "Titus",
            0x61 => "Virgin",
            0x64 => "LucasArts",
            0x67 => "Ocean",
            0x70 => "Infogrames",
            0x71 => "Interplay",
            0x78 => "THQ",
            0x79 => "Accolade",
            0x91 => "Chunsoft",
            0x95 => "Varie",
            0xC0 => "Taito",
            _ => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MbcState {
    RomOnly,
    Mbc1 {
        /// Lower 5-bit ROM bank register, never 0.
        rom_bank: u8,
        /// 2-bit secondary register: RAM bank or ROM bank bits 5-6.
        ram_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    header: Header,
    save_path: Option<PathBuf>,
    mbc_state: MbcState,
    rom_banks: usize,
    /// Byte offsets of the banks mapped at 0x0000, 0x4000 and 0xA000.
    low_offset: usize,
    high_offset: usize,
    ram_offset: usize,
}

impl Cartridge {
    pub fn from_bytes_with_ram(data: Vec<u8>, ram_size: usize) -> Self {
        let mut c = Self::load(data);
        c.ram = vec![0; ram_size];
        c.update_banking();
        c
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if data.is_empty() {
            return Err(CartridgeError::Empty);
        }
        let mut cart = Self::load(data);

        if cart.header.has_battery() {
            let save = path.with_extension("sav");
            if let Ok(bytes) = fs::read(&save) {
                for (d, s) in cart.ram.iter_mut().zip(bytes.iter()) {
                    *d = *s;
                }
                info!("Restored battery RAM from {}", save.display());
            }
            cart.save_path = Some(save);
        }

        Ok(cart)
    }

    pub fn load(data: Vec<u8>) -> Self {
        let header = Header::parse(&data);
        if data.len() < HEADER_START + HEADER_LEN {
            warn!(
                "Cartridge image is truncated ({} bytes); header fields may be garbage",
                data.len()
            );
        }

        let mbc = header.mbc_type();
        if let MbcType::Unsupported(code) = mbc {
            warn!(
                "Unsupported cartridge type {code:02X} ({}); running as ROM only",
                header.cartridge_type_name()
            );
        }

        let (mbc_state, ram_size) = match mbc {
            MbcType::Mbc1 => (
                MbcState::Mbc1 {
                    rom_bank: 1,
                    ram_bank: 0,
                    mode: 0,
                    ram_enable: false,
                },
                header.ram_size(),
            ),
            MbcType::RomOnly | MbcType::Unsupported(_) => (MbcState::RomOnly, RAM_BANK_SIZE),
        };

        let image_banks = data.len().div_ceil(ROM_BANK_SIZE).max(1);
        let rom_banks = header
            .declared_rom_banks()
            .map_or(image_banks, |declared| declared.min(image_banks));

        info!("Cartridge loaded:");
        info!("  Title    : {}", header.title());
        info!(
            "  Type     : {:02X} ({})",
            header.cartridge_type(),
            header.cartridge_type_name()
        );
        info!("  ROM Size : {}", header.rom_size_name());
        info!("  RAM Size : {}", header.ram_size_name());
        info!(
            "  LIC Code : {:02X} ({})",
            header.old_licensee_code(),
            header.licensee_name()
        );
        info!("  ROM Vers : {:02X}", header.version());
        if header.checksum_ok() {
            info!("  Checksum : {:02X} (PASSED)", header.header_checksum());
        } else {
            warn!(
                "  Checksum : {:02X} (FAILED, computed {:02X})",
                header.header_checksum(),
                header.computed_checksum()
            );
        }

        let mut cart = Self {
            title: header.title(),
            rom: data,
            ram: vec![0; ram_size],
            mbc,
            header,
            save_path: None,
            mbc_state,
            rom_banks,
            low_offset: 0,
            high_offset: ROM_BANK_SIZE,
            ram_offset: 0,
        };
        cart.update_banking();
        cart
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of 16 KiB ROM banks addressable by the controller.
    pub fn rom_bank_count(&self) -> usize {
        self.rom_banks
    }

    /// Bank currently mapped at 0x4000-0x7FFF.
    pub fn rom_bank(&self) -> usize {
        self.high_offset / ROM_BANK_SIZE
    }

    pub fn ram_enabled(&self) -> bool {
        match self.mbc_state {
            MbcState::RomOnly => true,
            MbcState::Mbc1 { ram_enable, .. } => ram_enable,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        let offset = match addr {
            0x0000..=0x3FFF => self.low_offset + addr as usize,
            0x4000..=0x7FFF => self.high_offset + (addr as usize - 0x4000),
            0xA000..=0xBFFF => {
                if !self.ram_enabled() {
                    return 0xFF;
                }
                let idx = self.ram_offset + (addr as usize - 0xA000);
                return self.ram.get(idx).copied().unwrap_or(0xFF);
            }
            _ => return 0xFF,
        };
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if (0xA000..=0xBFFF).contains(&addr) {
            if self.ram_enabled() {
                let idx = self.ram_offset + (addr as usize - 0xA000);
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
            return;
        }
        match (&mut self.mbc_state, addr) {
            (MbcState::RomOnly, _) => return,
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            _ => return,
        }
        self.update_banking();
    }

    /// Recompute the mapped bank offsets from the controller registers.
    fn update_banking(&mut self) {
        let ram_banks = self.ram.len().div_ceil(RAM_BANK_SIZE);
        match self.mbc_state {
            MbcState::RomOnly => {
                self.low_offset = 0;
                self.high_offset = ROM_BANK_SIZE;
                self.ram_offset = 0;
            }
            MbcState::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ..
            } => {
                let upper = (ram_bank as usize & 0x03) << 5;
                let high = (upper | rom_bank as usize) % self.rom_banks;
                let low = if mode == 0 { 0 } else { upper % self.rom_banks };
                let ram = if mode == 0 || ram_banks == 0 {
                    0
                } else {
                    ram_bank as usize % ram_banks
                };
                self.low_offset = low * ROM_BANK_SIZE;
                self.high_offset = high * ROM_BANK_SIZE;
                self.ram_offset = ram * RAM_BANK_SIZE;
            }
        }
    }

    pub fn save_ram(&self) -> Result<(), CartridgeError> {
        if let (true, Some(path)) = (self.header.has_battery(), &self.save_path)
            && !self.ram.is_empty()
        {
            fs::write(path, &self.ram).map_err(|source| CartridgeError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
