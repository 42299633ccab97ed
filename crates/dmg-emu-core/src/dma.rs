use log::debug;

/// Bytes copied by one OAM DMA transfer.
pub const OAM_DMA_LEN: u16 = 0xA0;

/// OAM DMA controller (0xFF46).
///
/// The controller only tracks progress. Each [`tick`](OamDma::tick) yields the
/// source and destination of the byte to move and the bus performs the copy,
/// so the transfer sees the same memory map as the CPU.
#[derive(Debug, Clone, Default)]
pub struct OamDma {
    active: bool,
    /// Last value written to 0xFF46.
    source: u8,
    index: u16,
    start_delay: u8,
}

impl OamDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a transfer from `value << 8`. A transfer already in flight is
    /// restarted.
    pub fn start(&mut self, value: u8) {
        debug!("OAM DMA from {:04X}", (value as u16) << 8);
        self.active = true;
        self.source = value;
        self.index = 0;
        self.start_delay = 1;
    }

    /// Advance one machine cycle. Returns `(src, dst)` when a byte moves.
    pub fn tick(&mut self) -> Option<(u16, u16)> {
        if !self.active {
            return None;
        }
        if self.start_delay > 0 {
            self.start_delay -= 1;
            return None;
        }

        let src = ((self.source as u16) << 8).wrapping_add(self.index);
        let dst = 0xFE00 + self.index;
        self.index += 1;
        self.active = self.index < OAM_DMA_LEN;
        Some((src, dst))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Value last written to the trigger register.
    pub fn source(&self) -> u8 {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_delay_then_one_byte_per_tick() {
        let mut dma = OamDma::new();
        assert_eq!(dma.tick(), None);
        dma.start(0xC1);
        assert_eq!(dma.tick(), None);
        assert_eq!(dma.tick(), Some((0xC100, 0xFE00)));
        assert_eq!(dma.tick(), Some((0xC101, 0xFE01)));
    }

    #[test]
    fn finishes_after_160_bytes() {
        let mut dma = OamDma::new();
        dma.start(0x80);
        let moved: Vec<_> = (0..200).filter_map(|_| dma.tick()).collect();
        assert_eq!(moved.len(), OAM_DMA_LEN as usize);
        assert_eq!(moved.last(), Some(&(0x809F, 0xFE9F)));
        assert!(!dma.is_active());
        assert_eq!(dma.source(), 0x80);
    }
}
