use log::info;

use crate::interrupts::Interrupt;

/// Debug lines are flushed once they reach this many bytes without a newline.
const LINE_CAP: usize = 128;

/// Captured output keeps at least this many of the newest bytes. Older bytes
/// are dropped in blocks once twice this much has built up without a
/// [`Serial::take_output`].
pub const OUTPUT_CAP: usize = 64 * 1024;

pub trait LinkPort: Send {
    /// Transfer a byte over the link. Returns the byte received from the
    /// partner.
    fn transfer(&mut self, byte: u8) -> u8;
}

/// A stub link port used when no cable is attached.
/// Incoming bits are all 1, so any transfer receives 0xFF. When `loopback`
/// is true the sent byte is echoed back instead.
#[derive(Default)]
pub struct NullLinkPort {
    loopback: bool,
}

impl NullLinkPort {
    pub fn new(loopback: bool) -> Self {
        Self { loopback }
    }
}

impl LinkPort for NullLinkPort {
    fn transfer(&mut self, byte: u8) -> u8 {
        if self.loopback { byte } else { 0xFF }
    }
}

/// Serial registers SB/SC used as a one-character debug channel.
///
/// A write of SC with the start and internal-clock bits set completes the
/// transfer at once: the outgoing byte is captured, SB receives whatever the
/// link port returns and the serial interrupt is requested.
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    line: Vec<u8>,
    port: Box<dyn LinkPort>,
}

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0,
            sc: 0,
            out_buf: Vec::new(),
            line: Vec::with_capacity(LINE_CAP),
            port: Box::new(NullLinkPort::default()),
        }
    }

    pub fn connect(&mut self, port: Box<dyn LinkPort>) {
        self.port = port;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val & 0x81;
                if self.sc == 0x81 {
                    self.complete_transfer(if_reg);
                }
            }
            _ => {}
        }
    }

    fn complete_transfer(&mut self, if_reg: &mut u8) {
        let byte = self.sb;
        if self.out_buf.len() >= 2 * OUTPUT_CAP {
            self.out_buf.drain(..OUTPUT_CAP);
        }
        self.out_buf.push(byte);
        self.push_debug_byte(byte);
        self.sb = self.port.transfer(byte);
        self.sc &= !0x80;
        Interrupt::Serial.request(if_reg);
    }

    fn push_debug_byte(&mut self, byte: u8) {
        if byte == b'\n' {
            self.flush_line();
            return;
        }
        self.line.push(byte);
        if self.line.len() >= LINE_CAP {
            self.flush_line();
        }
    }

    fn flush_line(&mut self) {
        info!(target: "serial", "{}", String::from_utf8_lossy(&self.line));
        self.line.clear();
    }

    /// Bytes sent since the last [`take_output`](Self::take_output), minus any
    /// dropped by the [`OUTPUT_CAP`] bound.
    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    /// Bytes waiting for a newline before they are logged.
    pub fn pending_line(&self) -> &[u8] {
        &self.line
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}
