//! Serial port tests: SB/SC registers, the debug output sink and link ports.

use std::collections::VecDeque;

use dmg_emu_core::bus::Bus;
use dmg_emu_core::serial::{LinkPort, NullLinkPort, OUTPUT_CAP, Serial};

/// A link port that records all bytes sent and returns pre-programmed responses.
struct RecordingLinkPort {
    responses: VecDeque<u8>,
}

impl LinkPort for RecordingLinkPort {
    fn transfer(&mut self, _byte: u8) -> u8 {
        self.responses.pop_front().unwrap_or(0xFF)
    }
}

fn send(serial: &mut Serial, if_reg: &mut u8, byte: u8) {
    serial.write(0xFF01, byte, if_reg);
    serial.write(0xFF02, 0x81, if_reg);
}

#[test]
fn null_link_port_returns_ff_by_default() {
    let mut port = NullLinkPort::new(false);
    assert_eq!(port.transfer(0x42), 0xFF);
    assert_eq!(port.transfer(0x00), 0xFF);
}

#[test]
fn null_link_port_loopback_echoes_byte() {
    let mut port = NullLinkPort::new(true);
    assert_eq!(port.transfer(0x42), 0x42);
}

#[test]
fn internal_clock_transfer_completes_immediately() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    send(&mut serial, &mut if_reg, b'A');

    assert_eq!(serial.peek_output(), b"A");
    assert_eq!(if_reg & 0x08, 0x08);
    assert_eq!(serial.read(0xFF01), 0xFF);
    assert_eq!(serial.read(0xFF02), 0x7F, "start bit cleared");
}

#[test]
fn external_clock_does_not_transfer() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    serial.write(0xFF01, b'B', &mut if_reg);
    serial.write(0xFF02, 0x80, &mut if_reg);

    assert!(serial.peek_output().is_empty());
    assert_eq!(if_reg, 0);
    assert_eq!(serial.read(0xFF02), 0xFE);
}

#[test]
fn loopback_port_keeps_sent_byte() {
    let mut serial = Serial::new();
    serial.connect(Box::new(NullLinkPort::new(true)));
    let mut if_reg = 0u8;
    send(&mut serial, &mut if_reg, 0x5C);
    assert_eq!(serial.read(0xFF01), 0x5C);
}

#[test]
fn partner_response_lands_in_sb() {
    let mut serial = Serial::new();
    serial.connect(Box::new(RecordingLinkPort {
        responses: VecDeque::from([0x10, 0x20]),
    }));
    let mut if_reg = 0u8;
    send(&mut serial, &mut if_reg, 0x01);
    assert_eq!(serial.read(0xFF01), 0x10);
    send(&mut serial, &mut if_reg, 0x02);
    assert_eq!(serial.read(0xFF01), 0x20);
    send(&mut serial, &mut if_reg, 0x03);
    assert_eq!(serial.read(0xFF01), 0xFF);
}

#[test]
fn newline_flushes_pending_line() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    for &b in b"hi" {
        send(&mut serial, &mut if_reg, b);
    }
    assert_eq!(serial.pending_line(), b"hi");
    send(&mut serial, &mut if_reg, b'\n');
    assert!(serial.pending_line().is_empty());
    assert_eq!(serial.peek_output(), b"hi\n");
}

#[test]
fn long_line_flushes_at_capacity() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    for _ in 0..130 {
        send(&mut serial, &mut if_reg, b'x');
    }
    assert_eq!(serial.pending_line().len(), 2);
    assert_eq!(serial.peek_output().len(), 130);
}

#[test]
fn undrained_output_is_bounded() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    for i in 0..2 * OUTPUT_CAP {
        send(&mut serial, &mut if_reg, (i % 251) as u8);
    }
    assert_eq!(serial.peek_output().len(), 2 * OUTPUT_CAP);

    send(&mut serial, &mut if_reg, b'!');
    let out = serial.peek_output();
    assert_eq!(out.len(), OUTPUT_CAP + 1);
    assert_eq!(out[0], (OUTPUT_CAP % 251) as u8);
    assert_eq!(out.last(), Some(&b'!'));
}

#[test]
fn take_output_drains_buffer() {
    let mut serial = Serial::new();
    let mut if_reg = 0u8;
    send(&mut serial, &mut if_reg, b'Z');
    assert_eq!(serial.take_output(), b"Z".to_vec());
    assert!(serial.peek_output().is_empty());
}

#[test]
fn bus_routes_serial_registers() {
    let mut bus = Bus::new();
    bus.write(0xFF01, b'P');
    bus.write(0xFF02, 0x81);
    assert_eq!(bus.serial.peek_output(), b"P");
    assert_eq!(bus.if_reg() & 0x08, 0x08);
}
