use dmg_emu_core::timer::Timer;

#[test]
fn div_increment() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.step(256, &mut if_reg);
    assert_eq!(t.read(0xFF04), 1);
    assert_eq!(if_reg, 0);
}

#[test]
fn div_resets_on_write() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.div = 0xABCD;
    t.write(0xFF04, 0x12, &mut if_reg);
    assert_eq!(t.read(0xFF04), 0);
    assert_eq!(t.div, 0);
    assert_eq!(if_reg, 0);
}

#[test]
fn div_reset_ticks_tima_once_when_selected_bit_high() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.write(0xFF07, 0x05, &mut if_reg); // enable, bit 3
    t.div = 0x0008;
    t.write(0xFF04, 0, &mut if_reg);
    assert_eq!(t.tima, 1);
    assert_eq!(t.div, 0);

    t.write(0xFF04, 0, &mut if_reg);
    assert_eq!(t.tima, 1, "bit already low, no second edge");
}

#[test]
fn div_reset_with_selected_bit_low_is_quiet() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.write(0xFF07, 0x05, &mut if_reg);
    t.div = 0x0017; // bit 3 clear
    t.write(0xFF04, 0, &mut if_reg);
    assert_eq!(t.tima, 0);
}

#[test]
fn tac_disable_edge_tick() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.div = 0x0200; // bit9 high
    t.write(0xFF07, 0x04, &mut if_reg); // enable
    t.write(0xFF07, 0x00, &mut if_reg); // disable -> falling edge
    assert_eq!(t.tima, 1);
    assert_eq!(if_reg, 0);
}

#[test]
fn tima_increment_and_overflow() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    // enable timer, freq 00 (4096 Hz -> bit 9)
    t.write(0xFF07, 0x04, &mut if_reg);
    t.step(1024, &mut if_reg);
    assert_eq!(t.tima, 1);
    assert_eq!(if_reg, 0);

    t.tima = 0xFF;
    t.tma = 0xAB;
    t.step(1024, &mut if_reg);
    assert_eq!(t.tima, 0xAB);
    assert_eq!(if_reg & 0x04, 0x04);
}

#[test]
fn tima_overflow_on_single_edge() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.write(0xFF07, 0x05, &mut if_reg); // bit 3, 16 T-cycles per tick
    t.write(0xFF05, 0xFF, &mut if_reg);
    t.write(0xFF06, 0x42, &mut if_reg);
    t.div = 0x000F;
    t.step(1, &mut if_reg);
    assert_eq!(t.read(0xFF05), 0x42);
    assert_eq!(if_reg, 0x04);
}

#[test]
fn each_tac_rate_selects_its_bit() {
    for (tac, period) in [(0x04u8, 1024u16), (0x05, 16), (0x06, 64), (0x07, 256)] {
        let mut t = Timer::new();
        let mut if_reg = 0u8;
        t.write(0xFF07, tac, &mut if_reg);
        t.step(period - 1, &mut if_reg);
        assert_eq!(t.tima, 0, "tac {tac:02X}");
        t.step(1, &mut if_reg);
        assert_eq!(t.tima, 1, "tac {tac:02X}");
    }
}

#[test]
fn disabled_timer_does_not_count() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.write(0xFF07, 0x01, &mut if_reg);
    t.step(4096, &mut if_reg);
    assert_eq!(t.tima, 0);
    assert_eq!(t.read(0xFF04), 16);
}

#[test]
fn tac_reads_back_with_upper_bits_set() {
    let mut t = Timer::new();
    let mut if_reg = 0u8;
    t.write(0xFF07, 0xFD, &mut if_reg);
    assert_eq!(t.read(0xFF07), 0xFD);
    t.write(0xFF07, 0x02, &mut if_reg);
    assert_eq!(t.read(0xFF07), 0xFA);
}
