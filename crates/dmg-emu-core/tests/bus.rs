mod common;
use dmg_emu_core::{
    bus::{BootRom, BootRomError, Bus},
    cartridge::Cartridge,
    lcd::Mode,
};

fn bus_with_program(program: &[u8]) -> Bus {
    let mut bus = Bus::new();
    bus.load_cart(Cartridge::load(common::rom_with_program(program)));
    bus
}

#[test]
fn echo_ram_mirrors_work_ram() {
    let mut bus = Bus::new();
    bus.write(0xC123, 0x5A);
    assert_eq!(bus.read(0xE123), 0x5A);
    bus.write(0xFDFF, 0xA5);
    assert_eq!(bus.read(0xDDFF), 0xA5);
}

#[test]
fn unusable_region_reads_ff_and_ignores_writes() {
    let mut bus = Bus::new();
    bus.write(0xFEA0, 0x12);
    bus.write(0xFEFF, 0x34);
    assert_eq!(bus.read(0xFEA0), 0xFF);
    assert_eq!(bus.read(0xFEFF), 0xFF);
}

#[test]
fn high_ram_and_interrupt_enable() {
    let mut bus = Bus::new();
    bus.write(0xFF80, 0x11);
    bus.write(0xFFFE, 0x22);
    bus.write(0xFFFF, 0x1F);
    assert_eq!(bus.read(0xFF80), 0x11);
    assert_eq!(bus.read(0xFFFE), 0x22);
    assert_eq!(bus.ie_reg(), 0x1F);
}

#[test]
fn interrupt_flag_upper_bits_read_high() {
    let mut bus = Bus::new();
    bus.write(0xFF0F, 0xFF);
    assert_eq!(bus.if_reg(), 0x1F);
    assert_eq!(bus.read(0xFF0F), 0xFF);
    bus.write(0xFF0F, 0x00);
    assert_eq!(bus.read(0xFF0F), 0xE0);
}

#[test]
fn no_cartridge_reads_open_bus() {
    let bus = Bus::new();
    assert_eq!(bus.read(0x0000), 0xFF);
    assert_eq!(bus.read(0x4000), 0xFF);
    assert_eq!(bus.read(0xA000), 0xFF);
}

#[test]
fn boot_rom_overlays_until_ff50() {
    let mut bus = bus_with_program(&[0x3E, 0x05]);
    let boot = BootRom::new(vec![0x31; 0x100]).expect("valid boot rom");
    bus.load_boot_rom(boot);

    assert_eq!(bus.read(0x0000), 0x31);
    assert_eq!(bus.read(0x00FF), 0x31);
    assert_eq!(bus.read(0x0100), 0x3E, "boot rom only covers 0000-00FF");

    bus.write(0xFF50, 0x01);
    assert!(!bus.boot_mapped);
    assert_eq!(bus.read(0x0000), 0x00);
    assert_eq!(bus.read(0xFF50), 0xFF);
}

#[test]
fn boot_rom_rejects_wrong_size() {
    assert!(matches!(
        BootRom::new(vec![0; 0x200]),
        Err(BootRomError::InvalidSize(0x200))
    ));
    assert!(BootRom::from_file("/nonexistent/dmg_boot.bin").is_err());
}

#[test]
fn vram_locked_during_pixel_transfer() {
    let mut bus = Bus::new();
    bus.write(0x8000, 0x42);
    bus.write(0xFF40, 0x80);
    assert_eq!(bus.lcd.mode(), Mode::OamSearch);

    // 80 dots of OAM search.
    bus.tick(20);
    assert_eq!(bus.lcd.mode(), Mode::PixelTransfer);
    assert_eq!(bus.read(0x8000), 0xFF);
    bus.write(0x8000, 0x99);

    // Rest of mode 3.
    bus.tick(43);
    assert_eq!(bus.lcd.mode(), Mode::HBlank);
    assert_eq!(bus.read(0x8000), 0x42);
}

#[test]
fn lcd_off_resets_ly_and_mode() {
    let mut bus = Bus::new();
    bus.write(0xFF40, 0x80);
    bus.tick(114 * 3);
    assert_eq!(bus.read(0xFF44), 3);

    bus.write(0xFF40, 0x00);
    assert_eq!(bus.read(0xFF44), 0);
    assert_eq!(bus.read(0xFF41) & 0x03, Mode::HBlank as u8);
}

#[test]
fn joypad_reports_no_buttons() {
    let mut bus = Bus::new();
    bus.write(0xFF00, 0x20);
    assert_eq!(bus.read(0xFF00), 0xEF);
    bus.write(0xFF00, 0x10);
    assert_eq!(bus.read(0xFF00), 0xDF);
}

#[test]
fn audio_registers_are_retained() {
    let mut bus = Bus::new();
    bus.write(0xFF24, 0x77);
    bus.write(0xFF30, 0x12);
    bus.write(0xFF3F, 0x34);
    assert_eq!(bus.read(0xFF24), 0x77);
    assert_eq!(bus.read(0xFF30), 0x12);
    assert_eq!(bus.read(0xFF3F), 0x34);
}

#[test]
fn timer_runs_from_bus_tick() {
    let mut bus = Bus::new();
    bus.write(0xFF07, 0x05);
    bus.tick(4);
    assert_eq!(bus.read(0xFF05), 1);
    bus.write(0xFF04, 0x55);
    assert_eq!(bus.read(0xFF04), 0);
}

#[test]
fn post_boot_state() {
    let mut bus = Bus::new();
    bus.apply_post_boot_state();
    assert_eq!(bus.read(0xFF40), 0x91);
    assert_eq!(bus.read(0xFF47), 0xFC);
    assert_eq!(bus.read(0xFF04), 0xAB);
    assert_eq!(bus.if_reg() & 0x01, 0x01);
}
