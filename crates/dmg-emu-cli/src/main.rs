mod config;
mod screenshot;

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    thread,
};

use clap::Parser;
use crossbeam_channel as cb;
use dmg_emu_core::{bus::BootRom, gameboy::GameBoy};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "dmg-emu", about = "Headless Game Boy (DMG) emulator")]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many CPU machine cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Write the last published frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Config file (defaults to the XDG config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    write_config: bool,

    /// Log filter, e.g. `debug` or `dmg_emu_core=trace`
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no ROM supplied")]
    NoRom,
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid palette color {0:?}")]
    Palette(String),
    #[error("failed to encode PNG: {0}")]
    Png(#[from] png::EncodingError),
    #[error("emulation thread panicked")]
    Worker,
}

/// Sent by the emulation thread after each frame.
struct FrameDone {
    frame: u64,
    /// Serial bytes drained during this frame.
    serial: Vec<u8>,
}

/// Reported by the emulation thread when it stops.
struct RunSummary {
    frames: u64,
    cycles: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let filter = args.log_level.as_deref().unwrap_or(&cfg.log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(args, cfg, config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args, mut cfg: CliConfig, config_path: PathBuf) -> Result<(), CliError> {
    if let Some(path) = &args.bootrom {
        cfg.bootrom_path = Some(path.clone());
    }
    if let Some(frames) = args.frames {
        cfg.frames = frames;
    }
    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }
    let palette = parse_palette(&cfg.palette)?;

    if args.write_config {
        config::save_to_file(&config_path, &cfg).map_err(|source| CliError::Io {
            path: config_path.clone(),
            source,
        })?;
        info!("Wrote config to {}", config_path.display());
    }

    let rom_path = args.rom.ok_or(CliError::NoRom)?;

    let boot = cfg
        .bootrom_path
        .as_ref()
        .and_then(|path| match BootRom::from_file(path) {
            Ok(b) => Some(b),
            Err(e) => {
                warn!("Skipping boot ROM: {e}");
                None
            }
        });
    let mut gb = GameBoy::with_boot_rom(boot);
    if !gb.load_rom_file(&rom_path) {
        warn!("Continuing with an empty cartridge slot");
    }

    let front = gb.front_buffer();
    let frame_limit = cfg.frames;
    let cycle_limit = args.cycles;
    let (frame_tx, frame_rx) = cb::bounded::<FrameDone>(4);

    let worker = thread::Builder::new()
        .name("emulation".into())
        .spawn(move || {
            let mut frames = 0u64;
            while frames < frame_limit {
                gb.run_frame();
                frames += 1;
                let done = FrameDone {
                    frame: frames,
                    serial: gb.bus.serial.take_output(),
                };
                if frame_tx.send(done).is_err() {
                    break;
                }
                if cycle_limit.is_some_and(|max| gb.cpu.cycles >= max) {
                    break;
                }
            }
            gb.bus.save_cart_ram();
            RunSummary {
                frames,
                cycles: gb.cpu.cycles,
            }
        })
        .map_err(|source| CliError::Io {
            path: PathBuf::from("<emulation thread>"),
            source,
        })?;

    let mut checksum = 0u32;
    let mut stdout = io::stdout().lock();
    for done in frame_rx.iter() {
        checksum = front.with_frame(|f| frame_checksum(f.screen()));
        if done.frame.is_multiple_of(60) {
            debug!("frame {} checksum {checksum:08X}", done.frame);
        }
        if !done.serial.is_empty() {
            let written = stdout.write_all(&done.serial).and_then(|()| stdout.flush());
            if let Err(e) = written {
                warn!("Failed to write serial output: {e}");
            }
        }
    }

    let summary = worker.join().map_err(|_| CliError::Worker)?;
    info!(
        "Ran {} frames ({} cycles), last frame checksum {checksum:08X}",
        summary.frames, summary.cycles
    );

    if let Some(path) = &args.screenshot {
        screenshot::write_png(path, &front.screen_snapshot(), &palette)?;
        info!("Saved screenshot to {}", path.display());
    }

    Ok(())
}

fn parse_palette(colors: &[String; 4]) -> Result<[[u8; 3]; 4], CliError> {
    let mut out = [[0u8; 3]; 4];
    for (dst, s) in out.iter_mut().zip(colors) {
        *dst = config::parse_hex_color(s).ok_or_else(|| CliError::Palette(s.clone()))?;
    }
    Ok(out)
}

/// FNV-1a over the shade buffer.
fn frame_checksum(screen: &[u8]) -> u32 {
    screen.iter().fold(0x811C_9DC5u32, |h, &b| {
        (h ^ b as u32).wrapping_mul(0x0100_0193)
    })
}
