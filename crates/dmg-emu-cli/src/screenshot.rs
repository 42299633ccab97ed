use std::{fs::File, io::BufWriter, path::Path};

use dmg_emu_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::CliError;

/// Expand 2-bit shades to packed RGB through `palette`.
pub fn shades_to_rgb(screen: &[u8], palette: &[[u8; 3]; 4]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(screen.len() * 3);
    for &shade in screen {
        rgb.extend_from_slice(&palette[(shade & 0x03) as usize]);
    }
    rgb
}

pub fn write_png(path: &Path, screen: &[u8], palette: &[[u8; 3]; 4]) -> Result<(), CliError> {
    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        SCREEN_WIDTH as u32,
        SCREEN_HEIGHT as u32,
    );
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&shades_to_rgb(screen, palette))?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALETTE: [[u8; 3]; 4] = [[255, 255, 255], [170, 170, 170], [85, 85, 85], [0, 0, 0]];

    #[test]
    fn shades_map_through_palette() {
        let rgb = shades_to_rgb(&[0, 3, 1, 2], &PALETTE);
        assert_eq!(rgb, vec![255, 255, 255, 0, 0, 0, 170, 170, 170, 85, 85, 85]);
    }

    #[test]
    fn png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut screen = vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT];
        screen[0] = 3;
        write_png(&path, &screen, &PALETTE).unwrap();

        let decoder = png::Decoder::new(std::io::BufReader::new(File::open(&path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 3];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (160, 144));
        assert_eq!(&buf[..6], &[0, 0, 0, 255, 255, 255]);
    }
}
