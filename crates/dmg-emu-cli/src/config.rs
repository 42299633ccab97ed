use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Classic green-tinted DMG shades, lightest first.
pub const DEFAULT_PALETTE: [&str; 4] = ["#9BBC0F", "#8BAC0F", "#306230", "#0F380F"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub bootrom_path: Option<PathBuf>,
    /// Frames to run when `--frames` is not given.
    pub frames: u64,
    /// RGB hex strings for shades 0-3, used when writing screenshots.
    pub palette: [String; 4],
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            bootrom_path: None,
            frames: 60,
            palette: DEFAULT_PALETTE.map(String::from),
            log_level: "info".to_string(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dmg-emu").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dmg-emu")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

pub fn load_from_file(path: &Path) -> CliConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return CliConfig::default(),
    };

    match toml::from_str::<CliConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            CliConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &CliConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
