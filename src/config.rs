use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Args;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/svxlink-display/config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    pub i2c_bus: u8,
    pub i2c_address: u8,
    pub text_font: PathBuf,
    pub text_font_px: f32,
    pub icon_font: PathBuf,
    pub icon_font_px: f32,
    pub log_files: Vec<PathBuf>,
    pub tail_lines: usize,
    pub poll_interval_secs: u64,
    pub thermal_zone: PathBuf,
    pub ip_probe: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            title: "SVXLINK".to_string(),
            i2c_bus: 0,
            i2c_address: 0x3C,
            text_font: PathBuf::from("/opt/svxlink_display/PixelOperator.ttf"),
            text_font_px: 16.0,
            icon_font: PathBuf::from("/opt/svxlink_display/fa-solid-900.ttf"),
            icon_font_px: 12.0,
            log_files: vec![
                PathBuf::from("/var/log/svxlink.log"),
                PathBuf::from("/var/log/svxlink/svxlink.log"),
            ],
            tail_lines: 20,
            poll_interval_secs: 5,
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            ip_probe: "8.8.8.8:80".to_string(),
        }
    }
}

impl DisplayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Missing file is the normal case on a fresh install; a broken one is
    /// reported but never stops the daemon.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("{:#}, using defaults", e);
            Self::default()
        })
    }

    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        let mut args_provided = false;

        if let Some(bus) = args.bus {
            self.i2c_bus = bus;
            args_provided = true;
        }

        if let Some(address) = args.address {
            self.i2c_address = address;
            args_provided = true;
        }

        if let Some(interval) = args.interval {
            self.poll_interval_secs = interval;
            args_provided = true;
        }

        // An explicit log file is tried before the well-known locations
        if let Some(ref log_file) = args.log_file {
            self.log_files.insert(0, log_file.clone());
            args_provided = true;
        }

        if let Some(ref title) = args.title {
            self.title = title.clone();
            args_provided = true;
        }

        args_provided
    }

    pub fn validate(&mut self) {
        if self.tail_lines == 0 {
            warn!("tail_lines = 0 would never see a log line, using 1");
            self.tail_lines = 1;
        }
        if self.poll_interval_secs == 0 {
            warn!("poll_interval_secs = 0 would spin the panel bus, using 1");
            self.poll_interval_secs = 1;
        }
    }

    pub fn i2c_device(&self) -> String {
        format!("/dev/i2c-{}", self.i2c_bus)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Accepts `60` as well as `0x3C`.
pub fn parse_i2c_address(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title = \"PY7ABC-L\"\ni2c_address = 61").unwrap();

        let config = DisplayConfig::load(file.path()).unwrap();
        assert_eq!(config.title, "PY7ABC-L");
        assert_eq!(config.i2c_address, 0x3D);
        assert_eq!(config.tail_lines, 20);
        assert_eq!(config.log_files, DisplayConfig::default().log_files);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title = [not toml").unwrap();

        assert!(DisplayConfig::load(file.path()).is_err());
        assert_eq!(DisplayConfig::load_or_default(file.path()), DisplayConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DisplayConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, DisplayConfig::default());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from([
            "svxlink-display",
            "--address",
            "0x3d",
            "--log-file",
            "/tmp/svx.log",
            "--interval",
            "2",
        ]);
        let mut config = DisplayConfig::default();
        assert!(config.merge_with_args(&args));
        assert_eq!(config.i2c_address, 0x3D);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.log_files[0], PathBuf::from("/tmp/svx.log"));
        assert_eq!(config.log_files.len(), 3);

        let mut untouched = DisplayConfig::default();
        assert!(!untouched.merge_with_args(&Args::parse_from(["svxlink-display"])));
        assert_eq!(untouched, DisplayConfig::default());
    }

    #[test]
    fn test_validate_raises_zeroes() {
        let mut config = DisplayConfig {
            tail_lines: 0,
            poll_interval_secs: 0,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.tail_lines, 1);
        assert_eq!(config.poll_interval_secs, 1);
    }

    #[test]
    fn test_parse_i2c_address() {
        assert_eq!(parse_i2c_address("0x3C"), Ok(0x3C));
        assert_eq!(parse_i2c_address("60"), Ok(60));
        assert!(parse_i2c_address("0x1FF").is_err());
        assert!(parse_i2c_address("oled").is_err());
    }

    #[test]
    fn test_i2c_device_path() {
        assert_eq!(DisplayConfig::default().i2c_device(), "/dev/i2c-0");
    }
}
