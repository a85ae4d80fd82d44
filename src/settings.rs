use std::path::{Path, PathBuf};

use crate::canvas::DEFAULT_MAX_LAYERS;
use crate::error::Result;
use crate::log_warn;
use crate::ops::layout::DEFAULT_PADDING;
use crate::ops::transform::Interpolation;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Persistent editor preferences. CLI flags override them per run.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub max_layers: usize,
    /// Margin used by fit-to-viewport.
    pub view_padding: u32,
    pub jpeg_quality: u8,
    pub interpolation: Interpolation,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_layers: DEFAULT_MAX_LAYERS,
            view_padding: DEFAULT_PADDING,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            interpolation: Interpolation::Bilinear,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/gb7studio/gb7studio_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Gb7Studio\gb7studio_settings.cfg
    /// On macOS:   ~/Library/Application Support/Gb7Studio/gb7studio_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("gb7studio");
            return Some(config_dir.join("gb7studio_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("Gb7Studio").join("gb7studio_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Gb7Studio")
                    .join("gb7studio_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("gb7studio_settings.cfg")))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_layers={}\n\
             view_padding={}\n\
             jpeg_quality={}\n\
             interpolation={}\n\
             viewport_width={}\n\
             viewport_height={}\n",
            self.max_layers,
            self.view_padding,
            self.jpeg_quality,
            self.interpolation.key(),
            self.viewport_width,
            self.viewport_height,
        )
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep the default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_layers" => {
                    s.max_layers = val.parse().ok().filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_LAYERS);
                }
                "view_padding" => {
                    s.view_padding = val.parse().unwrap_or(DEFAULT_PADDING);
                }
                "jpeg_quality" => {
                    s.jpeg_quality = val
                        .parse::<u8>()
                        .ok()
                        .filter(|q| (1..=100).contains(q))
                        .unwrap_or(DEFAULT_JPEG_QUALITY);
                }
                "interpolation" => {
                    s.interpolation = Interpolation::from_key(val).unwrap_or_default();
                }
                "viewport_width" => {
                    s.viewport_width = val.parse().unwrap_or(s.viewport_width);
                }
                "viewport_height" => {
                    s.viewport_height = val.parse().unwrap_or(s.viewport_height);
                }
                _ => {}
            }
        }
        s
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }
}
