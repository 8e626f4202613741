use log::warn;
use retro24_system::driver::ClockSpeed;
use retro24_system::input::Key;
use retro24_system::DEFAULT_CYCLES_PER_FRAME;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Host key names bound to each Retro-24 key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
    pub action: String,
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self {
            up: "Up".to_string(),
            down: "Down".to_string(),
            left: "Left".to_string(),
            right: "Right".to_string(),
            action: "Space".to_string(),
        }
    }
}

impl KeyMapping {
    /// Resolve a host key name through the mapping (case-insensitive)
    pub fn key_for(&self, name: &str) -> Option<Key> {
        let bindings = [
            (&self.up, Key::Up),
            (&self.down, Key::Down),
            (&self.left, Key::Left),
            (&self.right, Key::Right),
            (&self.action, Key::Action),
        ];
        bindings
            .into_iter()
            .find(|(bound, _)| bound.eq_ignore_ascii_case(name))
            .map(|(_, key)| key)
    }
}

fn default_cycles_per_frame() -> u32 {
    DEFAULT_CYCLES_PER_FRAME
}

fn default_scale() -> u8 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub clock_speed: ClockSpeed,
    #[serde(default = "default_cycles_per_frame")]
    pub cycles_per_frame: u32,
    /// Pixel scale for image output
    #[serde(default = "default_scale")]
    pub scale: u8,
    #[serde(default)]
    pub keyboard: KeyMapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clock_speed: ClockSpeed::default(),
            cycles_per_frame: default_cycles_per_frame(),
            scale: default_scale(),
            keyboard: KeyMapping::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults on error
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            // Missing file just means defaults
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
