use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: HostConfig,
    pub gaze: GazeConfig,
    pub bright_region: BrightRegionConfig,
    pub motion: MotionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// First id handed to an enabled extension
    pub base_index: usize,
    /// Run extensions on one thread each per frame
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Sweep phase advance per frame (radians)
    pub step: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightRegionConfig {
    pub threshold: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Minimum luma difference for a pixel to count as changed
    pub threshold: u8,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_index: 0,
            parallel: false,
        }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self { step: 0.05 }
    }
}

impl Default for BrightRegionConfig {
    fn default() -> Self {
        Self { threshold: 200 }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { threshold: 25 }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "pose_vis.json";
    pub const PATH_ENV: &'static str = "POSE_VIS_CONFIG";

    /// `POSE_VIS_CONFIG` if set, else `pose_vis.json` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(Self::PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_PATH))
    }

    /// Load `path`, falling back to defaults when it is missing or malformed.
    ///
    /// A parsed or missing file is written back so new fields show up in it.
    /// A malformed file is left untouched for the user to fix.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Configuration file not found. Creating default at {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        // missing fields take their defaults via #[serde(default)]
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                config.save(path)?;
                Ok(config)
            }
            Err(e) => {
                log::warn!("Error parsing config {}: {}. Using defaults.", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
