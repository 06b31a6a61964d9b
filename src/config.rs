use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::geometry::DisplayMetrics;
use crate::metrics::AnalysisParams;
use crate::placement::PlacementOptions;

/// What a pointer-up during the holding countdown means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EarlyReleasePolicy {
    /// Cancel the countdown and return to idle, unpenalized.
    #[default]
    ReturnToIdle,
    /// Treat the release as a failed trial.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Uniform range the holding delay is drawn from, ms.
    pub hold_delay_min_ms: f64,
    pub hold_delay_max_ms: f64,
    /// Pointer-down must land within this radius of anchor A, px.
    pub capture_radius_px: f64,
    /// Release further than this from target B is a miss, px.
    pub hit_radius_px: f64,
    pub early_release: EarlyReleasePolicy,
    pub display: DisplayMetrics,
    pub placement: PlacementOptions,
    pub analysis: AnalysisParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hold_delay_min_ms: 2000.0,
            hold_delay_max_ms: 5000.0,
            capture_radius_px: 65.0,
            hit_radius_px: 45.0,
            early_release: EarlyReleasePolicy::default(),
            display: DisplayMetrics::default(),
            placement: PlacementOptions::default(),
            analysis: AnalysisParams::default(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "refleks") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("refleks_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
