//! Timeline settings and on-disk locations.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::provider::ProviderId;
use crate::core::similarity::DEFAULT_SIMILARITY_THRESHOLD;
use crate::core::ticks::MAX_ZOOM_LEVEL;
use crate::core::year::ZoomRange;

/// Settings file name.
pub const SETTINGS_FILE: &str = "timemap.json";

/// Log file name used by `--log` without a path.
pub const LOG_FILE: &str = "timemap.log";

/// Tunables of the timeline engine. Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    pub full_range: ZoomRange,
    pub max_zoom_level: u32,
    /// Years added per decade-mode tick.
    pub decade_step: i32,
    pub decade_interval_ms: u64,
    pub sparse_interval_ms: u64,
    /// Decade-mode floor for the narrative context.
    pub narrative_min_year: i32,
    /// Decade-mode floor for every other context.
    pub default_min_year: i32,
    pub similarity_threshold: f64,
    /// Rendering watchdog period, 0 disables it.
    pub watchdog_interval_ms: u64,
    /// Overlay subsets with enough years for sparse-jump playback.
    pub sufficient_subsets: Vec<ProviderId>,
    /// Loader threads, 0 picks a default from the core count.
    pub workers: usize,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            full_range: ZoomRange::full(),
            max_zoom_level: MAX_ZOOM_LEVEL,
            decade_step: 10,
            decade_interval_ms: 1500,
            sparse_interval_ms: 2000,
            narrative_min_year: 1780,
            default_min_year: 1790,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            watchdog_interval_ms: 500,
            sufficient_subsets: vec!["Percent-Black".into(), "Percent-White".into()],
            workers: 0,
        }
    }
}

impl TimelineSettings {
    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Settings from the resolved config dir, or defaults when the file is absent.
    pub fn load_or_default(config: &PathConfig) -> Result<Self> {
        let path = config_file(SETTINGS_FILE, config);
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    pub fn is_sufficient(&self, subset: &ProviderId) -> bool {
        self.sufficient_subsets.contains(subset)
    }
}

/// Overrides for the default application paths.
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (TIMEMAP_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var("TIMEMAP_CONFIG_DIR").ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file.
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. TIMEMAP_CONFIG_DIR environment variable
/// 3. Current folder if it already holds timemap.json or timemap.log
/// 4. Platform config directory from dirs-next
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir()).join(name)
}

/// Path to a data file (logs). Same priority as [`config_file`], with the
/// platform data directory as the last resort.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir()).join(name)
}

/// Create the config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir());
    let data_dir = resolve_dir(config, dirs_next::data_dir());

    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir()
        && has_local_files(&current_dir)
    {
        return current_dir;
    }

    match platform {
        Some(dir) => dir.join("timemap"),
        None => PathBuf::from("."),
    }
}
