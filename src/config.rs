//! Configuration management for the illumd daemon.
//!
//! Handles locating, parsing and validating the YAML configuration file
//! that tunes the brightness curve and the step applied per key press.

use crate::fraction::Fraction;
use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "ILLUMD_CONFIG";

/// Highest supported linearity. Larger values overflow the exact
/// arithmetic on common `max_brightness` ranges.
pub const MAX_LINEARITY: u32 = 3;

/// Main configuration structure for the illumd daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// linearity: 2
/// step_percent: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Exponent of the perceptual brightness curve; 1 is linear.
    #[serde(default = "defaults::linearity")]
    pub linearity: u32,

    /// Brightness change per key press, in percent of full scale.
    #[serde(default = "defaults::step_percent")]
    pub step_percent: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            linearity: defaults::linearity(),
            step_percent: defaults::step_percent(),
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// Searches in the following order:
    /// 1. Provided path parameter
    /// 2. `ILLUMD_CONFIG` environment variable
    /// 3. `XDG_CONFIG_HOME/illumd/config.yml` or `~/.config/illumd/config.yml`
    /// 4. `/etc/illumd/config.yml`
    ///
    /// Falls back to the built-in defaults when no file is found. An
    /// explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(locate_config) {
            Some(path) => Self::load_from_path(&path),
            None => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reads and parses `path` without validating it.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        info!("Loading config from: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))
    }

    /// Replaces file values with the ones given on the command line.
    pub fn with_overrides(mut self, linearity: Option<u32>, step_percent: Option<u8>) -> Self {
        if let Some(linearity) = linearity {
            self.linearity = linearity;
        }
        if let Some(step_percent) = step_percent {
            self.step_percent = step_percent;
        }
        self
    }

    /// Checks version and value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!("Unsupported config version {}", self.version);
        }
        if !(1..=MAX_LINEARITY).contains(&self.linearity) {
            bail!(
                "linearity must be between 1 and {MAX_LINEARITY}, got {}",
                self.linearity
            );
        }
        if !(1..=100).contains(&self.step_percent) {
            bail!(
                "step_percent must be between 1 and 100, got {}",
                self.step_percent
            );
        }
        Ok(())
    }

    /// Step applied per key press as a fraction of full scale.
    pub fn step(&self) -> Fraction {
        Fraction::percent(self.step_percent)
    }
}

mod defaults {
    pub fn linearity() -> u32 {
        2
    }

    pub fn step_percent() -> u8 {
        5
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Some(env_path) = env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("illumd/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/illumd/config.yml");
    etc.exists().then(|| etc.to_path_buf())
}
