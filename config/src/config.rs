use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default number of future milestones a node keeps queued.
pub const DEFAULT_FUTURE_MILESTONE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub data_dir: String,
    /// Master switch for milestone enforcement. Checked on every validation call.
    #[serde(default = "default_milestone_enabled")]
    pub milestone_enabled: bool,
    #[serde(default = "default_future_capacity")]
    pub future_milestone_capacity: usize,
}

fn default_milestone_enabled() -> bool {
    true
}

fn default_future_capacity() -> usize {
    DEFAULT_FUTURE_MILESTONE_CAPACITY
}

impl Config {
    fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.into_owned())
    }

    fn base_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        // Use a Windows-friendly folder when building on Windows to avoid tilde expansion issues.
        if cfg!(target_os = "windows") {
            return dirs::data_dir().unwrap_or(home).join("Astram");
        }

        home.join(".Astram")
    }

    /// Compute the default data directory depending on the target OS.
    fn default_data_dir() -> String {
        Self::base_dir()
            .join("milestones")
            .to_string_lossy()
            .into_owned()
    }

    pub fn default_path() -> PathBuf {
        Self::base_dir().join("whitelist.json")
    }

    /// Data directory with tilde expansion applied.
    pub fn data_dir_resolved(&self) -> PathBuf {
        Self::expand_path(&self.data_dir)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Reads the configuration at `path`, writing defaults there first if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            println!(
                "Configuration file not found. Creating default configuration: {:?}",
                path
            );
            let cfg = Self::default();
            cfg.save_to(path)?;
            return Ok(cfg);
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("configuration file format error in {:?}", path))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Updates a single key from its string form. Values are parsed to the field's type.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = value.to_string(),
            "milestone_enabled" => {
                self.milestone_enabled = value
                    .parse()
                    .map_err(|_| anyhow!("milestone_enabled expects true or false, got {}", value))?
            }
            "future_milestone_capacity" => {
                self.future_milestone_capacity = value.parse().map_err(|_| {
                    anyhow!(
                        "future_milestone_capacity expects a non-negative integer, got {}",
                        value
                    )
                })?
            }
            _ => return Err(anyhow!("unknown configuration key: {}", key)),
        }
        Ok(())
    }

    pub fn view(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn init_default() -> Result<PathBuf> {
        let path = Self::default_path();
        Self::default().save_to(&path)?;
        Ok(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            milestone_enabled: default_milestone_enabled(),
            future_milestone_capacity: DEFAULT_FUTURE_MILESTONE_CAPACITY,
        }
    }
}
