//! Host inventory and run settings (`hosts.toml`)
//!
//! ```toml
//! [settings]
//! connect_timeout_secs = 7
//! staging_dir = "/tmp/fleetform"
//!
//! [[hosts]]
//! name = "web-1"
//! address = "10.0.0.5"
//! username = "ubuntu"
//! spec = "web"
//! auth = "key"
//! ```

use anyhow::{Context, Result, bail};
use provision::{DEFAULT_CHANNEL_CAPACITY, Host, PipelineOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds to wait for an ssh connection
    pub connect_timeout_secs: u64,
    /// Seconds a single remote command may run
    pub operation_timeout_secs: u64,
    /// Remote directory for staging uploads
    pub staging_dir: String,
    /// Prefix for commands that need root
    pub elevate: String,
    /// Command that must succeed before anything runs as root
    pub elevation_probe: String,
    pub refresh_command: String,
    pub install_command: String,
    /// Bound of each job output channel
    pub channel_capacity: usize,
    /// Extra spec directories, searched after the defaults
    pub spec_dirs: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            connect_timeout_secs: options.connect_timeout.as_secs(),
            operation_timeout_secs: 300,
            staging_dir: options.staging_dir,
            elevate: options.elevate,
            elevation_probe: options.elevation_probe,
            refresh_command: options.refresh_command,
            install_command: options.install_command,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            spec_dirs: Vec::new(),
        }
    }
}

impl Settings {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            elevate: self.elevate.clone(),
            elevation_probe: self.elevation_probe.clone(),
            refresh_command: self.refresh_command.clone(),
            install_command: self.install_command.clone(),
            staging_dir: self.staging_dir.clone(),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

impl Inventory {
    /// Load the inventory from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::hosts_file()?)
    }

    /// Load an inventory file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No inventory at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read inventory: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Save the inventory to the config directory
    pub fn save(&self) -> Result<PathBuf> {
        let path = paths::hosts_file()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize inventory")?;
        fs::write(path, content)
            .with_context(|| format!("Could not write inventory: {}", path.display()))
    }

    pub fn find_host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Add a host; names must be unique
    pub fn add_host(&mut self, host: Host) -> Result<()> {
        if self.find_host(&host.name).is_some() {
            bail!("Host '{}' already exists", host.name);
        }
        self.hosts.push(host);
        Ok(())
    }

    pub fn remove_host(&mut self, name: &str) -> Option<Host> {
        let index = self.hosts.iter().position(|h| h.name == name)?;
        Some(self.hosts.remove(index))
    }
}
