//! Configuration system for PostClone.
//!
//! Loaded from an explicit path, `.postclone.yml`, or
//! `~/.config/postclone/postclone.yml`, falling back to defaults.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use self::profile::{EnvironmentProfile, ProfileOverrides};

mod profile;

/// Property holding the current instance's name.
pub const DEFAULT_INSTANCE_PROPERTY: &str = "instance_name";

/// Property gating debug-level log output.
pub const DEFAULT_DEBUG_PROPERTY: &str = "debug.PostClone";

/// Property naming the group whose members may log in.
pub const DEFAULT_AUTHORIZED_GROUP_PROPERTY: &str = "group.property";

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Canonical instance names per environment.
    pub instances: InstanceNames,

    /// Property read to identify the current instance.
    #[serde(rename = "instance-property")]
    pub instance_property: String,

    /// Property that turns on debug log entries when set to `"true"`.
    #[serde(rename = "debug-property")]
    pub debug_property: String,

    /// Property naming the authorized login group.
    #[serde(rename = "authorized-group-property")]
    pub authorized_group_property: String,

    /// Record store settings.
    pub storage: StorageConfig,

    /// Development profile overrides.
    pub dev: ProfileOverrides,

    /// QA profile overrides.
    pub qa: ProfileOverrides,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            instances: InstanceNames::default(),
            instance_property: DEFAULT_INSTANCE_PROPERTY.to_string(),
            debug_property: DEFAULT_DEBUG_PROPERTY.to_string(),
            authorized_group_property: DEFAULT_AUTHORIZED_GROUP_PROPERTY.to_string(),
            storage: StorageConfig::default(),
            dev: ProfileOverrides::default(),
            qa: ProfileOverrides::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Resolved development profile.
    pub fn dev_profile(&self) -> EnvironmentProfile {
        self.dev.resolve(EnvironmentProfile::development())
    }

    /// Resolved QA profile.
    pub fn qa_profile(&self) -> EnvironmentProfile {
        self.qa.resolve(EnvironmentProfile::qa())
    }

    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .postclone.yml in current directory
    /// 3. ~/.config/postclone/postclone.yml
    /// 4. Defaults
    ///
    /// A config file that exists but does not parse is an error.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let mut candidates = vec![PathBuf::from(".postclone.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("postclone").join("postclone.yml"));
        }

        match Self::load_first(&candidates)? {
            Some(config) => Ok(config),
            None => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the first candidate that exists, if any.
    fn load_first(candidates: &[PathBuf]) -> Result<Option<Self>> {
        for path in candidates {
            if path.exists() {
                let config =
                    Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
                log::info!("Loaded config from {}", path.display());
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Parse configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("instances.dev", &self.instances.dev),
            ("instances.qa", &self.instances.qa),
            ("instances.prod", &self.instances.prod),
        ];
        for (key, name) in names {
            if name.is_empty() {
                eyre::bail!("{} must be set", key);
            }
        }
        if self.instances.dev == self.instances.qa
            || self.instances.dev == self.instances.prod
            || self.instances.qa == self.instances.prod
        {
            eyre::bail!("instances.dev, instances.qa and instances.prod must be distinct");
        }
        if self.instance_property.is_empty() {
            eyre::bail!("instance-property must be set");
        }
        self.dev.validate("dev")?;
        self.qa.validate("qa")?;
        Ok(())
    }
}

/// Canonical instance names, compared by exact string equality.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceNames {
    pub dev: String,
    pub qa: String,
    pub prod: String,
}

impl Default for InstanceNames {
    fn default() -> Self {
        Self {
            dev: "dev".to_string(),
            qa: "qa".to_string(),
            prod: "prod".to_string(),
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the JSONL collections.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".postclone"),
        }
    }
}
