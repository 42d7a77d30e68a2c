//! Inventory configuration.
//!
//! The configuration is an explicit value: it is loaded once (usually from
//! `inventory-config.yml`), adjusted by environment variables and command-line
//! flags, and then handed by reference to every component that needs it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{InventoryError, InventoryResult};
use crate::host_vars::HostVarField;
use crate::models::InventoryKey;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "inventory-config.yml";

/// Environment variable overriding `data.csv_file`.
pub const ENV_CSV_FILE: &str = "INVENTORY_CSV_FILE";
/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "INVENTORY_LOG_LEVEL";
/// Environment variable overriding `hosts.inventory_key`.
pub const ENV_INVENTORY_KEY: &str = "INVENTORY_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub paths: PathsConfig,
    pub data: DataConfig,
    pub environments: EnvironmentsConfig,
    pub hosts: HostsConfig,
    pub field_mappings: FieldMappings,
    pub group_vars: GroupVarsConfig,
    pub cmdb: CmdbConfig,
    pub features: FeaturesConfig,
    pub headers: HeadersConfig,
    pub logging: LoggingConfig,
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub inventory: PathBuf,
    pub host_vars: PathBuf,
    pub group_vars: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from("inventory"),
            host_vars: PathBuf::from("inventory/host_vars"),
            group_vars: PathBuf::from("inventory/group_vars"),
        }
    }
}

/// Source data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_file: PathBuf,
    /// Columns the CSV header must contain, besides `hostname` or `cname`.
    pub required_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_file: PathBuf::from("inventory_source/hosts.csv"),
            required_columns: vec!["environment".to_string()],
        }
    }
}

/// Mapping target for a short environment code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub name: String,
    pub inventory_file: String,
}

impl EnvironmentInfo {
    pub fn new(name: impl Into<String>, inventory_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inventory_file: inventory_file.into(),
        }
    }
}

/// Supported environments and their short codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    pub supported: Vec<String>,
    pub location_codes: BTreeMap<String, EnvironmentInfo>,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        let supported = ["production", "development", "test", "acceptance"];
        let codes = [
            ("PRD", "production"),
            ("DEV", "development"),
            ("TST", "test"),
            ("ACC", "acceptance"),
        ];

        Self {
            supported: supported.iter().map(|s| s.to_string()).collect(),
            location_codes: codes
                .iter()
                .map(|(code, name)| {
                    (
                        code.to_string(),
                        EnvironmentInfo::new(*name, format!("{}.yml", name)),
                    )
                })
                .collect(),
        }
    }
}

impl EnvironmentsConfig {
    /// Look up a short environment code (case-insensitive).
    pub fn lookup(&self, code: &str) -> Option<&EnvironmentInfo> {
        self.location_codes.get(&code.trim().to_uppercase())
    }

    /// Normalize a code or name to the canonical environment name.
    pub fn normalize(&self, value: &str) -> String {
        let value = value.trim();
        match self.lookup(value) {
            Some(info) => info.name.clone(),
            None => value.to_string(),
        }
    }

    /// Resolve an environment request to its name and inventory file name.
    pub fn resolve(&self, value: &str) -> EnvironmentInfo {
        let value = value.trim();
        match self.lookup(value) {
            Some(info) => info.clone(),
            None => EnvironmentInfo::new(value, format!("{}.yml", value)),
        }
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.supported.iter().any(|s| s == name)
    }
}

/// Where a short cname is placed when decorating the `function` host var.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShortCnamePosition {
    Front,
    #[default]
    Back,
}

/// Host validation and formatting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    pub inventory_key: InventoryKey,
    pub valid_status_values: Vec<String>,
    pub default_status: String,
    pub valid_patch_modes: Vec<String>,
    pub function_append_short_cname: bool,
    pub function_short_cname_position: ShortCnamePosition,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            inventory_key: InventoryKey::Hostname,
            valid_status_values: vec!["active".to_string(), "decommissioned".to_string()],
            default_status: "active".to_string(),
            valid_patch_modes: vec!["auto".to_string(), "manual".to_string()],
            function_append_short_cname: false,
            function_short_cname_position: ShortCnamePosition::Back,
        }
    }
}

/// Which record attributes are projected into host_vars files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMappings {
    pub host_vars: Vec<HostVarField>,
    /// Columns used only for grouping; never copied from the metadata bag.
    pub group_references: Vec<String>,
}

impl Default for FieldMappings {
    fn default() -> Self {
        use HostVarField::*;
        Self {
            host_vars: vec![
                Cname,
                Instance,
                SslPort,
                BatchNumber,
                PatchMode,
                DashboardGroup,
                PrimaryApplication,
                Function,
                DecommissionDate,
                SupportGroup,
            ],
            group_references: vec![
                "application_service".to_string(),
                "product_id".to_string(),
                "site_code".to_string(),
                "environment".to_string(),
            ],
        }
    }
}

/// Group-vars reconciliation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupVarsConfig {
    pub protected_files: Vec<String>,
}

/// CMDB defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CmdbConfig {
    pub default_support_group: String,
}

/// Feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub cleanup_orphaned_on_generate: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            cleanup_orphaned_on_generate: true,
        }
    }
}

/// Banner texts written into generated files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    pub auto_generated: String,
    pub host_vars: String,
    pub inventory: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            auto_generated: "AUTO-GENERATED FILE - DO NOT EDIT MANUALLY".to_string(),
            host_vars: "Generated from enhanced CSV with CMDB and patch management fields"
                .to_string(),
            inventory: "Generated from enhanced CSV with CMDB and patch management integration"
                .to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl InventoryConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            warn!("Configuration file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        debug!("Loading configuration from {:?}", path);
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content).map_err(|e| InventoryError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from YAML text, filling unspecified sections with defaults.
    pub fn from_yaml(content: &str) -> InventoryResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(csv_file) = lookup(ENV_CSV_FILE).filter(|v| !v.is_empty()) {
            info!("Using CSV file from environment: {}", csv_file);
            self.data.csv_file = PathBuf::from(csv_file);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }

        if let Some(key) = lookup(ENV_INVENTORY_KEY) {
            match key.parse::<InventoryKey>() {
                Ok(key) => self.hosts.inventory_key = key,
                Err(e) => warn!("Ignoring {}: {}", ENV_INVENTORY_KEY, e),
            }
        }

        self
    }

    /// Check cross-field consistency.
    pub fn validate(&self, path: &Path) -> InventoryResult<()> {
        let invalid = |message: String| InventoryError::InvalidConfig {
            path: path.to_path_buf(),
            message,
        };

        if self.environments.supported.is_empty() {
            return Err(invalid("environments.supported cannot be empty".to_string()));
        }

        for (code, info) in &self.environments.location_codes {
            if !self.environments.is_supported(&info.name) {
                return Err(invalid(format!(
                    "location code {} maps to unsupported environment '{}'",
                    code, info.name
                )));
            }
        }

        if !self
            .hosts
            .valid_status_values
            .iter()
            .any(|s| *s == self.hosts.default_status)
        {
            return Err(invalid(format!(
                "hosts.default_status '{}' is not one of {:?}",
                self.hosts.default_status, self.hosts.valid_status_values
            )));
        }

        Ok(())
    }
}
