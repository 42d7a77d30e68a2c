//! Host records and derived grouping keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};

/// A raw source row: column name to cell value.
pub type RawRow = BTreeMap<String, String>;

/// Group name prefixes.
pub const ENV_PREFIX: &str = "env_";
pub const APP_PREFIX: &str = "app_";
pub const PRODUCT_PREFIX: &str = "product_";
pub const SITE_PREFIX: &str = "site_";
pub const BATCH_PREFIX: &str = "batch_";
pub const DASHBOARD_PREFIX: &str = "dashboard_";

/// Columns modeled explicitly on [`Host`]; everything else lands in `metadata`.
pub const KNOWN_COLUMNS: &[&str] = &[
    "hostname",
    "cname",
    "environment",
    "status",
    "application_service",
    "product_id",
    "site_code",
    "datacenter",
    "instance",
    "batch_number",
    "patch_mode",
    "dashboard_group",
    "primary_application",
    "function",
    "ssl_port",
    "decommission_date",
    "ansible_tags",
];

/// Which identifier is the canonical inventory key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKey {
    #[default]
    Hostname,
    Cname,
}

impl InventoryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryKey::Hostname => "hostname",
            InventoryKey::Cname => "cname",
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hostname" => Ok(InventoryKey::Hostname),
            "cname" => Ok(InventoryKey::Cname),
            other => Err(format!(
                "invalid inventory key '{}', expected hostname or cname",
                other
            )),
        }
    }
}

/// Lifecycle status of a host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    Active,
    Decommissioned,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Active => "active",
            HostStatus::Decommissioned => "decommissioned",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(HostStatus::Active),
            "decommissioned" => Ok(HostStatus::Decommissioned),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Normalize a raw attribute value into a group-name fragment.
///
/// Lower-cases, collapses every run of non-alphanumeric characters into `_`
/// and trims leading and trailing underscores.
pub fn normalize_group_fragment(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Build a prefixed group name, or `None` when the value normalizes to nothing.
pub fn group_name(prefix: &str, raw: &str) -> Option<String> {
    let fragment = normalize_group_fragment(raw);
    if fragment.is_empty() {
        None
    } else {
        Some(format!("{}{}", prefix, fragment))
    }
}

/// A validated host record built from one source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub hostname: Option<String>,
    pub cname: Option<String>,
    pub environment: String,
    pub status: HostStatus,
    pub application_service: Option<String>,
    pub product_ids: Vec<String>,
    pub site_code: Option<String>,
    pub datacenter: Option<String>,
    pub instance: Option<String>,
    pub batch_number: Option<String>,
    pub patch_mode: Option<String>,
    pub dashboard_group: Option<String>,
    pub primary_application: Option<String>,
    pub function: Option<String>,
    pub ssl_port: Option<String>,
    pub decommission_date: Option<String>,
    pub ansible_tags: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Host {
    /// Create a minimal active host. Mostly useful for tests and tooling.
    pub fn new(hostname: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            cname: None,
            environment: environment.into(),
            status: HostStatus::Active,
            application_service: None,
            product_ids: Vec::new(),
            site_code: None,
            datacenter: None,
            instance: None,
            batch_number: None,
            patch_mode: None,
            dashboard_group: None,
            primary_application: None,
            function: None,
            ssl_port: None,
            decommission_date: None,
            ansible_tags: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_cname(mut self, cname: impl Into<String>) -> Self {
        self.cname = Some(cname.into());
        self
    }

    pub fn with_status(mut self, status: HostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application_service = Some(application.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product_ids.push(product.into());
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site_code = Some(site.into());
        self
    }

    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batch_number = Some(batch.into());
        self
    }

    /// Validate a raw row and build a host from it.
    ///
    /// The environment may be given as a short code; it is normalized through
    /// the configured location codes before validation.
    pub fn from_row(row: &RawRow, config: &InventoryConfig) -> InventoryResult<Self> {
        let get = |column: &str| -> Option<String> {
            row.get(column)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let hostname = get("hostname");
        let cname = get("cname");
        if hostname.is_none() && cname.is_none() {
            return Err(InventoryError::InvalidHost(
                "either hostname or cname is required".to_string(),
            ));
        }
        let label = hostname.clone().or_else(|| cname.clone()).unwrap_or_default();
        let invalid = |message: String| InventoryError::InvalidHost(format!("{}: {}", label, message));

        // Host names become host_vars file names.
        for name in hostname.iter().chain(cname.iter()) {
            if !is_safe_file_stem(name) {
                return Err(invalid(format!("'{}' cannot be used as a file name", name)));
            }
        }

        let raw_env = get("environment")
            .ok_or_else(|| invalid("environment is required".to_string()))?;
        let environment = config.environments.normalize(&raw_env);
        if !config.environments.is_supported(&environment) {
            return Err(invalid(format!(
                "invalid environment '{}', must be one of: {}",
                raw_env,
                config.environments.supported.join(", ")
            )));
        }

        let raw_status = get("status").unwrap_or_else(|| config.hosts.default_status.clone());
        let status_allowed = config
            .hosts
            .valid_status_values
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&raw_status));
        let status = match raw_status.parse::<HostStatus>() {
            Ok(status) if status_allowed => status,
            _ => {
                return Err(invalid(format!(
                    "invalid status '{}', must be one of: {}",
                    raw_status,
                    config.hosts.valid_status_values.join(", ")
                )))
            }
        };

        for column in ["ssl_port", "batch_number", "instance"] {
            if let Some(value) = get(column) {
                if value.parse::<i64>().is_err() {
                    return Err(invalid(format!(
                        "invalid {} '{}', must be an integer",
                        column, value
                    )));
                }
            }
        }

        let decommission_date = get("decommission_date");
        if let Some(date) = &decommission_date {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                return Err(invalid(format!(
                    "invalid decommission_date '{}', must be YYYY-MM-DD",
                    date
                )));
            }
        }

        let patch_mode = get("patch_mode");
        if let Some(mode) = &patch_mode {
            if !config.hosts.valid_patch_modes.iter().any(|m| m == mode) {
                return Err(invalid(format!(
                    "invalid patch_mode '{}', must be one of: {}",
                    mode,
                    config.hosts.valid_patch_modes.join(", ")
                )));
            }
        }

        let metadata = row
            .iter()
            .filter(|(column, _)| {
                !KNOWN_COLUMNS.contains(&column.as_str()) && product_column_index(column).is_none()
            })
            .map(|(column, value)| (column.clone(), value.trim().to_string()))
            .collect();

        Ok(Self {
            hostname,
            cname,
            environment,
            status,
            application_service: get("application_service"),
            product_ids: collect_product_ids(row),
            site_code: get("site_code"),
            datacenter: get("datacenter"),
            instance: get("instance"),
            batch_number: get("batch_number"),
            patch_mode,
            dashboard_group: get("dashboard_group"),
            primary_application: get("primary_application"),
            function: get("function"),
            ssl_port: get("ssl_port"),
            decommission_date,
            ansible_tags: get("ansible_tags"),
            metadata,
        })
    }

    /// The canonical identifier for the given key kind, falling back to the other name.
    pub fn canonical_key(&self, key: InventoryKey) -> &str {
        let (first, second) = match key {
            InventoryKey::Hostname => (&self.hostname, &self.cname),
            InventoryKey::Cname => (&self.cname, &self.hostname),
        };
        first
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| second.as_deref())
            .unwrap_or_default()
    }

    /// All identifiers this host may own files under.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.hostname
            .as_deref()
            .into_iter()
            .chain(self.cname.as_deref())
            .filter(|v| !v.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.status == HostStatus::Active
    }

    pub fn is_decommissioned(&self) -> bool {
        self.status == HostStatus::Decommissioned
    }

    pub fn environment_group_name(&self) -> String {
        format!("{}{}", ENV_PREFIX, normalize_group_fragment(&self.environment))
    }

    pub fn application_group_name(&self) -> Option<String> {
        self.application_service
            .as_deref()
            .and_then(|app| group_name(APP_PREFIX, app))
    }

    pub fn product_group_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.product_ids
            .iter()
            .filter_map(|id| group_name(PRODUCT_PREFIX, id))
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    pub fn site_group_name(&self) -> Option<String> {
        self.site_code
            .as_deref()
            .and_then(|site| group_name(SITE_PREFIX, site))
    }

    pub fn batch_group_name(&self) -> Option<String> {
        self.batch_number
            .as_deref()
            .and_then(|batch| group_name(BATCH_PREFIX, batch))
    }

    pub fn dashboard_group_name(&self) -> Option<String> {
        self.dashboard_group
            .as_deref()
            .and_then(|group| group_name(DASHBOARD_PREFIX, group))
    }

    pub fn primary_product_id(&self) -> Option<&str> {
        self.product_ids.first().map(String::as_str)
    }

    pub fn has_product(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|p| p == product_id.trim())
    }

    pub fn ansible_tags_list(&self) -> Vec<String> {
        self.ansible_tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn is_safe_file_stem(name: &str) -> bool {
    !name.contains(['/', '\\', '\0']) && name != "." && name != ".."
}

/// Index of a `product_<n>` column, if `column` is one.
fn product_column_index(column: &str) -> Option<u32> {
    column.strip_prefix(PRODUCT_PREFIX)?.parse().ok()
}

/// Gather product ids: the comma-separated `product_id` column first, then the
/// numbered `product_<n>` columns in ascending order, de-duplicated.
fn collect_product_ids(row: &RawRow) -> Vec<String> {
    let legacy = row
        .get("product_id")
        .map(|v| v.split(',').map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut numbered: Vec<(u32, &String)> = row
        .iter()
        .filter_map(|(column, value)| product_column_index(column).map(|idx| (idx, value)))
        .collect();
    numbered.sort_by_key(|(idx, _)| *idx);

    let mut ids: Vec<String> = Vec::new();
    for id in legacy
        .iter()
        .map(String::as_str)
        .chain(numbered.iter().map(|(_, v)| v.as_str()))
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Statistics gathered over one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventoryStats {
    pub total_hosts: usize,
    pub active_hosts: usize,
    pub decommissioned_hosts: usize,
    pub environment_counts: BTreeMap<String, usize>,
    pub application_groups: usize,
    pub product_groups: usize,
    pub orphaned_files_removed: usize,
    pub group_vars_orphans_removed: usize,
    /// Wall-clock generation time in seconds.
    pub generation_time: f64,
}

impl InventoryStats {
    pub fn add_host(&mut self, host: &Host) {
        self.total_hosts += 1;
        if host.is_decommissioned() {
            self.decommissioned_hosts += 1;
        } else {
            self.active_hosts += 1;
        }
        *self
            .environment_counts
            .entry(host.environment.clone())
            .or_insert(0) += 1;
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Inventory Statistics:".to_string(),
            format!("   Total hosts: {}", self.total_hosts),
            format!("   Active: {}", self.active_hosts),
            format!("   Decommissioned: {}", self.decommissioned_hosts),
            format!("   Application groups: {}", self.application_groups),
            format!("   Product groups: {}", self.product_groups),
            format!("   Orphaned host_vars removed: {}", self.orphaned_files_removed),
            format!("   Orphaned group_vars removed: {}", self.group_vars_orphans_removed),
            format!("   Generation time: {:.2}s", self.generation_time),
        ];

        if !self.environment_counts.is_empty() {
            lines.push("   Environment breakdown:".to_string());
            for (env, count) in &self.environment_counts {
                lines.push(format!("     {}: {}", env, count));
            }
        }

        lines.join("\n")
    }
}
