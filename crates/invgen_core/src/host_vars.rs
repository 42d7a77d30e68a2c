//! Projection of a host record into its host_vars mapping.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::config::{InventoryConfig, ShortCnamePosition};
use crate::models::Host;

/// Record attributes that may be projected into a host_vars file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HostVarField {
    Hostname,
    Cname,
    Environment,
    Status,
    ApplicationService,
    ProductId,
    SiteCode,
    Datacenter,
    Instance,
    BatchNumber,
    PatchMode,
    DashboardGroup,
    PrimaryApplication,
    Function,
    SslPort,
    DecommissionDate,
    AnsibleTags,
    SupportGroup,
}

impl HostVarField {
    /// Key used in the host_vars file (and the source column name).
    pub fn key(&self) -> &'static str {
        use HostVarField::*;
        match self {
            Hostname => "hostname",
            Cname => "cname",
            Environment => "environment",
            Status => "status",
            ApplicationService => "application_service",
            ProductId => "product_id",
            SiteCode => "site_code",
            Datacenter => "datacenter",
            Instance => "instance",
            BatchNumber => "batch_number",
            PatchMode => "patch_mode",
            DashboardGroup => "dashboard_group",
            PrimaryApplication => "primary_application",
            Function => "function",
            SslPort => "ssl_port",
            DecommissionDate => "decommission_date",
            AnsibleTags => "ansible_tags",
            SupportGroup => "support_group",
        }
    }

    /// Read this field from a host; `None` means the attribute is absent.
    pub fn read(&self, host: &Host) -> Option<String> {
        use HostVarField::*;
        match self {
            Hostname => host.hostname.clone(),
            Cname => host.cname.clone(),
            Environment => Some(host.environment.clone()),
            Status => Some(host.status.to_string()),
            ApplicationService => host.application_service.clone(),
            ProductId => {
                if host.product_ids.is_empty() {
                    None
                } else {
                    Some(host.product_ids.join(","))
                }
            }
            SiteCode => host.site_code.clone(),
            Datacenter => host.datacenter.clone(),
            Instance => host.instance.clone(),
            BatchNumber => host.batch_number.clone(),
            PatchMode => host.patch_mode.clone(),
            DashboardGroup => host.dashboard_group.clone(),
            PrimaryApplication => host.primary_application.clone(),
            Function => host.function.clone(),
            SslPort => host.ssl_port.clone(),
            DecommissionDate => host.decommission_date.clone(),
            AnsibleTags => host.ansible_tags.clone(),
            SupportGroup => host
                .metadata
                .get("support_group")
                .filter(|v| !v.is_empty())
                .cloned(),
        }
    }
}

/// Build the sorted host_vars mapping for a host.
pub fn project_host_vars(host: &Host, config: &InventoryConfig) -> BTreeMap<String, Value> {
    let fields = &config.field_mappings.host_vars;
    let mut vars: BTreeMap<String, Value> = BTreeMap::new();

    for field in fields {
        let value = match (field, field.read(host)) {
            (HostVarField::SslPort, Some(port)) => match port.parse::<i64>() {
                Ok(port) => Value::from(port),
                Err(_) => Value::from(port),
            },
            (HostVarField::SupportGroup, None) => {
                Value::from(config.cmdb.default_support_group.clone())
            }
            (_, Some(value)) => Value::from(value),
            (_, None) => Value::from(""),
        };
        vars.insert(field.key().to_string(), value);
    }

    if config.hosts.function_append_short_cname {
        decorate_function(&mut vars, config.hosts.function_short_cname_position);
    }

    let claimed: BTreeSet<&str> = fields
        .iter()
        .map(|field| -> &str { field.key() })
        .chain(config.field_mappings.group_references.iter().map(String::as_str))
        .chain(std::iter::once("ansible_tags"))
        .collect();

    for (key, value) in &host.metadata {
        if !claimed.contains(key.as_str()) {
            vars.insert(key.clone(), Value::from(value.clone()));
        }
    }

    vars
}

/// Add the short cname (first DNS label) to the `function` value.
fn decorate_function(vars: &mut BTreeMap<String, Value>, position: ShortCnamePosition) {
    let function = vars.get("function").and_then(Value::as_str).unwrap_or_default();
    let cname = vars.get("cname").and_then(Value::as_str).unwrap_or_default();
    let short = cname.split('.').next().unwrap_or_default();

    if function.is_empty() || short.is_empty() || function.contains(short) {
        return;
    }

    let decorated = match position {
        ShortCnamePosition::Front => format!("{} - {}", short, function),
        ShortCnamePosition::Back => format!("{} ({})", function, short),
    };
    vars.insert("function".to_string(), Value::from(decorated));
}
