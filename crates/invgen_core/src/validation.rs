//! Row validation.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::config::InventoryConfig;
use crate::models::{Host, RawRow};

/// RFC 1123 host name, optionally dotted.
const HOSTNAME_PATTERN: &str =
    r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";

/// Validation result with details.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Outcome of validating a batch of rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowValidation {
    pub total_rows: usize,
    #[serde(skip)]
    pub hosts: Vec<Host>,
    pub result: ValidationResult,
}

impl RowValidation {
    pub fn valid_rows(&self) -> usize {
        self.hosts.len()
    }

    pub fn invalid_rows(&self) -> usize {
        self.total_rows - self.hosts.len()
    }
}

/// Validator for source rows.
pub struct RowValidator;

impl RowValidator {
    /// Validate every row, keeping the hosts that pass.
    ///
    /// Rejected rows become errors and are logged as warnings; suspicious but
    /// usable rows become warnings.
    pub fn validate_rows(rows: &[RawRow], config: &InventoryConfig) -> RowValidation {
        let mut validation = RowValidation {
            total_rows: rows.len(),
            hosts: Vec::with_capacity(rows.len()),
            result: ValidationResult::new(),
        };
        let hostname_re = Regex::new(HOSTNAME_PATTERN).ok();

        for (index, row) in rows.iter().enumerate() {
            let label = format!("Row {}", index + 1);
            match Host::from_row(row, config) {
                Ok(host) => {
                    validation
                        .result
                        .merge(Self::validate_host(&label, &host, hostname_re.as_ref()));
                    validation.hosts.push(host);
                }
                Err(e) => {
                    warn!("Skipping invalid row {}: {}", index + 1, e);
                    validation.result.add_error(format!("{}: {}", label, e));
                }
            }
        }

        validation
            .result
            .merge(Self::validate_unique_keys(&validation.hosts, config));
        validation
    }

    fn validate_host(label: &str, host: &Host, hostname_re: Option<&Regex>) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(re) = hostname_re {
            for name in host.identifiers() {
                if !re.is_match(name) {
                    result.add_warning(format!("{}: '{}' is not a valid DNS name", label, name));
                }
            }
        }

        if host.is_decommissioned() && host.decommission_date.is_none() {
            result.add_warning(format!(
                "{}: decommissioned host '{}' has no decommission_date",
                label,
                host.identifiers().next().unwrap_or_default()
            ));
        }

        if host.is_active() && host.application_service.is_none() {
            result.add_warning(format!(
                "{}: '{}' has no application_service and will only appear in its environment group",
                label,
                host.identifiers().next().unwrap_or_default()
            ));
        }

        result
    }

    /// Canonical keys name host_vars files, so they must be unique across the whole source.
    fn validate_unique_keys(hosts: &[Host], config: &InventoryConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for host in hosts {
            *counts
                .entry(host.canonical_key(config.hosts.inventory_key))
                .or_insert(0) += 1;
        }

        for (key, count) in counts {
            if count > 1 {
                result.add_warning(format!("'{}' appears {} times in the source", key, count));
            }
        }
        result
    }
}
