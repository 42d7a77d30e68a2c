//! Generation orchestrator.
//!
//! A run loads and validates every row, removes generated files whose backing
//! row is gone, then builds and writes one inventory file (plus host_vars) per
//! requested environment. Only a failure to load any valid host aborts the run;
//! a failing environment is recorded and the loop moves on.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{EnvironmentInfo, InventoryConfig};
use crate::error::{InventoryError, InventoryResult};
use crate::host_vars::project_host_vars;
use crate::models::{Host, InventoryKey, InventoryStats};
use crate::reconcile::{group_var_names, host_identifiers, Reconciler, YAML_EXTENSION};
use crate::source::RowSource;
use crate::tree::InventoryTree;
use crate::validation::RowValidator;
use crate::writer::{InventoryWriter, WriteOutcome};

/// Host counts for one environment in a dry run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EnvironmentPrediction {
    pub active: usize,
    pub decommissioned: usize,
}

/// What a real run would do.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DryRunPrediction {
    pub inventory_files: Vec<PathBuf>,
    pub host_vars_files: usize,
    pub orphaned_host_vars: usize,
    pub orphaned_group_vars: usize,
    pub environments: BTreeMap<String, EnvironmentPrediction>,
}

/// Result of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    pub inventory_key: InventoryKey,
    pub environments: Vec<String>,
    pub generated_files: Vec<PathBuf>,
    pub unchanged_files: Vec<PathBuf>,
    pub host_vars_written: usize,
    pub host_vars_unchanged: usize,
    pub failed_environments: Vec<String>,
    pub skipped_environments: Vec<String>,
    pub stats: InventoryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<DryRunPrediction>,
}

impl GenerationResult {
    fn new(dry_run: bool, inventory_key: InventoryKey) -> Self {
        Self {
            success: true,
            error: None,
            dry_run,
            inventory_key,
            environments: Vec::new(),
            generated_files: Vec::new(),
            unchanged_files: Vec::new(),
            host_vars_written: 0,
            host_vars_unchanged: 0,
            failed_environments: Vec::new(),
            skipped_environments: Vec::new(),
            stats: InventoryStats::default(),
            prediction: dry_run.then(DryRunPrediction::default),
        }
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.prediction = None;
        self
    }
}

/// Files touched while generating one environment.
#[derive(Debug)]
struct EnvironmentOutput {
    inventory_file: PathBuf,
    inventory_outcome: WriteOutcome,
    host_vars_written: usize,
    host_vars_unchanged: usize,
    application_groups: usize,
    product_groups: usize,
}

/// Drives a full generation run against one configuration.
pub struct InventoryManager<'a> {
    config: &'a InventoryConfig,
    writer: InventoryWriter,
}

impl<'a> InventoryManager<'a> {
    pub fn new(config: &'a InventoryConfig) -> Self {
        Self {
            config,
            writer: InventoryWriter::new(config.headers.clone()),
        }
    }

    pub fn config(&self) -> &InventoryConfig {
        self.config
    }

    /// Load rows and keep the hosts that validate.
    ///
    /// Fails when the source cannot be read or yields no valid host.
    pub fn load_hosts(&self, source: &dyn RowSource) -> InventoryResult<Vec<Host>> {
        let rows = source.load_rows()?;
        let validation = RowValidator::validate_rows(&rows, self.config);

        for warning in &validation.result.warnings {
            debug!("{}", warning);
        }
        if validation.invalid_rows() > 0 {
            warn!(
                "Skipped {} invalid rows out of {}",
                validation.invalid_rows(),
                validation.total_rows
            );
        }

        if validation.hosts.is_empty() {
            return Err(InventoryError::NoValidHosts(source.describe()));
        }

        info!("Loaded {} hosts from {}", validation.hosts.len(), source.describe());
        Ok(validation.hosts)
    }

    /// Generate inventories for `environments` (all supported ones when `None`).
    pub fn generate(
        &self,
        source: &dyn RowSource,
        environments: Option<&[String]>,
        dry_run: bool,
    ) -> GenerationResult {
        let start = Instant::now();
        let key = self.config.hosts.inventory_key;
        let mut result = GenerationResult::new(dry_run, key);

        if dry_run {
            info!("[DRY RUN] No files will be written");
        }

        let hosts = match self.load_hosts(source) {
            Ok(hosts) => hosts,
            Err(e) => {
                error!("Failed to load hosts: {}", e);
                return result.fail(e.to_string());
            }
        };
        for host in &hosts {
            result.stats.add_host(host);
        }

        if self.config.features.cleanup_orphaned_on_generate {
            self.cleanup_orphans(&hosts, &mut result);
        }

        let targets = self.resolve_environments(environments);
        result.environments = targets.iter().map(|info| info.name.clone()).collect();

        for info in &targets {
            let env_hosts: Vec<&Host> = hosts.iter().filter(|h| h.environment == info.name).collect();
            if env_hosts.is_empty() {
                warn!("No hosts found for environment: {}", info.name);
                result.skipped_environments.push(info.name.clone());
                continue;
            }

            info!("Processing environment: {} ({} hosts)", info.name, env_hosts.len());

            if dry_run {
                self.predict_environment(info, &env_hosts, &mut result);
                continue;
            }

            match self.generate_environment(info, &env_hosts) {
                Ok(output) => {
                    info!("Generated {:?}", output.inventory_file);
                    result.host_vars_written += output.host_vars_written;
                    result.host_vars_unchanged += output.host_vars_unchanged;
                    result.stats.application_groups += output.application_groups;
                    result.stats.product_groups += output.product_groups;
                    if !output.inventory_outcome.changed() {
                        result.unchanged_files.push(output.inventory_file.clone());
                    }
                    result.generated_files.push(output.inventory_file);
                }
                Err(e) => {
                    error!("Failed to generate inventory for {}: {}", info.name, e);
                    result.failed_environments.push(info.name.clone());
                }
            }
        }

        if !result.failed_environments.is_empty() {
            warn!(
                "Environments not generated due to errors: {}",
                result.failed_environments.join(", ")
            );
        }
        if !result.skipped_environments.is_empty() {
            warn!(
                "Environments skipped without hosts: {}",
                result.skipped_environments.join(", ")
            );
        }

        result.stats.generation_time = start.elapsed().as_secs_f64();
        info!(
            "Generation finished in {:.2}s: {} inventory files, {} host_vars written",
            result.stats.generation_time,
            result.generated_files.len(),
            result.host_vars_written
        );
        result
    }

    /// Normalize requested names or codes, dropping duplicates but keeping order.
    fn resolve_environments(&self, requested: Option<&[String]>) -> Vec<EnvironmentInfo> {
        let names: Vec<String> = match requested {
            Some(envs) if !envs.is_empty() => envs.to_vec(),
            _ => self.config.environments.supported.clone(),
        };

        let mut targets: Vec<EnvironmentInfo> = Vec::new();
        for name in &names {
            let info = self.config.environments.resolve(name);
            if !targets.iter().any(|t| t.name == info.name) {
                targets.push(info);
            }
        }
        targets
    }

    fn cleanup_orphans(&self, hosts: &[Host], result: &mut GenerationResult) {
        let dry_run = result.dry_run;

        let host_vars = Reconciler::new("host_vars")
            .reconcile(&self.config.paths.host_vars, &host_identifiers(hosts), dry_run)
            .unwrap_or_else(|e| {
                error!("Host vars cleanup failed: {}", e);
                0
            });

        let group_vars_dir = &self.config.paths.group_vars;
        let group_vars = if group_vars_dir.is_dir() {
            Reconciler::new("group_vars")
                .with_protected(self.config.group_vars.protected_files.iter().cloned())
                .reconcile(group_vars_dir, &group_var_names(hosts), dry_run)
                .unwrap_or_else(|e| {
                    error!("Group vars cleanup failed: {}", e);
                    0
                })
        } else {
            debug!("Group vars directory {:?} does not exist, skipping cleanup", group_vars_dir);
            0
        };

        match result.prediction.as_mut() {
            Some(prediction) => {
                prediction.orphaned_host_vars = host_vars;
                prediction.orphaned_group_vars = group_vars;
            }
            None => {
                result.stats.orphaned_files_removed = host_vars;
                result.stats.group_vars_orphans_removed = group_vars;
            }
        }
    }

    fn inventory_path(&self, info: &EnvironmentInfo) -> PathBuf {
        self.config.paths.inventory.join(&info.inventory_file)
    }

    fn host_vars_path(&self, host_key: &str) -> PathBuf {
        self.config
            .paths
            .host_vars
            .join(format!("{}.{}", host_key, YAML_EXTENSION))
    }

    fn predict_environment(&self, info: &EnvironmentInfo, hosts: &[&Host], result: &mut GenerationResult) {
        let active: Vec<&Host> = hosts.iter().copied().filter(|h| h.is_active()).collect();
        let tree = InventoryTree::build(active.iter().copied(), &info.name, self.config.hosts.inventory_key);
        result.stats.application_groups += tree.application_group_count();
        result.stats.product_groups += tree.product_group_count();

        let path = self.inventory_path(info);
        info!(
            "[DRY RUN] Would write {:?} with {} active hosts",
            path,
            active.len()
        );

        if let Some(prediction) = result.prediction.as_mut() {
            prediction.inventory_files.push(path);
            prediction.host_vars_files += active.len();
            prediction.environments.insert(
                info.name.clone(),
                EnvironmentPrediction {
                    active: active.len(),
                    decommissioned: hosts.len() - active.len(),
                },
            );
        }
    }

    fn generate_environment(&self, info: &EnvironmentInfo, hosts: &[&Host]) -> InventoryResult<EnvironmentOutput> {
        let key = self.config.hosts.inventory_key;
        let active: Vec<&Host> = hosts.iter().copied().filter(|h| h.is_active()).collect();
        debug!(
            "{}: {} active, {} decommissioned",
            info.name,
            active.len(),
            hosts.len() - active.len()
        );

        let mut host_vars_written = 0;
        let mut host_vars_unchanged = 0;
        for host in &active {
            let host_key = host.canonical_key(key);
            let vars = project_host_vars(host, self.config);
            let outcome = self
                .writer
                .write_host_vars(&vars, &self.host_vars_path(host_key), host_key)?;
            if outcome.changed() {
                host_vars_written += 1;
            } else {
                host_vars_unchanged += 1;
            }
        }

        let tree = InventoryTree::build(active.iter().copied(), &info.name, key);
        let inventory_file = self.inventory_path(info);
        let title = format!("{} Environment", title_case(&info.name));
        let inventory_outcome = self
            .writer
            .write_inventory(&tree.to_document(), &inventory_file, &title)?;

        Ok(EnvironmentOutput {
            inventory_file,
            inventory_outcome,
            host_vars_written,
            host_vars_unchanged,
            application_groups: tree.application_group_count(),
            product_groups: tree.product_group_count(),
        })
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
