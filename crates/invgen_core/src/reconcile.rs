//! Removal of generated files that no longer have a backing record.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, error, info};

use crate::error::InventoryResult;
use crate::models::Host;

/// Extension of every generated YAML file.
pub const YAML_EXTENSION: &str = "yml";

/// Deletes files in a directory whose stem is not in a set of valid identifiers.
#[derive(Debug, Clone)]
pub struct Reconciler {
    label: String,
    protected: BTreeSet<String>,
}

impl Reconciler {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            protected: BTreeSet::new(),
        }
    }

    /// File names (with extension) that are never removed.
    pub fn with_protected<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected.extend(files.into_iter().map(Into::into));
        self
    }

    /// List files in `dir` whose stem is absent from `valid`.
    pub fn find_orphans(&self, dir: &Path, valid: &BTreeSet<String>) -> InventoryResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.{}",
            Pattern::escape(&dir.to_string_lossy()),
            YAML_EXTENSION
        );

        let mut orphans = Vec::new();
        for path in glob::glob(&pattern)?.filter_map(|entry| entry.ok()) {
            if !path.is_file() {
                continue;
            }

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.protected.contains(&file_name) {
                debug!("Skipping protected {} file: {:?}", self.label, path);
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if !valid.contains(&stem) {
                orphans.push(path);
            }
        }

        Ok(orphans)
    }

    /// Remove orphaned files, or only count them when `dry_run` is set.
    ///
    /// Per-file failures are logged and left out of the returned count.
    pub fn reconcile(&self, dir: &Path, valid: &BTreeSet<String>, dry_run: bool) -> InventoryResult<usize> {
        let orphans = self.find_orphans(dir, valid)?;
        if orphans.is_empty() {
            return Ok(0);
        }

        info!("Found {} orphaned {} files", orphans.len(), self.label);

        if dry_run {
            info!("[DRY RUN] Would remove orphaned {} files:", self.label);
            for path in orphans.iter().take(5) {
                info!("  - {}", display_name(path));
            }
            if orphans.len() > 5 {
                info!("  ... and {} more", orphans.len() - 5);
            }
            return Ok(orphans.len());
        }

        let mut removed = 0;
        for path in &orphans {
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed orphaned file: {}", display_name(path));
                    removed += 1;
                }
                Err(e) => error!("Failed to remove {:?}: {}", path, e),
            }
        }

        if removed > 0 {
            info!("Cleaned up {} orphaned {} files", removed, self.label);
        }
        Ok(removed)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every hostname and cname across all hosts, regardless of environment or status.
pub fn host_identifiers<'a, I>(hosts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Host>,
{
    hosts
        .into_iter()
        .flat_map(|host| host.identifiers().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

/// Group names that may legitimately have a group_vars file.
pub fn group_var_names<'a, I>(hosts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Host>,
{
    let mut names = BTreeSet::new();
    for host in hosts {
        names.insert(host.environment_group_name());
        names.extend(host.application_group_name());
        names.extend(host.product_group_names());
        names.extend(host.site_group_name());
        names.extend(host.batch_group_name());
        names.extend(host.dashboard_group_name());
    }
    names
}
