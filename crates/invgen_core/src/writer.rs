//! Idempotent writers for inventory and host_vars files.
//!
//! Every generated file is a comment header, a blank line and a YAML body.
//! Before writing, the new body is compared with the body already on disk;
//! when they match the file is left alone, timestamp included.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use serde_yaml::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::HeadersConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::tree::InventoryDocument;

/// Prefix of the generation timestamp header line.
pub const TIMESTAMP_PREFIX: &str = "# Generated at:";

const RULE: &str = "# ----------------------------------------------------------------------";

/// What a write call did to the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

impl WriteOutcome {
    /// Whether the file on disk was touched.
    pub fn changed(&self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }
}

/// A previously generated file split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// The full `# Generated at: ...` line, if present.
    pub timestamp: Option<String>,
    pub body: String,
}

impl GeneratedFile {
    /// Split generated content at the first blank line after the comment header.
    ///
    /// Returns `None` when the content does not start with a header block.
    pub fn parse(content: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut offset = 0;
        let mut header_lines = 0;

        for line in content.split_inclusive('\n') {
            let trimmed = line.trim();
            offset += line.len();

            if trimmed.is_empty() {
                if header_lines == 0 {
                    return None;
                }
                return Some(Self {
                    timestamp,
                    body: content[offset..].to_string(),
                });
            }

            if trimmed == "---" || trimmed.starts_with('#') {
                if trimmed.starts_with(TIMESTAMP_PREFIX) {
                    timestamp = Some(trimmed.to_string());
                }
                header_lines += 1;
            } else {
                return None;
            }
        }

        None
    }
}

/// Serialize a payload to its canonical YAML body.
pub fn serialize_body<T: Serialize>(payload: &T) -> InventoryResult<String> {
    Ok(serde_yaml::to_string(payload)?)
}

/// Writer for generated inventory files.
#[derive(Debug, Clone)]
pub struct InventoryWriter {
    headers: HeadersConfig,
}

impl InventoryWriter {
    pub fn new(headers: HeadersConfig) -> Self {
        Self { headers }
    }

    /// Write an environment inventory file.
    ///
    /// An unchanged body keeps the file (and its recorded timestamp) untouched.
    pub fn write_inventory(
        &self,
        document: &InventoryDocument,
        path: &Path,
        title: &str,
    ) -> InventoryResult<WriteOutcome> {
        let body = serialize_body(document)?;
        let existing = read_existing(path);

        if let Some(previous) = existing.as_deref().and_then(GeneratedFile::parse) {
            if previous.body == body && previous.timestamp.is_some() {
                debug!("Content unchanged for {:?}, preserving existing timestamp", path);
                return Ok(WriteOutcome::Unchanged);
            }
        }

        let timestamp = format!(
            "{} {}",
            TIMESTAMP_PREFIX,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let content = format!(
            "{rule}\n# {generated}\n\
             # This file is generated by the inventory management system.\n\
             # Any manual changes will be overwritten the next time inventory is generated.\n\
             {rule}\n# {title} Inventory\n# {subtitle}\n{timestamp}\n\n{body}",
            rule = RULE,
            generated = self.headers.auto_generated,
            title = title,
            subtitle = self.headers.inventory,
            timestamp = timestamp,
            body = body,
        );

        write_atomic(path, &content)?;
        Ok(outcome_for(existing.is_some(), path))
    }

    /// Write a host_vars file, skipping the write entirely when nothing changed.
    pub fn write_host_vars(
        &self,
        vars: &BTreeMap<String, Value>,
        path: &Path,
        host_key: &str,
    ) -> InventoryResult<WriteOutcome> {
        let body = serialize_body(vars)?;
        let existing = read_existing(path);

        if let Some(previous) = existing.as_deref().and_then(GeneratedFile::parse) {
            if previous.body == body {
                debug!("Content unchanged for {:?}, skipping write", path);
                return Ok(WriteOutcome::Unchanged);
            }
        }

        let content = format!(
            "---\n# {}\n# Host variables for {}\n# {}\n\n{}",
            self.headers.auto_generated, host_key, self.headers.host_vars, body
        );

        write_atomic(path, &content)?;
        Ok(outcome_for(existing.is_some(), path))
    }
}

fn outcome_for(existed: bool, path: &Path) -> WriteOutcome {
    if existed {
        debug!("Updated {:?}", path);
        WriteOutcome::Updated
    } else {
        debug!("Created {:?}", path);
        WriteOutcome::Created
    }
}

fn read_existing(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!("Could not read existing file {:?}: {}", path, e);
            None
        }
    }
}

/// Write through a temporary file in the target directory, then rename it into place.
pub fn write_atomic(path: &Path, content: &str) -> InventoryResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| InventoryError::write(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| InventoryError::write(path, e))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| InventoryError::write(path, e))?;

    // Temp files are created owner-only; keep the target's mode instead.
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| InventoryError::write(path, e))?;
    }

    temp.persist(path)
        .map_err(|e| InventoryError::write(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
