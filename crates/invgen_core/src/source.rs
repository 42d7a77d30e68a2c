//! Row sources feeding the generator.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::models::{InventoryKey, RawRow};

const UTF8_BOM: char = '\u{feff}';

/// Something that yields raw host rows.
#[cfg_attr(test, mockall::automock)]
pub trait RowSource {
    /// Human-readable name for logs and error messages.
    fn describe(&self) -> String;

    /// Read every data row, header already validated and comment lines dropped.
    fn load_rows(&self) -> InventoryResult<Vec<RawRow>>;
}

impl RowSource for Vec<RawRow> {
    fn describe(&self) -> String {
        format!("{} in-memory rows", self.len())
    }

    fn load_rows(&self) -> InventoryResult<Vec<RawRow>> {
        Ok(self.clone())
    }
}

/// A CSV host registry on disk.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    inventory_key: InventoryKey,
    required_columns: Vec<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inventory_key: InventoryKey::Hostname,
            required_columns: Vec::new(),
        }
    }

    /// Source configured from `data.csv_file`, `data.required_columns` and `hosts.inventory_key`.
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(&config.data.csv_file)
            .with_inventory_key(config.hosts.inventory_key)
            .with_required_columns(config.data.required_columns.clone())
    }

    pub fn with_inventory_key(mut self, key: InventoryKey) -> Self {
        self.inventory_key = key;
        self
    }

    pub fn with_required_columns(mut self, columns: Vec<String>) -> Self {
        self.required_columns = columns;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_headers(&self, headers: &[String]) -> InventoryResult<()> {
        let has = |column: &str| headers.iter().any(|h| h == column);

        let mut missing: Vec<String> = self
            .required_columns
            .iter()
            .filter(|c| !has(c))
            .cloned()
            .collect();
        if !has("hostname") && !has("cname") {
            missing.push("hostname or cname".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(InventoryError::MissingColumns(missing))
        }
    }

    /// Primary identifier of a row under the configured key, with fallback.
    fn primary_identifier<'a>(&self, row: &'a RawRow) -> &'a str {
        let (first, second) = match self.inventory_key {
            InventoryKey::Hostname => ("hostname", "cname"),
            InventoryKey::Cname => ("cname", "hostname"),
        };
        row.get(first)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .or_else(|| row.get(second).map(String::as_str))
            .unwrap_or_default()
    }
}

impl RowSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_rows(&self) -> InventoryResult<Vec<RawRow>> {
        if !self.path.exists() {
            return Err(InventoryError::SourceNotFound(self.path.clone()));
        }

        debug!("Reading host rows from {:?}", self.path);
        let content = fs::read_to_string(&self.path)?;
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        self.check_headers(&headers)?;

        let mut rows = Vec::new();
        let mut skipped = 0;
        for record in reader.records() {
            let record = record?;
            let row: RawRow = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.clone(), value.to_string()))
                .collect();

            let id = self.primary_identifier(&row);
            if id.is_empty() || id.starts_with('#') {
                skipped += 1;
                continue;
            }
            rows.push(row);
        }

        info!(
            "Read {} rows from {} ({} blank or comment rows skipped)",
            rows.len(),
            self.describe(),
            skipped
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_csv(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("hosts.csv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reads_rows_and_skips_comments() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "\u{feff}hostname,environment,application_service\n\
             web01 , production, Web\n\
             # commented,production,Web\n\
             ,production,Web\n\
             db01,production\n",
        );

        let rows = CsvSource::new(&path)
            .with_required_columns(vec!["environment".into()])
            .load_rows()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("hostname").map(String::as_str), Some("web01"));
        assert_eq!(rows[0].get("environment").map(String::as_str), Some("production"));
        assert!(!rows[1].contains_key("application_service"));
    }

    #[test]
    fn test_cname_key_falls_back_to_hostname() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "hostname,cname,environment\nweb01,,test\n,,test\n");

        let rows = CsvSource::new(&path)
            .with_inventory_key(InventoryKey::Cname)
            .load_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = CsvSource::new(dir.path().join("absent.csv"))
            .load_rows()
            .unwrap_err();
        assert!(matches!(err, InventoryError::SourceNotFound(_)));
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "name,status\nweb01,active\n");

        let err = CsvSource::new(&path)
            .with_required_columns(vec!["environment".into()])
            .load_rows()
            .unwrap_err();
        match err {
            InventoryError::MissingColumns(columns) => {
                assert_eq!(columns, vec!["environment", "hostname or cname"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_in_memory_rows() {
        let mut row = RawRow::new();
        row.insert("hostname".into(), "a".into());
        let rows = vec![row];
        assert_eq!(rows.load_rows().unwrap().len(), 1);
        assert_eq!(rows.describe(), "1 in-memory rows");
    }
}
