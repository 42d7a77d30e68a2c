//! Integration tests for inventory generation.

use std::fs;
use std::path::{Path, PathBuf};

use mockall::mock;
use serde_yaml::Value;
use tempfile::{tempdir, TempDir};

use invgen_core::{
    writer::GeneratedFile, CsvSource, InventoryConfig, InventoryError, InventoryKey,
    InventoryManager, InventoryResult, RawRow, RowSource,
};

mock! {
    pub Source {}

    impl RowSource for Source {
        fn describe(&self) -> String;
        fn load_rows(&self) -> InventoryResult<Vec<RawRow>>;
    }
}

const HEADER: &str = "hostname,cname,environment,status,application_service,product_id,site_code,batch_number,function";

struct Workspace {
    _temp: TempDir,
    root: PathBuf,
    config: InventoryConfig,
}

impl Workspace {
    fn new() -> Self {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let mut config = InventoryConfig::default();
        config.paths.inventory = root.join("inventory");
        config.paths.host_vars = root.join("inventory/host_vars");
        config.paths.group_vars = root.join("inventory/group_vars");
        config.data.csv_file = root.join("hosts.csv");

        Self {
            _temp: temp,
            root,
            config,
        }
    }

    fn write_csv(&self, rows: &[&str]) {
        let mut content = String::from(HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&self.config.data.csv_file, content).unwrap();
    }

    fn generate(&self) -> invgen_core::GenerationResult {
        let source = CsvSource::from_config(&self.config);
        InventoryManager::new(&self.config).generate(&source, None, false)
    }

    fn inventory_file(&self, name: &str) -> PathBuf {
        self.config.paths.inventory.join(name)
    }

    fn host_vars_file(&self, name: &str) -> PathBuf {
        self.config.paths.host_vars.join(format!("{}.yml", name))
    }
}

fn read_tree(path: &Path) -> Value {
    let content = fs::read_to_string(path).unwrap();
    let parsed = GeneratedFile::parse(&content).unwrap();
    serde_yaml::from_str(&parsed.body).unwrap()
}

fn names(value: &Value, group: &str, section: &str) -> Vec<String> {
    value[group][section]
        .as_mapping()
        .map(|m| {
            m.keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn mtime(path: &Path) -> std::time::SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

/// Records from the reference scenario produce the documented tree.
#[test]
fn test_reference_scenario() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "web01,,production,active,web,\"web,monitoring\",,,",
        "db01,,production,active,db,,,,",
    ]);

    let result = ws.generate();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.generated_files, vec![ws.inventory_file("production.yml")]);

    let tree = read_tree(&ws.inventory_file("production.yml"));
    assert_eq!(names(&tree, "env_production", "hosts"), vec!["db01", "web01"]);
    assert_eq!(names(&tree, "env_production", "children"), vec!["app_db", "app_web"]);
    assert_eq!(names(&tree, "app_web", "hosts"), vec!["web01"]);
    assert_eq!(
        names(&tree, "app_web", "children"),
        vec!["product_monitoring", "product_web"]
    );
    assert_eq!(names(&tree, "app_db", "hosts"), vec!["db01"]);
    assert!(names(&tree, "app_db", "children").is_empty());

    assert!(ws.host_vars_file("web01").exists());
    assert!(ws.host_vars_file("db01").exists());
}

/// A second run over unchanged data touches nothing.
#[test]
fn test_generation_is_idempotent() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "web01,www,production,active,web,web,AMS,1,frontend",
        "t01,,test,active,api,,,,",
    ]);

    assert!(ws.generate().success);
    let files = [
        ws.inventory_file("production.yml"),
        ws.inventory_file("test.yml"),
        ws.host_vars_file("web01"),
        ws.host_vars_file("t01"),
    ];
    let before: Vec<(String, std::time::SystemTime)> = files
        .iter()
        .map(|p| (fs::read_to_string(p).unwrap(), mtime(p)))
        .collect();

    let second = ws.generate();
    assert!(second.success);
    assert_eq!(second.unchanged_files.len(), 2);
    assert_eq!(second.host_vars_written, 0);
    assert_eq!(second.host_vars_unchanged, 2);

    for (path, (content, modified)) in files.iter().zip(&before) {
        assert_eq!(&fs::read_to_string(path).unwrap(), content, "{:?}", path);
        assert_eq!(&mtime(path), modified, "{:?}", path);
    }
}

/// Changing one record only rewrites its own environment's tree.
#[test]
fn test_change_detection_is_scoped() {
    let ws = Workspace::new();
    ws.write_csv(&["web01,,production,active,web,,,,", "t01,,test,active,api,,,,"]);
    assert!(ws.generate().success);

    let production = ws.inventory_file("production.yml");
    let test = ws.inventory_file("test.yml");
    let production_before = fs::read_to_string(&production).unwrap();
    let test_before = fs::read_to_string(&test).unwrap();
    let test_mtime = mtime(&test);

    ws.write_csv(&["web01,,production,active,portal,,,,", "t01,,test,active,api,,,,"]);
    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.unchanged_files, vec![test.clone()]);

    let production_after = fs::read_to_string(&production).unwrap();
    assert_ne!(production_after, production_before);
    assert!(production_after.contains("app_portal:"));
    assert!(!production_after.contains("app_web:"));

    assert_eq!(fs::read_to_string(&test).unwrap(), test_before);
    assert_eq!(mtime(&test), test_mtime);
}

/// Every group written to disk has at least one direct host.
#[test]
fn test_no_empty_groups_in_output() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "a,,production,active,web,\"x,y\",AMS,1,",
        "b,,production,decommissioned,db,z,LON,2,",
        "c,,production,active,,,,,",
    ]);
    assert!(ws.generate().success);

    let tree = read_tree(&ws.inventory_file("production.yml"));
    let groups = tree.as_mapping().unwrap();
    assert!(!groups.contains_key(&Value::from("all")));
    for (name, _) in groups {
        let name = name.as_str().unwrap();
        assert!(!names(&tree, name, "hosts").is_empty(), "empty group {}", name);
    }
    assert!(!groups.contains_key(&Value::from("app_db")));
    assert!(!groups.contains_key(&Value::from("site_lon")));
}

/// Decommissioned hosts get neither tree membership nor a host_vars file.
#[test]
fn test_decommissioned_hosts_filtered() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "live01,,production,active,web,web,AMS,1,",
        "old01,,production,decommissioned,web,web,AMS,1,",
    ]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.decommissioned_hosts, 1);

    let content = fs::read_to_string(ws.inventory_file("production.yml")).unwrap();
    assert!(!content.contains("old01"));
    assert!(ws.host_vars_file("live01").exists());
    assert!(!ws.host_vars_file("old01").exists());
}

/// A row with only a cname is keyed by it under hostname keying.
#[test]
fn test_inventory_key_fallback() {
    let ws = Workspace::new();
    ws.write_csv(&[",alias.example.com,production,active,web,,,,"]);

    let result = ws.generate();
    assert!(result.success);

    let tree = read_tree(&ws.inventory_file("production.yml"));
    assert_eq!(names(&tree, "app_web", "hosts"), vec!["alias.example.com"]);
    assert!(ws.host_vars_file("alias.example.com").exists());
}

/// Cname keying names both tree members and host_vars files by cname.
#[test]
fn test_cname_inventory_key() {
    let mut ws = Workspace::new();
    ws.config.hosts.inventory_key = InventoryKey::Cname;
    ws.write_csv(&["web01,portal,production,active,web,,,,"]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.inventory_key, InventoryKey::Cname);

    let tree = read_tree(&ws.inventory_file("production.yml"));
    assert_eq!(names(&tree, "env_production", "hosts"), vec!["portal"]);
    assert!(ws.host_vars_file("portal").exists());
}

/// Orphaned host_vars files are removed; files for any known identifier stay.
#[test]
fn test_orphaned_host_vars_removed() {
    let ws = Workspace::new();
    fs::create_dir_all(&ws.config.paths.host_vars).unwrap();
    for name in ["web01", "www", "old01", "gone"] {
        fs::write(ws.host_vars_file(name), "---\n").unwrap();
    }
    ws.write_csv(&[
        "web01,www,production,active,web,,,,",
        "old01,,test,decommissioned,web,,,,",
    ]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.orphaned_files_removed, 1);
    assert!(!ws.host_vars_file("gone").exists());
    assert!(ws.host_vars_file("www").exists());
    assert!(ws.host_vars_file("old01").exists());
}

/// Group_vars reconciliation keeps derived group names and protected files.
#[test]
fn test_orphaned_group_vars_removed() {
    let mut ws = Workspace::new();
    ws.config.group_vars.protected_files = vec!["all.yml".to_string()];
    let group_vars = ws.config.paths.group_vars.clone();
    fs::create_dir_all(&group_vars).unwrap();
    for name in ["all", "env_production", "app_web", "app_retired", "dashboard_ops"] {
        fs::write(group_vars.join(format!("{}.yml", name)), "---\n").unwrap();
    }
    fs::write(group_vars.join("notes.txt"), "keep").unwrap();
    ws.write_csv(&["web01,,production,active,web,,,,"]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.group_vars_orphans_removed, 2);
    assert!(group_vars.join("all.yml").exists());
    assert!(group_vars.join("env_production.yml").exists());
    assert!(group_vars.join("app_web.yml").exists());
    assert!(group_vars.join("notes.txt").exists());
    assert!(!group_vars.join("app_retired.yml").exists());
    assert!(!group_vars.join("dashboard_ops.yml").exists());
}

/// With cleanup disabled nothing is deleted.
#[test]
fn test_cleanup_feature_toggle() {
    let mut ws = Workspace::new();
    ws.config.features.cleanup_orphaned_on_generate = false;
    fs::create_dir_all(&ws.config.paths.host_vars).unwrap();
    fs::write(ws.host_vars_file("gone"), "---\n").unwrap();
    ws.write_csv(&["web01,,production,active,web,,,,"]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.orphaned_files_removed, 0);
    assert!(ws.host_vars_file("gone").exists());
}

/// A dry run predicts work without touching the filesystem.
#[test]
fn test_dry_run_predicts_without_writing() {
    let ws = Workspace::new();
    fs::create_dir_all(&ws.config.paths.host_vars).unwrap();
    fs::write(ws.host_vars_file("gone"), "---\n").unwrap();
    ws.write_csv(&[
        "web01,,production,active,web,web,,,",
        "old01,,production,decommissioned,web,,,,",
        "t01,,TST,active,api,,,,",
    ]);

    let source = CsvSource::from_config(&ws.config);
    let result = InventoryManager::new(&ws.config).generate(&source, None, true);

    assert!(result.success);
    assert!(result.dry_run);
    assert!(result.generated_files.is_empty());
    assert_eq!(result.stats.orphaned_files_removed, 0);

    let prediction = result.prediction.unwrap();
    assert_eq!(prediction.orphaned_host_vars, 1);
    assert_eq!(prediction.host_vars_files, 2);
    assert_eq!(
        prediction.inventory_files,
        vec![ws.inventory_file("production.yml"), ws.inventory_file("test.yml")]
    );
    let production = &prediction.environments["production"];
    assert_eq!((production.active, production.decommissioned), (1, 1));

    assert!(ws.host_vars_file("gone").exists());
    assert!(!ws.host_vars_file("web01").exists());
    assert!(!ws.inventory_file("production.yml").exists());
}

/// Only requested environments are generated; codes are accepted.
#[test]
fn test_environment_selection() {
    let ws = Workspace::new();
    ws.write_csv(&["web01,,production,active,web,,,,", "t01,,test,active,api,,,,"]);

    let source = CsvSource::from_config(&ws.config);
    let requested = vec!["TST".to_string()];
    let result = InventoryManager::new(&ws.config).generate(&source, Some(&requested), false);

    assert!(result.success);
    assert_eq!(result.environments, vec!["test"]);
    assert!(ws.inventory_file("test.yml").exists());
    assert!(!ws.inventory_file("production.yml").exists());
    assert!(!ws.host_vars_file("web01").exists());
}

/// Invalid rows are skipped; valid ones still generate.
#[test]
fn test_invalid_rows_skipped() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "web01,,production,active,web,,,,",
        "bad01,,staging,active,web,,,,",
        "bad02,,production,retired,web,,,,",
        "# comment,,production,active,web,,,,",
    ]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.total_hosts, 1);
    assert!(!ws.host_vars_file("bad01").exists());
}

/// Host names that would escape the host_vars directory are rejected.
#[test]
fn test_path_like_host_names_rejected() {
    let ws = Workspace::new();
    ws.write_csv(&[
        "web01,,production,active,web,,,,",
        "../escape,,production,active,web,,,,",
    ]);

    let result = ws.generate();
    assert!(result.success);
    assert_eq!(result.stats.total_hosts, 1);
    assert!(!ws.config.paths.inventory.join("escape.yml").exists());

    let content = fs::read_to_string(ws.inventory_file("production.yml")).unwrap();
    assert!(!content.contains("escape"));
}

/// A missing CSV aborts the run with an error result.
#[test]
fn test_missing_csv_is_fatal() {
    let ws = Workspace::new();
    let result = ws.generate();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Host source not found"));
    assert!(!ws.root.join("inventory").exists());
}

/// Source errors surface through the result rather than panicking.
#[test]
fn test_source_error_from_mock() {
    let ws = Workspace::new();
    let mut source = MockSource::new();
    source
        .expect_load_rows()
        .times(1)
        .returning(|| Err(InventoryError::MissingColumns(vec!["environment".to_string()])));
    source.expect_describe().return_const("mock source".to_string());

    let result = InventoryManager::new(&ws.config).generate(&source, None, false);
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Missing required CSV columns: environment")
    );
}

/// Host_vars files carry the configured fields with typed values.
#[test]
fn test_host_vars_content() {
    let ws = Workspace::new();
    fs::write(
        &ws.config.data.csv_file,
        "hostname,environment,application_service,ssl_port,function,owner\n\
         web01,production,web,8443,frontend,team-a\n",
    )
    .unwrap();

    assert!(ws.generate().success);

    let content = fs::read_to_string(ws.host_vars_file("web01")).unwrap();
    assert!(content.starts_with("---\n# AUTO-GENERATED FILE - DO NOT EDIT MANUALLY\n# Host variables for web01\n"));
    let body = GeneratedFile::parse(&content).unwrap().body;
    let vars: Value = serde_yaml::from_str(&body).unwrap();
    assert_eq!(vars["ssl_port"], Value::from(8443));
    assert_eq!(vars["function"], Value::from("frontend"));
    assert_eq!(vars["owner"], Value::from("team-a"));
    assert_eq!(vars["cname"], Value::from(""));
    assert!(vars.get("application_service").is_none());
}
