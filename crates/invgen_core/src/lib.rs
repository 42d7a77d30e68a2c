//! # invgen_core
//!
//! Turns a CSV host registry into an Ansible inventory: one inventory file per
//! environment plus one host_vars file per active host.
//!
//! ## Features
//!
//! - **Host records**: Validating constructor from raw rows with derived group names
//! - **Tree building**: `env -> app -> product` and `env -> site/batch` hierarchies, empty groups pruned
//! - **Content-diff writes**: Unchanged files are never rewritten, timestamps included
//! - **Reconciliation**: Orphaned host_vars and group_vars files are removed
//!
//! ## Group hierarchy
//!
//! ```text
//! all
//! └── env_<environment>
//!     ├── app_<application_service>
//!     │   └── product_<product_id>
//!     ├── site_<site_code>
//!     └── batch_<batch_number>
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use invgen_core::{CsvSource, InventoryConfig, InventoryManager};
//!
//! let config = InventoryConfig::load("inventory-config.yml")
//!     .unwrap()
//!     .with_env_overrides();
//! let source = CsvSource::from_config(&config);
//!
//! let result = InventoryManager::new(&config).generate(&source, None, false);
//! if !result.success {
//!     eprintln!("Error: {}", result.error.unwrap_or_default());
//! }
//! ```

pub mod config;
pub mod error;
pub mod host_vars;
pub mod manager;
pub mod models;
pub mod reconcile;
pub mod source;
pub mod tree;
pub mod validation;
pub mod writer;

pub use config::{EnvironmentInfo, InventoryConfig, DEFAULT_CONFIG_FILE};
pub use error::{InventoryError, InventoryResult};
pub use host_vars::{project_host_vars, HostVarField};
pub use manager::{DryRunPrediction, EnvironmentPrediction, GenerationResult, InventoryManager};
pub use models::*;
pub use reconcile::Reconciler;
pub use source::{CsvSource, RowSource};
pub use tree::{InventoryDocument, InventoryTree};
pub use validation::{RowValidation, RowValidator, ValidationResult};
pub use writer::{InventoryWriter, WriteOutcome};
