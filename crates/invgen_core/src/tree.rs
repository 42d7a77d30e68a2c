//! Inventory tree construction.
//!
//! A tree is built per environment from the active hosts of that environment.
//! Membership is a set union, so the result does not depend on input order.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_yaml::Mapping;

use crate::models::{normalize_group_fragment, Host, InventoryKey, APP_PREFIX, ENV_PREFIX, PRODUCT_PREFIX};

/// Name of the synthetic root group.
pub const ROOT_GROUP: &str = "all";

/// Direct members of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupNode {
    pub hosts: BTreeSet<String>,
    pub children: BTreeSet<String>,
}

/// Group hierarchy for a single environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryTree {
    environment: String,
    groups: BTreeMap<String, GroupNode>,
}

impl InventoryTree {
    /// Create a tree holding only `all -> env_<environment>`.
    pub fn new(environment: impl Into<String>) -> Self {
        let environment = environment.into();
        let env_group = Self::env_group_name(&environment);

        let mut groups = BTreeMap::new();
        let mut root = GroupNode::default();
        root.children.insert(env_group.clone());
        groups.insert(ROOT_GROUP.to_string(), root);
        groups.insert(env_group, GroupNode::default());

        Self {
            environment,
            groups,
        }
    }

    /// Build the tree for `environment` from `hosts`.
    ///
    /// Hosts belonging to other environments are ignored.
    pub fn build<'a, I>(hosts: I, environment: &str, key: InventoryKey) -> Self
    where
        I: IntoIterator<Item = &'a Host>,
    {
        let mut tree = Self::new(environment);
        for host in hosts {
            if host.environment == environment {
                tree.add_host(host, key);
            }
        }
        tree
    }

    fn env_group_name(environment: &str) -> String {
        format!("{}{}", ENV_PREFIX, normalize_group_fragment(environment))
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn environment_group(&self) -> String {
        Self::env_group_name(&self.environment)
    }

    /// Add one host to the environment group and to every group it derives.
    pub fn add_host(&mut self, host: &Host, key: InventoryKey) {
        let host_key = host.canonical_key(key).to_string();
        if host_key.is_empty() {
            return;
        }
        let env_group = self.environment_group();

        self.add_member(&env_group, &host_key);

        if let Some(app_group) = host.application_group_name() {
            self.add_child(&env_group, &app_group);
            self.add_member(&app_group, &host_key);

            for product_group in host.product_group_names() {
                self.add_child(&app_group, &product_group);
                self.add_member(&product_group, &host_key);
            }
        }

        for group in [host.site_group_name(), host.batch_group_name()]
            .into_iter()
            .flatten()
        {
            self.add_child(&env_group, &group);
            self.add_member(&group, &host_key);
        }
    }

    fn add_member(&mut self, group: &str, host_key: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .hosts
            .insert(host_key.to_string());
    }

    fn add_child(&mut self, parent: &str, child: &str) {
        self.groups
            .entry(parent.to_string())
            .or_default()
            .children
            .insert(child.to_string());
        self.groups.entry(child.to_string()).or_default();
    }

    pub fn group(&self, name: &str) -> Option<&GroupNode> {
        self.groups.get(name)
    }

    pub fn groups(&self) -> &BTreeMap<String, GroupNode> {
        &self.groups
    }

    /// Groups that survive pruning: those with at least one direct host.
    pub fn populated_groups(&self) -> impl Iterator<Item = (&String, &GroupNode)> {
        self.groups.iter().filter(|(_, node)| !node.hosts.is_empty())
    }

    pub fn application_group_count(&self) -> usize {
        self.populated_groups()
            .filter(|(name, _)| name.starts_with(APP_PREFIX))
            .count()
    }

    pub fn product_group_count(&self) -> usize {
        self.populated_groups()
            .filter(|(name, _)| name.starts_with(PRODUCT_PREFIX))
            .count()
    }

    /// Serializable form with empty groups pruned.
    pub fn to_document(&self) -> InventoryDocument {
        let groups = self
            .populated_groups()
            .map(|(name, node)| {
                let entry = GroupEntry {
                    children: node
                        .children
                        .iter()
                        .map(|c| (c.clone(), Mapping::new()))
                        .collect(),
                    hosts: node.hosts.iter().map(|h| (h.clone(), Mapping::new())).collect(),
                };
                (name.clone(), entry)
            })
            .collect();

        InventoryDocument { groups }
    }
}

/// One group as written to the inventory file. Fields are declared in key order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupEntry {
    pub children: BTreeMap<String, Mapping>,
    pub hosts: BTreeMap<String, Mapping>,
}

/// Inventory file payload: group name to entry, key-sorted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct InventoryDocument {
    pub groups: BTreeMap<String, GroupEntry>,
}
