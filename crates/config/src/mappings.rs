//! Run-boundary configuration: which Hub projects are monitored, which Jira
//! projects receive tickets for them, which policy rules are in scope, and
//! which Hub attributes are copied into Jira custom fields.
//!
//! Owned by configuration; read-only to the sync pipeline.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hubwatch_common::error::{HubwatchError, HubwatchResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubProject {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraProject {
    pub name: String,
    pub key: String,
    pub id: i64,
}

/// One edge of the many-to-many Hub-project / Jira-project relation.
/// A Hub project mapped to several Jira projects appears in several entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMapping {
    pub hub_project: HubProject,
    pub jira_project: JiraProject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectMappings(Vec<ProjectMapping>);

impl ProjectMappings {
    pub fn new(mappings: Vec<ProjectMapping>) -> Self {
        Self(mappings)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// All Jira projects mapped to the named Hub project, in config order.
    pub fn jira_targets(&self, hub_project_name: &str) -> Vec<&JiraProject> {
        self.0
            .iter()
            .filter(|m| m.hub_project.name == hub_project_name)
            .map(|m| &m.jira_project)
            .collect()
    }

    pub fn has_hub_project(&self, hub_project_name: &str) -> bool {
        self.0.iter().any(|m| m.hub_project.name == hub_project_name)
    }
}

/// Hub attributes that may be copied into Jira custom fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubFieldSource {
    Project,
    ProjectVersion,
    Component,
    ComponentVersion,
    PolicyRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCopyMapping {
    pub source: HubFieldSource,
    /// Jira field id the value is written to, e.g. `customfield_10402`.
    pub target_field_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCopyConfig(pub Vec<FieldCopyMapping>);

/// Allow-list of policy-rule relative URLs. A policy notification whose rule
/// is not a member is dropped before conversion; an empty set means no policy
/// notifications are processed at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyRuleFilter(BTreeSet<String>);

impl PolicyRuleFilter {
    pub fn new<I: IntoIterator<Item = String>>(rules: I) -> Self {
        Self(rules.into_iter().collect())
    }

    pub fn contains(&self, rule_url: &str) -> bool {
        self.0.contains(rule_url)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a single sync run is configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMappingConfig {
    pub mappings: ProjectMappings,
    #[serde(default)]
    pub field_copy: FieldCopyConfig,
    #[serde(default)]
    pub policy_rules: PolicyRuleFilter,
    /// Hub service-account username whose notification feed is read.
    pub hub_username: String,
    /// When false, vulnerability notifications produce no tickets.
    #[serde(default = "default_true")]
    pub create_vulnerability_issues: bool,
}

fn default_true() -> bool {
    true
}

impl SyncMappingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> HubwatchResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HubwatchError::Config(format!("cannot read mapping file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            HubwatchError::Config(format!("invalid mapping file {}: {e}", path.display()))
        })
    }
}
