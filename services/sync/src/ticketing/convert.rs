//! Per-kind conversion of notifications into canonical events.
//!
//! The table is built once per run from the run's configuration, so each
//! converter closes over the active mappings, field-copy config and policy
//! filter. Dispatch failure is a per-item conversion error, never fatal to
//! the run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hubwatch_common::error::{HubwatchError, HubwatchResult};
use hubwatch_config::mappings::{
    FieldCopyConfig, HubFieldSource, PolicyRuleFilter, ProjectMappings, SyncMappingConfig,
};

use crate::hub::models::{NotificationContentItem, NotificationKind};

use super::event::{
    EventAction, HubEvent, IssueTypeTag, POLICY_VIOLATION_CLEARED_RESOLVE,
    POLICY_VIOLATION_RESOLVE, VULNERABILITY_RESOLVE,
};
use super::key::TicketIdentityKey;

pub trait NotificationConverter: Send + Sync {
    fn convert(&self, notification: &NotificationContentItem) -> HubwatchResult<Vec<HubEvent>>;
}

pub struct ConverterTable {
    converters: HashMap<NotificationKind, Arc<dyn NotificationConverter>>,
}

impl ConverterTable {
    pub fn new(config: &SyncMappingConfig) -> Self {
        let mut converters: HashMap<NotificationKind, Arc<dyn NotificationConverter>> =
            HashMap::new();

        converters.insert(
            NotificationKind::PolicyViolation,
            Arc::new(PolicyViolationConverter {
                mappings: config.mappings.clone(),
                field_copy: config.field_copy.clone(),
                policy_rules: config.policy_rules.clone(),
            }),
        );
        converters.insert(
            NotificationKind::PolicyOverride,
            Arc::new(PolicyTransitionConverter {
                mappings: config.mappings.clone(),
                policy_rules: config.policy_rules.clone(),
                resolve_comment: POLICY_VIOLATION_RESOLVE,
            }),
        );
        converters.insert(
            NotificationKind::PolicyViolationCleared,
            Arc::new(PolicyTransitionConverter {
                mappings: config.mappings.clone(),
                policy_rules: config.policy_rules.clone(),
                resolve_comment: POLICY_VIOLATION_CLEARED_RESOLVE,
            }),
        );

        let vulnerability = Arc::new(VulnerabilityConverter {
            mappings: config.mappings.clone(),
            field_copy: config.field_copy.clone(),
            create_issues: config.create_vulnerability_issues,
        });
        for kind in [
            NotificationKind::VulnerabilityAdded,
            NotificationKind::VulnerabilityUpdated,
            NotificationKind::VulnerabilityRemoved,
        ] {
            converters.insert(kind, vulnerability.clone());
        }

        Self { converters }
    }

    /// Route one notification to its converter and collect its events.
    pub fn convert(
        &self,
        notification: &NotificationContentItem,
    ) -> HubwatchResult<Vec<HubEvent>> {
        let converter = self.converters.get(&notification.kind).ok_or_else(|| {
            HubwatchError::Conversion(format!(
                "unsupported notification kind {:?}",
                notification.kind
            ))
        })?;
        converter.convert(notification)
    }
}

/// Populate Jira field values from the notification per the field-copy config.
fn copy_fields(
    field_copy: &FieldCopyConfig,
    notification: &NotificationContentItem,
) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for mapping in &field_copy.0 {
        let value = match mapping.source {
            HubFieldSource::Project => Some(notification.project_name.clone()),
            HubFieldSource::ProjectVersion => Some(notification.project_version_name.clone()),
            HubFieldSource::Component => Some(notification.component_name.clone()),
            HubFieldSource::ComponentVersion => notification.component_version_name.clone(),
            HubFieldSource::PolicyRule => notification.policy_rule_name.clone(),
        };
        if let Some(value) = value {
            fields.insert(mapping.target_field_id.clone(), value);
        }
    }
    fields
}

fn component_label(notification: &NotificationContentItem) -> String {
    match &notification.component_version_name {
        Some(version) => format!("{} / {}", notification.component_name, version),
        None => notification.component_name.clone(),
    }
}

fn policy_identity(
    notification: &NotificationContentItem,
    jira_project_id: i64,
) -> TicketIdentityKey {
    TicketIdentityKey {
        issue_type: IssueTypeTag::Policy,
        jira_project_id,
        project_version_url: notification.project_version_url.clone(),
        component_url: notification.component_url.clone(),
        component_version_url: notification.component_version_url.clone(),
        policy_rule_url: notification.policy_rule_url.clone(),
    }
}

struct PolicyViolationConverter {
    mappings: ProjectMappings,
    field_copy: FieldCopyConfig,
    policy_rules: PolicyRuleFilter,
}

impl NotificationConverter for PolicyViolationConverter {
    fn convert(&self, n: &NotificationContentItem) -> HubwatchResult<Vec<HubEvent>> {
        let Some(rule_url) = n.policy_rule_url.as_deref() else {
            return Err(HubwatchError::Conversion(format!(
                "policy violation without rule reference: {}",
                n.describe()
            )));
        };
        // Out-of-scope rules normally never reach conversion; tolerate one
        // that slipped through by emitting nothing.
        if !self.policy_rules.contains(rule_url) {
            return Ok(Vec::new());
        }

        let rule_name = n.policy_rule_name.as_deref().unwrap_or(rule_url);
        let summary = format!(
            "Hub policy violation: project {} / {}, component {}, rule {}",
            n.project_name,
            n.project_version_name,
            component_label(n),
            rule_name
        );
        let description = format!(
            "The Black Duck Hub reports a policy violation.\n\
             Hub project: {} / {}\nComponent: {}\nViolated rule: {}",
            n.project_name,
            n.project_version_name,
            component_label(n),
            rule_name
        );

        let events = self
            .mappings
            .jira_targets(&n.project_name)
            .into_iter()
            .map(|jira_project| HubEvent {
                action: EventAction::Add,
                issue_type: IssueTypeTag::Policy,
                jira_project: jira_project.clone(),
                identity: policy_identity(n, jira_project.id),
                summary: summary.clone(),
                description: description.clone(),
                fields: copy_fields(&self.field_copy, n),
                resolve_comment: None,
            })
            .collect();
        Ok(events)
    }
}

/// Policy override and policy-violation-cleared both resolve the matching
/// ticket; only the explanatory comment differs.
struct PolicyTransitionConverter {
    mappings: ProjectMappings,
    policy_rules: PolicyRuleFilter,
    resolve_comment: &'static str,
}

impl NotificationConverter for PolicyTransitionConverter {
    fn convert(&self, n: &NotificationContentItem) -> HubwatchResult<Vec<HubEvent>> {
        let Some(rule_url) = n.policy_rule_url.as_deref() else {
            return Err(HubwatchError::Conversion(format!(
                "policy notification without rule reference: {}",
                n.describe()
            )));
        };
        if !self.policy_rules.contains(rule_url) {
            return Ok(Vec::new());
        }

        let rule_name = n.policy_rule_name.as_deref().unwrap_or(rule_url);
        let summary = format!(
            "Hub policy violation cleared: project {} / {}, component {}, rule {}",
            n.project_name,
            n.project_version_name,
            component_label(n),
            rule_name
        );

        let events = self
            .mappings
            .jira_targets(&n.project_name)
            .into_iter()
            .map(|jira_project| HubEvent {
                action: EventAction::Resolve,
                issue_type: IssueTypeTag::Policy,
                jira_project: jira_project.clone(),
                identity: policy_identity(n, jira_project.id),
                summary: summary.clone(),
                description: summary.clone(),
                fields: BTreeMap::new(),
                resolve_comment: Some(self.resolve_comment),
            })
            .collect();
        Ok(events)
    }
}

struct VulnerabilityConverter {
    mappings: ProjectMappings,
    field_copy: FieldCopyConfig,
    create_issues: bool,
}

impl NotificationConverter for VulnerabilityConverter {
    fn convert(&self, n: &NotificationContentItem) -> HubwatchResult<Vec<HubEvent>> {
        if !self.create_issues {
            return Ok(Vec::new());
        }

        let (action, resolve_comment) = match n.kind {
            NotificationKind::VulnerabilityAdded => (EventAction::Add, None),
            NotificationKind::VulnerabilityUpdated => (EventAction::Comment, None),
            NotificationKind::VulnerabilityRemoved => {
                (EventAction::Resolve, Some(VULNERABILITY_RESOLVE))
            }
            other => {
                return Err(HubwatchError::Conversion(format!(
                    "vulnerability converter received {other:?}"
                )))
            }
        };

        let summary = format!(
            "Hub security vulnerability: project {} / {}, component {}",
            n.project_name,
            n.project_version_name,
            component_label(n)
        );
        let description = match n.kind {
            NotificationKind::VulnerabilityUpdated => format!(
                "The Black Duck Hub reports updated vulnerability details.\n\
                 Hub project: {} / {}\nComponent: {}",
                n.project_name,
                n.project_version_name,
                component_label(n)
            ),
            _ => format!(
                "The Black Duck Hub reports vulnerabilities.\n\
                 Hub project: {} / {}\nComponent: {}",
                n.project_name,
                n.project_version_name,
                component_label(n)
            ),
        };

        let events = self
            .mappings
            .jira_targets(&n.project_name)
            .into_iter()
            .map(|jira_project| HubEvent {
                action,
                issue_type: IssueTypeTag::Vulnerability,
                jira_project: jira_project.clone(),
                identity: TicketIdentityKey {
                    issue_type: IssueTypeTag::Vulnerability,
                    jira_project_id: jira_project.id,
                    project_version_url: n.project_version_url.clone(),
                    component_url: n.component_url.clone(),
                    component_version_url: n.component_version_url.clone(),
                    policy_rule_url: None,
                },
                summary: summary.clone(),
                description: description.clone(),
                fields: copy_fields(&self.field_copy, n),
                resolve_comment,
            })
            .collect();
        Ok(events)
    }
}
