use std::collections::BTreeMap;

use serde::Deserialize;

/// Reference to an existing Jira issue, as the reconciler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub id: String,
    pub key: String,
    /// Workflow status name, e.g. `Open` or `Resolved`.
    pub status: String,
}

/// Everything needed to create a ticket.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub project_key: String,
    pub issue_type_name: String,
    pub summary: String,
    pub description: String,
    /// Jira field id → value, copied from the Hub per configuration.
    pub fields: BTreeMap<String, String>,
}

// ── Wire models ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
pub struct SearchIssue {
    pub id: String,
    pub key: String,
    pub fields: SearchIssueFields,
}

#[derive(Debug, Deserialize)]
pub struct SearchIssueFields {
    pub status: StatusField,
}

#[derive(Debug, Deserialize)]
pub struct StatusField {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionsResponse {
    pub transitions: Vec<TransitionOption>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionOption {
    pub id: String,
    pub name: String,
}
