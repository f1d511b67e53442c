use std::collections::BTreeMap;

use hubwatch_config::mappings::JiraProject;

use super::key::TicketIdentityKey;

// Issue type names (user visible)
pub const POLICY_VIOLATION_ISSUE: &str = "Hub Policy Violation";
pub const VULNERABILITY_ISSUE: &str = "Hub Security Vulnerability";

// Explanatory comments appended on automatic workflow transitions
pub const POLICY_VIOLATION_REOPEN: &str = "Automatically re-opened in response to a new Black Duck Hub Policy Violation on this project / component / rule";
pub const POLICY_VIOLATION_RESOLVE: &str = "Automatically resolved in response to a Black Duck Hub Policy Override on this project / component / rule";
pub const POLICY_VIOLATION_CLEARED_RESOLVE: &str = "Automatically resolved in response to a Black Duck Hub Policy Violation Cleared event on this project / component / rule";
pub const VULNERABILITY_REOPEN: &str = "Automatically re-opened in response to new Black Duck Hub vulnerabilities on this project from this component";
pub const VULNERABILITY_RESOLVE: &str = "Automatically resolved; the Black Duck Hub reports no remaining vulnerabilities on this project from this component";

/// The ticket mutation an event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Add,
    Resolve,
    Reopen,
    Comment,
}

/// Which of the two provisioned issue types a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTypeTag {
    Policy,
    Vulnerability,
}

impl IssueTypeTag {
    /// Single-character tag used inside the ticket identity key.
    pub fn tag(self) -> &'static str {
        match self {
            IssueTypeTag::Policy => "p",
            IssueTypeTag::Vulnerability => "v",
        }
    }

    pub fn issue_type_name(self) -> &'static str {
        match self {
            IssueTypeTag::Policy => POLICY_VIOLATION_ISSUE,
            IssueTypeTag::Vulnerability => VULNERABILITY_ISSUE,
        }
    }

    pub fn reopen_comment(self) -> &'static str {
        match self {
            IssueTypeTag::Policy => POLICY_VIOLATION_REOPEN,
            IssueTypeTag::Vulnerability => VULNERABILITY_REOPEN,
        }
    }
}

/// The normalized unit of work: produced only by converters, consumed only by
/// the reconciler, never persisted beyond one run.
#[derive(Debug, Clone)]
pub struct HubEvent {
    pub action: EventAction,
    pub issue_type: IssueTypeTag,
    pub jira_project: JiraProject,
    pub identity: TicketIdentityKey,
    pub summary: String,
    pub description: String,
    /// Jira field id → value, per the run's field-copy configuration.
    pub fields: BTreeMap<String, String>,
    /// Explanatory comment for `Resolve` events; the converter knows whether
    /// the cause was an override or a cleared violation.
    pub resolve_comment: Option<&'static str>,
}
