use std::collections::BTreeMap;

use async_trait::async_trait;

use hubwatch_common::error::HubwatchResult;

use super::models::{IssueRef, NewIssue};

// Workflow vocabulary of the provisioned Hub workflow. Fixed domain
// constants, not configuration.
pub const WORKFLOW_STATUS_OPEN: &str = "Open";
pub const WORKFLOW_STATUS_RESOLVED: &str = "Resolved";
pub const WORKFLOW_TRANSITION_RESOLVE: &str = "Resolve";
pub const WORKFLOW_TRANSITION_REOPEN: &str = "Re-Open";

/// The tracker capability surface the reconciler needs. The tracker is the
/// durable source of truth; identity lookup goes through it on every run so
/// the pipeline stays stateless across processes.
#[async_trait]
pub trait IssueService: Send + Sync {
    /// Find the issue carrying `property_value` under the identity property,
    /// if any.
    async fn find_issue_by_property(
        &self,
        property_value: &str,
    ) -> HubwatchResult<Option<IssueRef>>;

    async fn create_issue(&self, issue: &NewIssue) -> HubwatchResult<IssueRef>;

    async fn set_issue_property(
        &self,
        issue_key: &str,
        property_key: &str,
        value: &str,
    ) -> HubwatchResult<()>;

    /// Apply the named workflow transition. Fails if the transition is not
    /// available from the issue's current status.
    async fn apply_transition(&self, issue_key: &str, transition_name: &str)
        -> HubwatchResult<()>;

    async fn add_comment(&self, issue_key: &str, body: &str) -> HubwatchResult<()>;

    async fn set_fields(
        &self,
        issue_key: &str,
        fields: &BTreeMap<String, String>,
    ) -> HubwatchResult<()>;
}
