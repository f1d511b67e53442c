//! Event-to-ticket reconciliation.
//!
//! At-most-one-ticket-per-key across runs rests on two things: the identity
//! key is a deterministic function of the finding, and lookup always goes to
//! the tracker. Nothing here caches ticket identity locally. Events sharing a
//! key must be applied in order, so this runs strictly sequentially.

use chrono::Utc;

use hubwatch_common::error::HubwatchResult;
use hubwatch_store::SettingsStore;

use crate::jira::api::{
    IssueService, WORKFLOW_STATUS_OPEN, WORKFLOW_STATUS_RESOLVED, WORKFLOW_TRANSITION_REOPEN,
    WORKFLOW_TRANSITION_RESOLVE,
};
use crate::jira::models::{IssueRef, NewIssue};

use super::error_log::TicketErrorLog;
use super::event::{
    EventAction, HubEvent, IssueTypeTag, POLICY_VIOLATION_RESOLVE, VULNERABILITY_RESOLVE,
};
use super::key::ISSUE_PROPERTY_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Created,
    Resolved,
    Reopened,
    Commented,
    Skipped,
}

/// Counts of what one run did to the tracker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub resolved: usize,
    pub reopened: usize,
    pub commented: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct IssueLifecycleReconciler<T> {
    issues: T,
}

impl<T: IssueService> IssueLifecycleReconciler<T> {
    pub fn new(issues: T) -> Self {
        Self { issues }
    }

    /// Apply all events in order. A failing event is recorded in the error
    /// log and processing continues; one bad event never aborts the run.
    pub async fn apply_all<S: SettingsStore>(
        &self,
        events: &[HubEvent],
        error_log: &TicketErrorLog<S>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for event in events {
            match self.apply(event).await {
                Ok(Disposition::Created) => outcome.created += 1,
                Ok(Disposition::Resolved) => outcome.resolved += 1,
                Ok(Disposition::Reopened) => outcome.reopened += 1,
                Ok(Disposition::Commented) => outcome.commented += 1,
                Ok(Disposition::Skipped) => outcome.skipped += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::error!(error = %e, summary = %event.summary, "event reconciliation failed");
                    let message = format!("{}: {e}", event.summary);
                    if let Err(store_err) = error_log.record(&message, Utc::now()).await {
                        tracing::error!(error = %store_err, "failed to record reconcile error");
                    }
                }
            }
        }

        outcome
    }

    async fn apply(&self, event: &HubEvent) -> HubwatchResult<Disposition> {
        let key = event.identity.serialize();
        let existing = self.issues.find_issue_by_property(&key).await?;

        match event.action {
            EventAction::Add => match existing {
                None => {
                    let new_issue = NewIssue {
                        project_key: event.jira_project.key.clone(),
                        issue_type_name: event.issue_type.issue_type_name().to_string(),
                        summary: event.summary.clone(),
                        description: event.description.clone(),
                        fields: event.fields.clone(),
                    };
                    let created = self.issues.create_issue(&new_issue).await?;
                    self.issues
                        .set_issue_property(&created.key, ISSUE_PROPERTY_KEY, &key)
                        .await?;
                    tracing::info!(issue = %created.key, "created ticket");
                    Ok(Disposition::Created)
                }
                Some(issue) if is_resolved(&issue) => {
                    // The finding came back on a ticket we already resolved.
                    self.reopen(&issue, event).await?;
                    Ok(Disposition::Reopened)
                }
                Some(issue) => {
                    tracing::debug!(issue = %issue.key, "ticket already tracks this finding");
                    Ok(Disposition::Skipped)
                }
            },
            EventAction::Resolve => match existing {
                Some(issue) if is_open(&issue) => {
                    self.issues
                        .apply_transition(&issue.key, WORKFLOW_TRANSITION_RESOLVE)
                        .await?;
                    self.issues
                        .add_comment(&issue.key, resolve_comment(event))
                        .await?;
                    tracing::info!(issue = %issue.key, "resolved ticket");
                    Ok(Disposition::Resolved)
                }
                _ => {
                    tracing::debug!(summary = %event.summary, "nothing open to resolve");
                    Ok(Disposition::Skipped)
                }
            },
            EventAction::Reopen => match existing {
                Some(issue) if is_resolved(&issue) => {
                    self.reopen(&issue, event).await?;
                    Ok(Disposition::Reopened)
                }
                _ => {
                    tracing::debug!(summary = %event.summary, "nothing resolved to reopen");
                    Ok(Disposition::Skipped)
                }
            },
            EventAction::Comment => match existing {
                Some(issue) => {
                    self.issues
                        .add_comment(&issue.key, &event.description)
                        .await?;
                    self.issues.set_fields(&issue.key, &event.fields).await?;
                    Ok(Disposition::Commented)
                }
                None => {
                    tracing::debug!(summary = %event.summary, "no ticket to comment on");
                    Ok(Disposition::Skipped)
                }
            },
        }
    }

    async fn reopen(&self, issue: &IssueRef, event: &HubEvent) -> HubwatchResult<()> {
        self.issues
            .apply_transition(&issue.key, WORKFLOW_TRANSITION_REOPEN)
            .await?;
        self.issues
            .add_comment(&issue.key, event.issue_type.reopen_comment())
            .await?;
        tracing::info!(issue = %issue.key, "reopened ticket");
        Ok(())
    }
}

fn is_open(issue: &IssueRef) -> bool {
    issue.status.eq_ignore_ascii_case(WORKFLOW_STATUS_OPEN)
}

fn is_resolved(issue: &IssueRef) -> bool {
    issue.status.eq_ignore_ascii_case(WORKFLOW_STATUS_RESOLVED)
}

fn resolve_comment(event: &HubEvent) -> &'static str {
    event.resolve_comment.unwrap_or(match event.issue_type {
        IssueTypeTag::Policy => POLICY_VIOLATION_RESOLVE,
        IssueTypeTag::Vulnerability => VULNERABILITY_RESOLVE,
    })
}
