use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user record from the Hub user API (`/api/users`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubUser {
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    /// Relative URL of the user resource, passed back on notification reads.
    pub url: String,
}

/// The kind of change a Hub notification describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    PolicyViolation,
    PolicyViolationCleared,
    PolicyOverride,
    VulnerabilityAdded,
    VulnerabilityUpdated,
    VulnerabilityRemoved,
}

impl NotificationKind {
    pub fn is_policy(self) -> bool {
        matches!(
            self,
            NotificationKind::PolicyViolation
                | NotificationKind::PolicyViolationCleared
                | NotificationKind::PolicyOverride
        )
    }
}

/// One inbound change record from the Hub notification feed.
///
/// `Ord` sorts by occurrence time first, then by the natural key, so a
/// `BTreeSet` of items is the run's sorted set: ascending by creation time,
/// exact duplicates collapsed. Later events for the same finding must be
/// applied after earlier ones, so this ordering is load-bearing.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContentItem {
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub project_name: String,
    pub project_version_name: String,
    /// Relative URL of the project version resource.
    pub project_version_url: String,
    pub component_name: String,
    pub component_url: Option<String>,
    pub component_version_name: Option<String>,
    pub component_version_url: Option<String>,
    /// Policy kinds only.
    pub policy_rule_name: Option<String>,
    pub policy_rule_url: Option<String>,
}

impl NotificationContentItem {
    /// Short identifying text used when logging a failure for this item.
    pub fn describe(&self) -> String {
        format!(
            "{:?} {} / {} / {}",
            self.kind, self.project_name, self.project_version_name, self.component_name
        )
    }
}

/// A page of the notification feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    #[allow(dead_code)] // pagination goes by page fill, not total
    pub total_count: usize,
    pub items: Vec<NotificationContentItem>,
}

/// A page of the user list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[allow(dead_code)]
    pub total_count: usize,
    pub items: Vec<HubUser>,
}
