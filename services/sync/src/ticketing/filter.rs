use std::collections::BTreeSet;

use hubwatch_config::mappings::{PolicyRuleFilter, ProjectMappings};

use crate::hub::models::NotificationContentItem;

/// Narrow the fetched notifications to the monitored scope.
///
/// A notification is retained only if its Hub project has at least one
/// mapping entry. Policy-kind notifications are additionally retained only if
/// their rule reference is in the allow-list; with an empty allow-list no
/// policy notifications survive.
pub fn filter_notifications(
    notifications: BTreeSet<NotificationContentItem>,
    mappings: &ProjectMappings,
    policy_rules: &PolicyRuleFilter,
) -> BTreeSet<NotificationContentItem> {
    notifications
        .into_iter()
        .filter(|n| mappings.has_hub_project(&n.project_name))
        .filter(|n| {
            if !n.kind.is_policy() {
                return true;
            }
            n.policy_rule_url
                .as_deref()
                .is_some_and(|rule| policy_rules.contains(rule))
        })
        .collect()
}
