//! Deterministic ticket identity.
//!
//! The serialized key is stored as an opaque property on the Jira issue and
//! re-derived on every run; it is the sole mechanism for finding an existing
//! ticket. Two notifications describing the same (Jira project, Hub
//! component/version, rule) must serialize identically, and distinct findings
//! must never collide.

use sha2::{Digest, Sha256};

use super::event::IssueTypeTag;

/// Property key under which the identity string is stored on a Jira issue.
pub const ISSUE_PROPERTY_KEY: &str = "hub-ticket";

const NAME_VALUE_SEPARATOR: &str = "=";
const PAIR_SEPARATOR: &str = "|";

const KEY_ISSUE_TYPE: &str = "t";
const KEY_JIRA_PROJECT_ID: &str = "jp";
const KEY_PROJECT_VERSION: &str = "hpv";
const KEY_COMPONENT: &str = "hc";
const KEY_COMPONENT_VERSION: &str = "hcv";
const KEY_POLICY_RULE: &str = "hr";

/// Hash length keeps keys short while leaving collisions out of practical
/// reach for the handful of URLs one installation sees.
const HASH_HEX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketIdentityKey {
    pub issue_type: IssueTypeTag,
    pub jira_project_id: i64,
    pub project_version_url: String,
    pub component_url: Option<String>,
    pub component_version_url: Option<String>,
    pub policy_rule_url: Option<String>,
}

impl TicketIdentityKey {
    /// Serialize to the property string, e.g.
    /// `t=p|jp=10000|hpv=<hash>|hc=<hash>|hr=<hash>`.
    ///
    /// Emission order is fixed; absent parts are omitted entirely.
    pub fn serialize(&self) -> String {
        let mut pairs: Vec<String> = Vec::with_capacity(6);
        let mut push = |name: &str, value: String| {
            pairs.push(format!("{name}{NAME_VALUE_SEPARATOR}{value}"));
        };

        push(KEY_ISSUE_TYPE, self.issue_type.tag().to_string());
        push(KEY_JIRA_PROJECT_ID, self.jira_project_id.to_string());
        push(KEY_PROJECT_VERSION, hash_relative_url(&self.project_version_url));
        if let Some(url) = &self.component_url {
            push(KEY_COMPONENT, hash_relative_url(url));
        }
        if let Some(url) = &self.component_version_url {
            push(KEY_COMPONENT_VERSION, hash_relative_url(url));
        }
        if let Some(url) = &self.policy_rule_url {
            push(KEY_POLICY_RULE, hash_relative_url(url));
        }

        pairs.join(PAIR_SEPARATOR)
    }
}

fn hash_relative_url(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_HEX_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_key(jira_project_id: i64) -> TicketIdentityKey {
        TicketIdentityKey {
            issue_type: IssueTypeTag::Policy,
            jira_project_id,
            project_version_url: "/api/projects/42/versions/7".to_string(),
            component_url: Some("/api/components/openssl".to_string()),
            component_version_url: Some("/api/components/openssl/versions/1.0.2k".to_string()),
            policy_rule_url: Some("/api/rules/9".to_string()),
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        assert_eq!(policy_key(10000).serialize(), policy_key(10000).serialize());
    }

    #[test]
    fn distinct_jira_projects_produce_distinct_keys() {
        assert_ne!(policy_key(10000).serialize(), policy_key(10001).serialize());
    }

    #[test]
    fn distinct_rules_produce_distinct_keys() {
        let mut other = policy_key(10000);
        other.policy_rule_url = Some("/api/rules/10".to_string());
        assert_ne!(policy_key(10000).serialize(), other.serialize());
    }

    #[test]
    fn policy_and_vulnerability_keys_differ() {
        let policy = policy_key(10000);
        let vuln = TicketIdentityKey {
            issue_type: IssueTypeTag::Vulnerability,
            policy_rule_url: None,
            ..policy.clone()
        };
        assert_ne!(policy.serialize(), vuln.serialize());
    }

    #[test]
    fn serialized_form_uses_reserved_keys_in_fixed_order() {
        let serialized = policy_key(10000).serialize();
        let parts: Vec<&str> = serialized.split('|').collect();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[0], "t=p");
        assert_eq!(parts[1], "jp=10000");
        assert!(parts[2].starts_with("hpv="));
        assert!(parts[3].starts_with("hc="));
        assert!(parts[4].starts_with("hcv="));
        assert!(parts[5].starts_with("hr="));
    }

    #[test]
    fn absent_parts_are_omitted() {
        let key = TicketIdentityKey {
            issue_type: IssueTypeTag::Vulnerability,
            jira_project_id: 10000,
            project_version_url: "/api/projects/42/versions/7".to_string(),
            component_url: None,
            component_version_url: Some("/api/components/openssl/versions/1.0.2k".to_string()),
            policy_rule_url: None,
        };
        let serialized = key.serialize();
        assert!(serialized.starts_with("t=v|jp=10000|hpv="));
        assert!(serialized.contains("|hcv="));
        assert!(!serialized.contains("|hc="));
        assert!(!serialized.contains("|hr="));
    }

    #[test]
    fn hash_is_stable_and_truncated() {
        let a = hash_relative_url("/api/rules/9");
        let b = hash_relative_url("/api/rules/9");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_urls_hash_differently() {
        assert_ne!(
            hash_relative_url("/api/rules/9"),
            hash_relative_url("/api/rules/10")
        );
    }
}
