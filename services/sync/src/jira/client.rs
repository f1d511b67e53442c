use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use hubwatch_common::error::{HubwatchError, HubwatchResult};

use super::api::IssueService;
use super::models::{
    CreatedIssue, IssueRef, NewIssue, SearchResponse, TransitionsResponse,
};
use crate::ticketing::key::ISSUE_PROPERTY_KEY;

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl JiraClientConfig {
    /// Load Jira config from environment.
    ///
    /// Returns `None` if Jira is not configured (base URL / email / token
    /// missing) so the service can log-and-skip instead of failing.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("JIRA_BASE_URL").ok()?;
        let email = std::env::var("JIRA_EMAIL").ok()?;
        let api_token = std::env::var("JIRA_API_TOKEN").ok()?;

        let max_retries = std::env::var("JIRA_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let timeout_secs = std::env::var("JIRA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Some(Self {
            base_url,
            email,
            api_token,
            max_retries,
            timeout_secs,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JiraClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl From<JiraClientError> for HubwatchError {
    fn from(e: JiraClientError) -> Self {
        HubwatchError::Tracker(e.to_string())
    }
}

#[derive(Clone)]
pub struct JiraClient {
    client: Client,
    config: JiraClientConfig,
}

impl JiraClient {
    pub fn new(config: JiraClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: point the client at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Send a request, retrying transient failures. The request is re-cloned
    /// per attempt; bodies built from JSON are always cloneable.
    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, JiraClientError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let Some(request) = request.try_clone() else {
                // Streaming bodies cannot be replayed; single attempt.
                return request
                    .basic_auth(&self.config.email, Some(&self.config.api_token))
                    .send()
                    .await
                    .map_err(JiraClientError::RequestError);
            };

            let response = match request
                .basic_auth(&self.config.email, Some(&self.config.api_token))
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(JiraClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(JiraClientError::HttpError { status, body });
        }

        Err(JiraClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl IssueService for JiraClient {
    async fn find_issue_by_property(
        &self,
        property_value: &str,
    ) -> HubwatchResult<Option<IssueRef>> {
        let jql = format!(
            "issue.property[{ISSUE_PROPERTY_KEY}].value = \"{property_value}\""
        );
        let request = self
            .client
            .get(self.url("/rest/api/2/search"))
            .query(&[("jql", jql.as_str()), ("maxResults", "2"), ("fields", "status")]);

        let response = self.send_with_retry(request).await?;
        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| HubwatchError::Tracker(format!("search response: {e}")))?;

        if search.issues.len() > 1 {
            tracing::warn!(
                property_value,
                count = search.issues.len(),
                "multiple issues carry the same identity property"
            );
        }

        Ok(search.issues.into_iter().next().map(|issue| IssueRef {
            id: issue.id,
            key: issue.key,
            status: issue.fields.status.name,
        }))
    }

    async fn create_issue(&self, issue: &NewIssue) -> HubwatchResult<IssueRef> {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "project".to_string(),
            serde_json::json!({ "key": issue.project_key }),
        );
        fields.insert(
            "issuetype".to_string(),
            serde_json::json!({ "name": issue.issue_type_name }),
        );
        fields.insert("summary".to_string(), serde_json::json!(issue.summary));
        fields.insert(
            "description".to_string(),
            serde_json::json!(issue.description),
        );
        for (field_id, value) in &issue.fields {
            fields.insert(field_id.clone(), serde_json::json!(value));
        }

        let request = self
            .client
            .post(self.url("/rest/api/2/issue"))
            .json(&serde_json::json!({ "fields": fields }));

        let response = self.send_with_retry(request).await?;
        let created: CreatedIssue = response
            .json()
            .await
            .map_err(|e| HubwatchError::Tracker(format!("create response: {e}")))?;

        Ok(IssueRef {
            id: created.id,
            key: created.key,
            status: super::api::WORKFLOW_STATUS_OPEN.to_string(),
        })
    }

    async fn set_issue_property(
        &self,
        issue_key: &str,
        property_key: &str,
        value: &str,
    ) -> HubwatchResult<()> {
        let request = self
            .client
            .put(self.url(&format!(
                "/rest/api/2/issue/{issue_key}/properties/{property_key}"
            )))
            .json(&serde_json::json!(value));

        self.send_with_retry(request).await?;
        Ok(())
    }

    async fn apply_transition(
        &self,
        issue_key: &str,
        transition_name: &str,
    ) -> HubwatchResult<()> {
        let request = self
            .client
            .get(self.url(&format!("/rest/api/2/issue/{issue_key}/transitions")));
        let response = self.send_with_retry(request).await?;
        let available: TransitionsResponse = response
            .json()
            .await
            .map_err(|e| HubwatchError::Tracker(format!("transitions response: {e}")))?;

        let transition = available
            .transitions
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(transition_name))
            .ok_or_else(|| {
                HubwatchError::Tracker(format!(
                    "transition {transition_name:?} not available on {issue_key}"
                ))
            })?;

        let request = self
            .client
            .post(self.url(&format!("/rest/api/2/issue/{issue_key}/transitions")))
            .json(&serde_json::json!({ "transition": { "id": transition.id } }));

        self.send_with_retry(request).await?;
        Ok(())
    }

    async fn add_comment(&self, issue_key: &str, body: &str) -> HubwatchResult<()> {
        let request = self
            .client
            .post(self.url(&format!("/rest/api/2/issue/{issue_key}/comment")))
            .json(&serde_json::json!({ "body": body }));

        self.send_with_retry(request).await?;
        Ok(())
    }

    async fn set_fields(
        &self,
        issue_key: &str,
        fields: &BTreeMap<String, String>,
    ) -> HubwatchResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let request = self
            .client
            .put(self.url(&format!("/rest/api/2/issue/{issue_key}")))
            .json(&serde_json::json!({ "fields": fields }));

        self.send_with_retry(request).await?;
        Ok(())
    }
}
