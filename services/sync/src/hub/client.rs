use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{HubUser, NotificationContentItem, NotificationPage, UserPage};
use crate::ticketing::date_window::DateRange;

#[derive(Debug, Clone)]
pub struct HubClientConfig {
    pub base_url: String,
    pub api_token: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub page_size: usize,
}

impl HubClientConfig {
    /// Load Hub config from environment.
    ///
    /// Returns `Ok(None)` if the Hub is not configured (base URL / token
    /// missing) so the service can log-and-skip instead of failing.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("HUB_BASE_URL").ok()?;
        let api_token = std::env::var("HUB_API_TOKEN").ok()?;

        let max_retries = std::env::var("HUB_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let timeout_secs = std::env::var("HUB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let page_size = std::env::var("HUB_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Some(Self {
            base_url,
            api_token,
            max_retries,
            timeout_secs,
            page_size,
        })
    }
}

/// Notification fetch output: partial results are allowed, so the items and
/// the per-page errors travel together.
#[derive(Debug, Default)]
pub struct NotificationResults {
    pub items: BTreeSet<NotificationContentItem>,
    pub errors: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

#[derive(Clone)]
pub struct HubClient {
    client: Client,
    config: HubClientConfig,
}

impl HubClient {
    pub fn new(config: HubClientConfig) -> Result<Self, reqwest::Error> {
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

    /// Fetch all Hub users via the paginated user API, retrying transient
    /// errors. Used to resolve the configured service identity.
    pub async fn fetch_all_users(&self) -> Result<Vec<HubUser>, HubClientError> {
        let mut offset = 0;
        let mut all_users = Vec::new();

        loop {
            let url = format!(
                "{}/api/users?offset={}&limit={}",
                self.config.base_url, offset, self.config.page_size
            );

            let page: UserPage = self.get_with_retry(&url).await?;
            let page_len = page.items.len();
            all_users.extend(page.items);

            if page_len < self.config.page_size {
                break;
            }
            offset += self.config.page_size;
        }

        Ok(all_users)
    }

    /// Fetch the notifications visible to `user` within the date window.
    ///
    /// A page that still fails after retries is recorded as an error string
    /// and the fetch stops there, returning whatever was already collected.
    pub async fn fetch_notifications(
        &self,
        user: &HubUser,
        range: &DateRange,
    ) -> NotificationResults {
        let mut results = NotificationResults::default();
        let mut offset = 0;

        loop {
            let url = format!(
                "{}{}/notifications?startDate={}&endDate={}&offset={}&limit={}",
                self.config.base_url,
                user.url,
                range.start_param(),
                range.end_param(),
                offset,
                self.config.page_size
            );

            let page: NotificationPage = match self.get_with_retry(&url).await {
                Ok(page) => page,
                Err(e) => {
                    results
                        .errors
                        .push(format!("notification page at offset {offset}: {e}"));
                    return results;
                }
            };

            let page_len = page.items.len();
            results.items.extend(page.items);

            if page_len < self.config.page_size {
                return results;
            }
            offset += self.config.page_size;
        }
    }

    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<T, HubClientError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let response = match self
                .client
                .get(url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(HubClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(HubClientError::RequestError);
            }

            // Honor Retry-After header for 429
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

            // Retry on 5xx
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on 4xx (except 429 handled above)
            let body = response.text().await.unwrap_or_default();
            return Err(HubClientError::HttpError { status, body });
        }

        Err(HubClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}
