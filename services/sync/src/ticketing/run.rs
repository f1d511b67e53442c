//! One sync run, end to end: window → fetch → filter → convert → reconcile.
//!
//! The caller (scheduler) guarantees runs never overlap; this code assumes it
//! is the only writer to the settings store while it executes.

use chrono::Utc;
use uuid::Uuid;

use hubwatch_common::error::{HubwatchError, HubwatchResult};
use hubwatch_config::mappings::SyncMappingConfig;
use hubwatch_store::SettingsStore;

use crate::hub::client::HubClient;
use crate::hub::identity::resolve_identity;
use crate::jira::api::IssueService;

use super::aggregate::generate_events;
use super::convert::ConverterTable;
use super::date_window::{resolve_window, DateRange};
use super::error_log::TicketErrorLog;
use super::filter::filter_notifications;
use super::reconcile::{IssueLifecycleReconciler, ReconcileOutcome};

/// Settings key holding the end of the last successful run's window.
pub const LAST_RUN_DATE_KEY: &str = "hub-jira-last-run-date";

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Absent when the run exited before resolving a window (no mappings).
    pub window: Option<DateRange>,
    pub notifications: usize,
    pub events: usize,
    pub outcome: ReconcileOutcome,
}

impl RunSummary {
    fn empty(run_id: Uuid, window: Option<DateRange>) -> Self {
        Self {
            run_id,
            window,
            notifications: 0,
            events: 0,
            outcome: ReconcileOutcome::default(),
        }
    }
}

pub struct TicketGenerator<S, T> {
    hub: HubClient,
    store: S,
    error_log: TicketErrorLog<S>,
    reconciler: IssueLifecycleReconciler<T>,
    config: SyncMappingConfig,
}

impl<S, T> TicketGenerator<S, T>
where
    S: SettingsStore + Clone,
    T: IssueService,
{
    pub fn new(hub: HubClient, issues: T, store: S, config: SyncMappingConfig) -> Self {
        Self {
            hub,
            error_log: TicketErrorLog::new(store.clone()),
            store,
            reconciler: IssueLifecycleReconciler::new(issues),
            config,
        }
    }

    pub async fn run(&self) -> HubwatchResult<RunSummary> {
        let run_id = Uuid::new_v4();

        if self.config.mappings.is_empty() {
            tracing::debug!(%run_id, "no hub projects configured to monitor");
            return Ok(RunSummary::empty(run_id, None));
        }

        let stored = self.store.get(LAST_RUN_DATE_KEY).await?;
        let window = match resolve_window(stored.as_deref(), Utc::now()) {
            Ok(window) => window,
            Err(e) => {
                // Fatal: do not guess a window, do not mutate anything.
                self.record(&format!("cannot resolve run window: {e}")).await;
                return Err(e);
            }
        };
        tracing::info!(
            %run_id,
            start = %window.start_param(),
            end = %window.end_param(),
            "starting sync run"
        );

        let users = match self.hub.fetch_all_users().await {
            Ok(users) => users,
            Err(e) => {
                let msg = format!("error fetching hub users: {e}");
                self.record(&msg).await;
                return Err(HubwatchError::Hub(msg));
            }
        };
        let Some(user) = resolve_identity(&users, &self.config.hub_username) else {
            self.record(&format!(
                "hub user {:?} not found in list of all users",
                self.config.hub_username
            ))
            .await;
            return Ok(RunSummary::empty(run_id, Some(window)));
        };

        let results = self.hub.fetch_notifications(user, &window).await;
        for error in &results.errors {
            self.record(&format!("error retrieving notifications: {error}"))
                .await;
        }
        tracing::info!(count = results.items.len(), "fetched notifications");

        if results.items.is_empty() {
            tracing::info!("there are no notifications to handle");
            self.persist_watermark(&window).await?;
            return Ok(RunSummary::empty(run_id, Some(window)));
        }

        let notifications =
            filter_notifications(results.items, &self.config.mappings, &self.config.policy_rules);
        let notification_count = notifications.len();

        let table = ConverterTable::new(&self.config);
        let events = generate_events(&notifications, &table, &self.error_log).await;
        tracing::info!(count = events.len(), "generated events");

        let outcome = if events.is_empty() {
            tracing::info!("there are no events to handle");
            ReconcileOutcome::default()
        } else {
            self.reconciler.apply_all(&events, &self.error_log).await
        };

        self.persist_watermark(&window).await?;

        let summary = RunSummary {
            run_id,
            notifications: notification_count,
            events: events.len(),
            window: Some(window),
            outcome,
        };
        tracing::info!(?summary, "sync run completed");
        Ok(summary)
    }

    /// Next run starts exactly where this window ended.
    async fn persist_watermark(&self, window: &DateRange) -> HubwatchResult<()> {
        self.store
            .put(LAST_RUN_DATE_KEY, &window.end.to_rfc3339())
            .await
    }

    async fn record(&self, message: &str) {
        tracing::error!("{message}");
        if let Err(e) = self.error_log.record(message, Utc::now()).await {
            tracing::error!(error = %e, "failed to record ticket error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::client::{HubClient, HubClientConfig};
    use crate::jira::models::{IssueRef, NewIssue};
    use async_trait::async_trait;
    use chrono::DateTime;
    use hubwatch_config::mappings::{
        FieldCopyConfig, HubProject, JiraProject, PolicyRuleFilter, ProjectMapping,
        ProjectMappings,
    };
    use hubwatch_store::MemorySettingsStore;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ── Minimal tracker mock: every finding is new ──────────────

    #[derive(Clone, Default)]
    struct RecordingIssueService {
        created: Arc<Mutex<Vec<NewIssue>>>,
    }

    #[async_trait]
    impl IssueService for RecordingIssueService {
        async fn find_issue_by_property(
            &self,
            _property_value: &str,
        ) -> HubwatchResult<Option<IssueRef>> {
            Ok(None)
        }

        async fn create_issue(&self, issue: &NewIssue) -> HubwatchResult<IssueRef> {
            let mut created = self.created.lock().unwrap();
            created.push(issue.clone());
            Ok(IssueRef {
                id: format!("{}", 10000 + created.len()),
                key: format!("{}-{}", issue.project_key, created.len()),
                status: "Open".to_string(),
            })
        }

        async fn set_issue_property(
            &self,
            _issue_key: &str,
            _property_key: &str,
            _value: &str,
        ) -> HubwatchResult<()> {
            Ok(())
        }

        async fn apply_transition(
            &self,
            _issue_key: &str,
            _transition_name: &str,
        ) -> HubwatchResult<()> {
            Ok(())
        }

        async fn add_comment(&self, _issue_key: &str, _body: &str) -> HubwatchResult<()> {
            Ok(())
        }

        async fn set_fields(
            &self,
            _issue_key: &str,
            _fields: &BTreeMap<String, String>,
        ) -> HubwatchResult<()> {
            Ok(())
        }
    }

    fn hub_client(base_url: &str) -> HubClient {
        HubClient::new(HubClientConfig {
            base_url: base_url.to_string(),
            api_token: "token".to_string(),
            max_retries: 0,
            timeout_secs: 5,
            page_size: 50,
        })
        .unwrap()
    }

    fn test_config(mapped: bool) -> SyncMappingConfig {
        let mappings = if mapped {
            ProjectMappings::new(vec![ProjectMapping {
                hub_project: HubProject {
                    name: "billing".to_string(),
                    url: "/api/projects/42".to_string(),
                },
                jira_project: JiraProject {
                    name: "Dev".to_string(),
                    key: "DEV".to_string(),
                    id: 10000,
                },
            }])
        } else {
            ProjectMappings::default()
        };
        SyncMappingConfig {
            mappings,
            field_copy: FieldCopyConfig::default(),
            policy_rules: PolicyRuleFilter::new(vec!["/api/rules/9".to_string()]),
            hub_username: "sysadmin".to_string(),
            create_vulnerability_issues: true,
        }
    }

    fn users_body() -> serde_json::Value {
        serde_json::json!({
            "totalCount": 1,
            "items": [{
                "userName": "sysadmin",
                "firstName": "Sys",
                "lastName": "Admin",
                "active": true,
                "url": "/api/users/u1"
            }]
        })
    }

    fn violation_body() -> serde_json::Value {
        serde_json::json!({
            "totalCount": 1,
            "items": [{
                "createdAt": "2026-03-01T10:00:00Z",
                "type": "POLICY_VIOLATION",
                "projectName": "billing",
                "projectVersionName": "2.1.0",
                "projectVersionUrl": "/api/projects/42/versions/7",
                "componentName": "openssl",
                "componentUrl": "/api/components/openssl",
                "componentVersionName": "1.0.2k",
                "componentVersionUrl": "/api/components/openssl/versions/1.0.2k",
                "policyRuleName": "No known critical CVEs",
                "policyRuleUrl": "/api/rules/9"
            }]
        })
    }

    #[tokio::test]
    async fn no_mappings_is_a_quiet_noop() {
        // Unreachable hub proves no network call is made
        let generator = TicketGenerator::new(
            hub_client("http://127.0.0.1:1"),
            RecordingIssueService::default(),
            MemorySettingsStore::new(),
            test_config(false),
        );

        let summary = generator.run().await.unwrap();
        assert!(summary.window.is_none());
        assert_eq!(summary.notifications, 0);
        assert_eq!(summary.outcome, ReconcileOutcome::default());
    }

    #[tokio::test]
    async fn malformed_stored_date_aborts_the_run() {
        let store = MemorySettingsStore::new();
        store.put(LAST_RUN_DATE_KEY, "not a date").await.unwrap();

        let generator = TicketGenerator::new(
            hub_client("http://127.0.0.1:1"),
            RecordingIssueService::default(),
            store.clone(),
            test_config(true),
        );

        let err = generator.run().await.unwrap_err();
        assert!(matches!(err, HubwatchError::Config(_)));

        // Recorded once in the error log
        let log = TicketErrorLog::new(store);
        let entries = log.read_all(Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("cannot resolve run window"));
    }

    #[tokio::test]
    async fn unresolved_identity_exits_before_tracker() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalCount": 1,
                "items": [{
                    "userName": "somebody-else",
                    "active": true,
                    "url": "/api/users/u2"
                }]
            })))
            .mount(&server)
            .await;

        let store = MemorySettingsStore::new();
        let tracker = RecordingIssueService::default();
        let generator = TicketGenerator::new(
            hub_client(&server.uri()),
            tracker.clone(),
            store.clone(),
            test_config(true),
        );

        let summary = generator.run().await.unwrap();
        assert_eq!(summary.notifications, 0);
        assert!(tracker.created.lock().unwrap().is_empty());

        let entries = TicketErrorLog::new(store.clone())
            .read_all(Utc::now())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("sysadmin"));

        // Not a successful run: the watermark is not advanced
        assert!(store.get(LAST_RUN_DATE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_run_creates_tickets_and_persists_watermark() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(users_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/u1/notifications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(violation_body()))
            .mount(&server)
            .await;

        let store = MemorySettingsStore::new();
        let tracker = RecordingIssueService::default();
        let generator = TicketGenerator::new(
            hub_client(&server.uri()),
            tracker.clone(),
            store.clone(),
            test_config(true),
        );

        let summary = generator.run().await.unwrap();
        assert_eq!(summary.notifications, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.outcome.created, 1);

        let created = tracker.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].project_key, "DEV");
        assert_eq!(created[0].issue_type_name, "Hub Policy Violation");

        // Watermark equals the window end
        let stored = store.get(LAST_RUN_DATE_KEY).await.unwrap().unwrap();
        let stored: DateTime<Utc> = stored.parse().unwrap();
        assert_eq!(stored, summary.window.unwrap().end);
    }

    #[tokio::test]
    async fn empty_feed_ends_quietly_but_advances_watermark() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(users_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/u1/notifications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalCount": 0,
                "items": []
            })))
            .mount(&server)
            .await;

        let store = MemorySettingsStore::new();
        let generator = TicketGenerator::new(
            hub_client(&server.uri()),
            RecordingIssueService::default(),
            store.clone(),
            test_config(true),
        );

        let summary = generator.run().await.unwrap();
        assert_eq!(summary.events, 0);
        assert!(store.get(LAST_RUN_DATE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stored_watermark_becomes_the_next_window_start() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(users_body()))
            .mount(&server)
            .await;
        // The fetch must use the stored watermark as startDate
        Mock::given(method("GET"))
            .and(path("/api/users/u1/notifications"))
            .and(query_param("startDate", "2026-02-28T06:30:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalCount": 0,
                "items": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemorySettingsStore::new();
        store
            .put(LAST_RUN_DATE_KEY, "2026-02-28T06:30:00+00:00")
            .await
            .unwrap();

        let generator = TicketGenerator::new(
            hub_client(&server.uri()),
            RecordingIssueService::default(),
            store.clone(),
            test_config(true),
        );

        let summary = generator.run().await.unwrap();
        assert_eq!(
            summary.window.unwrap().start,
            "2026-02-28T06:30:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
