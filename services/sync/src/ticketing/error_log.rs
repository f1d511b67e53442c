//! Rolling log of per-item failures, persisted in the settings store as one
//! JSON map of message text to timestamp. Repeated identical failures
//! overwrite the timestamp of the same entry instead of accumulating.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use hubwatch_common::error::{HubwatchError, HubwatchResult};
use hubwatch_store::SettingsStore;

/// Settings key the whole log is stored under.
pub const TICKET_ERROR_KEY: &str = "hub-jira-ticket-error";

/// Entries older than this are dropped whenever the log is read.
pub const ERROR_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub struct TicketErrorLog<S> {
    store: S,
}

impl<S: SettingsStore> TicketErrorLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn load(&self) -> HubwatchResult<BTreeMap<String, String>> {
        match self.store.get(TICKET_ERROR_KEY).await? {
            None => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| HubwatchError::Internal(format!("corrupt ticket error log: {e}"))),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> HubwatchResult<()> {
        let raw = serde_json::to_string(entries)
            .map_err(|e| HubwatchError::Internal(format!("cannot serialize error log: {e}")))?;
        self.store.put(TICKET_ERROR_KEY, &raw).await
    }

    /// Record a failure. The message text is the entry key, so an identical
    /// failure refreshes the existing entry's timestamp.
    pub async fn record(&self, message: &str, at: DateTime<Utc>) -> HubwatchResult<()> {
        let mut entries = self.load().await?;
        entries.insert(message.to_string(), at.to_rfc3339());
        self.save(&entries).await
    }

    /// All entries within the retention window. Entries older than the window
    /// (and entries whose stored timestamp no longer parses) are pruned as a
    /// side effect of reading.
    pub async fn read_all(&self, now: DateTime<Utc>) -> HubwatchResult<Vec<TicketError>> {
        let entries = self.load().await?;
        let cutoff = now - Duration::days(ERROR_RETENTION_DAYS);

        let mut kept = BTreeMap::new();
        let mut result = Vec::new();
        for (message, raw_timestamp) in &entries {
            let Ok(timestamp) = raw_timestamp.parse::<DateTime<Utc>>() else {
                continue;
            };
            if timestamp < cutoff {
                continue;
            }
            kept.insert(message.clone(), raw_timestamp.clone());
            result.push(TicketError {
                message: message.clone(),
                timestamp,
            });
        }

        if kept.len() != entries.len() {
            self.save(&kept).await?;
        }
        Ok(result)
    }

    /// Delete exact `{message, timestamp}` matches. A requested removal that
    /// is not present is reported as a soft error; present entries it did not
    /// name are left untouched.
    pub async fn remove_matching(
        &self,
        requested: &[TicketError],
    ) -> HubwatchResult<Vec<HubwatchError>> {
        let mut entries = self.load().await?;
        let mut not_found = Vec::new();

        for request in requested {
            let stored = entries.get(&request.message);
            if stored.is_some_and(|raw| raw == &request.timestamp.to_rfc3339()) {
                entries.remove(&request.message);
            } else {
                not_found.push(HubwatchError::NotFound(format!(
                    "no ticket error entry matching {:?} at {}",
                    request.message,
                    request.timestamp.to_rfc3339()
                )));
            }
        }

        self.save(&entries).await?;
        Ok(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubwatch_store::MemorySettingsStore;

    fn log() -> TicketErrorLog<MemorySettingsStore> {
        TicketErrorLog::new(MemorySettingsStore::new())
    }

    fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    #[tokio::test]
    async fn record_and_read_round_trip() {
        let log = log();
        let now = Utc::now();

        log.record("boom", now).await.unwrap();
        let entries = log.read_all(now).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "boom");
    }

    #[tokio::test]
    async fn same_message_overwrites_timestamp() {
        let log = log();
        let now = Utc::now();
        let earlier = days_ago(now, 1);

        log.record("boom", earlier).await.unwrap();
        log.record("boom", now).await.unwrap();

        let entries = log.read_all(now).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp.to_rfc3339(), now.to_rfc3339());
    }

    #[tokio::test]
    async fn entry_29_days_old_is_retained() {
        let log = log();
        let now = Utc::now();

        log.record("old but fine", days_ago(now, 29)).await.unwrap();
        let entries = log.read_all(now).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn entry_31_days_old_is_pruned_on_read() {
        let log = log();
        let now = Utc::now();

        log.record("stale", days_ago(now, 31)).await.unwrap();
        log.record("fresh", now).await.unwrap();

        let entries = log.read_all(now).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "fresh");

        // The prune is persisted, not just filtered from the returned view
        let entries = log.read_all(now).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn remove_matching_removes_exact_matches_only() {
        let log = log();
        let now = Utc::now();

        for i in 0..5 {
            log.record(&format!("error-{i}"), now).await.unwrap();
        }

        let to_remove = vec![
            TicketError {
                message: "error-1".to_string(),
                timestamp: now,
            },
            TicketError {
                message: "error-3".to_string(),
                timestamp: now,
            },
        ];
        let not_found = log.remove_matching(&to_remove).await.unwrap();
        assert!(not_found.is_empty());

        let remaining = log.read_all(now).await.unwrap();
        let messages: Vec<&str> = remaining.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["error-0", "error-2", "error-4"]);
    }

    #[tokio::test]
    async fn remove_matching_reports_missing_entries_softly() {
        let log = log();
        let now = Utc::now();

        log.record("present", now).await.unwrap();

        let requested = vec![TicketError {
            message: "absent".to_string(),
            timestamp: now,
        }];
        let not_found = log.remove_matching(&requested).await.unwrap();
        assert_eq!(not_found.len(), 1);
        assert!(matches!(not_found[0], HubwatchError::NotFound(_)));

        // Existing entries are untouched
        let remaining = log.read_all(now).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "present");
    }

    #[tokio::test]
    async fn remove_matching_with_wrong_timestamp_is_not_found() {
        let log = log();
        let now = Utc::now();

        log.record("boom", now).await.unwrap();

        let requested = vec![TicketError {
            message: "boom".to_string(),
            timestamp: days_ago(now, 1),
        }];
        let not_found = log.remove_matching(&requested).await.unwrap();
        assert_eq!(not_found.len(), 1);

        let remaining = log.read_all(now).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn empty_log_reads_empty() {
        let log = log();
        assert!(log.read_all(Utc::now()).await.unwrap().is_empty());
    }
}
