use std::collections::BTreeSet;

use chrono::Utc;

use hubwatch_store::SettingsStore;

use crate::hub::models::NotificationContentItem;

use super::convert::ConverterTable;
use super::error_log::TicketErrorLog;
use super::event::HubEvent;

/// Convert the run's sorted notifications into one ordered event list.
///
/// Output preserves notification order; fan-out events for one notification
/// keep that notification's relative position. A conversion failure aborts
/// only that notification's contribution: it is recorded with the
/// notification's identifying text and iteration continues. Deduplication is
/// deliberately not done here; only the reconciler knows ticket identity.
pub async fn generate_events<S: SettingsStore>(
    notifications: &BTreeSet<NotificationContentItem>,
    table: &ConverterTable,
    error_log: &TicketErrorLog<S>,
) -> Vec<HubEvent> {
    let mut events = Vec::new();

    for notification in notifications {
        match table.convert(notification) {
            Ok(converted) => events.extend(converted),
            Err(e) => {
                let message = format!(
                    "error converting notification [{}]: {e}",
                    notification.describe()
                );
                tracing::warn!(error = %e, notification = %notification.describe(), "conversion failed");
                if let Err(store_err) = error_log.record(&message, Utc::now()).await {
                    tracing::error!(error = %store_err, "failed to record conversion error");
                }
            }
        }
    }

    events
}
