mod hub;
mod jira;
mod ticketing;

use hubwatch_config::mappings::SyncMappingConfig;
use hubwatch_config::{init_tracing, AppConfig};
use hubwatch_store::FileSettingsStore;

use crate::hub::client::{HubClient, HubClientConfig};
use crate::jira::client::{JiraClient, JiraClientConfig};
use crate::ticketing::run::TicketGenerator;

#[tokio::main]
async fn main() {
    init_tracing("info");
    let _ = dotenvy::dotenv();

    tracing::info!(service = "hubwatch-sync", "starting");

    let app_config = AppConfig::from_env().expect("failed to load config");
    let mapping_config = SyncMappingConfig::from_file(&app_config.mapping_file)
        .expect("failed to load mapping config");

    let Some(hub_config) = HubClientConfig::from_env() else {
        tracing::info!("no hub credentials found, nothing to sync");
        return;
    };
    let Some(jira_config) = JiraClientConfig::from_env() else {
        tracing::info!("no jira credentials found, nothing to sync");
        return;
    };

    tracing::info!(
        mappings = mapping_config.mappings.len(),
        vulnerability_issues = mapping_config.create_vulnerability_issues,
        "sync configured"
    );

    let hub = HubClient::new(hub_config).expect("failed to create hub client");
    let jira = JiraClient::new(jira_config).expect("failed to create jira client");
    let store = FileSettingsStore::new(app_config.settings_file.clone());

    let generator = TicketGenerator::new(hub, jira, store, mapping_config);

    match generator.run().await {
        Ok(summary) => {
            tracing::info!(
                run_id = %summary.run_id,
                notifications = summary.notifications,
                events = summary.events,
                created = summary.outcome.created,
                resolved = summary.outcome.resolved,
                reopened = summary.outcome.reopened,
                commented = summary.outcome.commented,
                skipped = summary.outcome.skipped,
                failed = summary.outcome.failed,
                "sync run completed"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "sync run failed");
            std::process::exit(1);
        }
    }

    tracing::info!("sync service finished");
}
