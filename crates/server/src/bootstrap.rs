use std::sync::Arc;

use databot_core::config::{AppConfig, ConfigError, LoadOptions};
use databot_sheets::GoogleSheetsClient;
use databot_slack::{
    commands::CommandRouter,
    events::databot_dispatcher,
    socket::{ReconnectPolicy, SlackSocketTransport, SocketModeRunner},
    web::{SlackReplySink, SlackWebClient},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the sheet client, command router and Slack transport. Nothing here
/// touches the network; the first connect happens in `SocketModeRunner::start`.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;

    let http = reqwest::Client::new();
    let sheet = GoogleSheetsClient::with_http_client(config.sheets.clone(), http.clone());
    info!(
        event_name = "system.bootstrap.sheets_configured",
        correlation_id = "bootstrap",
        spreadsheet_id = %config.sheets.spreadsheet_id,
        range = %config.sheets.range,
        "google sheets client configured"
    );

    let router = CommandRouter::new(sheet, config.bot.timezone);
    let web = SlackWebClient::with_http_client(config.slack.api_base_url.clone(), http);
    let transport = SlackSocketTransport::new(web.clone(), config.slack.app_token.clone());
    let replies = SlackReplySink::new(web, config.slack.bot_token.clone());

    let slack_runner = SocketModeRunner::new(
        Arc::new(transport),
        databot_dispatcher(router),
        Arc::new(replies),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.slack_configured",
        correlation_id = "bootstrap",
        api_base_url = %config.slack.api_base_url,
        timezone = %config.bot.timezone,
        "slack socket mode runner configured"
    );

    Ok(Application { config, slack_runner })
}

#[cfg(test)]
mod tests {
    use databot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(app_token: &str, bot_token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                slack_app_token: Some(app_token.to_string()),
                slack_bot_token: Some(bot_token.to_string()),
                spreadsheet_id: Some("1AbCdEfGh".to_string()),
                credentials_path: Some("credentials/service-account.json".into()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(overrides("invalid-token", "xoxb-valid")).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_builds_runner_without_network_calls() {
        let app = bootstrap(overrides("xapp-test", "xoxb-test"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.sheets.spreadsheet_id, "1AbCdEfGh");
        assert_eq!(app.config.sheets.range, "Sheet1!A:C");
    }
}
