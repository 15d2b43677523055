use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::events::Reply;

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("slack api `{method}` request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api `{method}` returned HTTP {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack api `{method}` response is missing `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

/// Minimal Slack Web API client for the two methods the bot calls.
#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: Client,
    base_url: String,
}

impl SlackWebClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, http: Client) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_owned() }
    }

    async fn call<B>(
        &self,
        method: &'static str,
        token: &SecretString,
        body: &B,
    ) -> Result<ApiResponse, WebApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|source| WebApiError::Transport { method, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Status { method, status: status.as_u16() });
        }

        let payload = response
            .json::<ApiResponse>()
            .await
            .map_err(|source| WebApiError::Transport { method, source })?;
        if !payload.ok {
            let error = payload.error.unwrap_or_else(|| "unknown_error".to_owned());
            return Err(WebApiError::Api { method, error });
        }
        Ok(payload)
    }

    /// `apps.connections.open`: returns the `wss://` URL for a Socket Mode
    /// session. Needs the app-level token.
    pub async fn open_socket_url(&self, app_token: &SecretString) -> Result<String, WebApiError> {
        const METHOD: &str = "apps.connections.open";
        let payload = self.call(METHOD, app_token, &json!({})).await?;
        payload.url.ok_or(WebApiError::MissingField { method: METHOD, field: "url" })
    }

    /// `chat.postMessage` with plain mrkdwn text. Needs the bot token.
    pub async fn post_message(
        &self,
        bot_token: &SecretString,
        channel: &str,
        text: &str,
    ) -> Result<(), WebApiError> {
        self.call("chat.postMessage", bot_token, &json!({ "channel": channel, "text": text }))
            .await
            .map(|_| ())
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, reply: &Reply) -> Result<(), WebApiError>;
}

/// Posts replies as the bot user.
pub struct SlackReplySink {
    client: SlackWebClient,
    bot_token: SecretString,
}

impl SlackReplySink {
    pub fn new(client: SlackWebClient, bot_token: SecretString) -> Self {
        Self { client, bot_token }
    }
}

#[async_trait]
impl ReplySink for SlackReplySink {
    async fn deliver(&self, reply: &Reply) -> Result<(), WebApiError> {
        self.client.post_message(&self.bot_token, &reply.channel_id, &reply.text).await
    }
}
