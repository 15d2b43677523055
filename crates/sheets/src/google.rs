use async_trait::async_trait;
use databot_core::config::SheetsConfig;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::{AuthError, ServiceAccountKey, SPREADSHEETS_SCOPE};
use crate::{last_n, Row, SheetError, SpreadsheetClient};

#[derive(Debug, Error)]
enum RequestError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid Sheets API url: {0}")]
    Url(String),
    #[error("request to Google Sheets failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Google Sheets API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode Google Sheets response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Sheets API v4 client bound to one spreadsheet range.
///
/// Credentials are re-read and a new access token is minted for every call;
/// only the HTTP connection pool is shared.
#[derive(Clone, Debug)]
pub struct GoogleSheetsClient {
    http: Client,
    config: SheetsConfig,
}

impl GoogleSheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        Self::with_http_client(config, Client::new())
    }

    pub fn with_http_client(config: SheetsConfig, http: Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    async fn authorize(&self) -> Result<String, RequestError> {
        let key = ServiceAccountKey::load(&self.config.credentials_path).await?;
        Ok(key.access_token(&self.http, SPREADSHEETS_SCOPE).await?)
    }

    fn values_url(&self, range_suffix: &str) -> Result<Url, RequestError> {
        let range = format!("{}{range_suffix}", self.config.range);
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|error| RequestError::Url(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| RequestError::Url(self.config.api_base_url.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        Ok(url)
    }

    async fn append(&self, fields: Row) -> Result<u64, RequestError> {
        let token = self.authorize().await?;
        let url = self.values_url(":append")?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [fields] }))
            .send()
            .await
            .map_err(RequestError::Transport)?;

        let body = checked(response).await?.json::<AppendResponse>().await;
        Ok(body.map_err(RequestError::Decode)?.updates.updated_rows)
    }

    async fn read_range(&self) -> Result<Vec<Row>, RequestError> {
        let token = self.authorize().await?;
        let url = self.values_url("")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(RequestError::Transport)?;

        let body = checked(response).await?.json::<ValueRange>().await;
        Ok(body.map_err(RequestError::Decode)?.values)
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn append_row(&self, fields: Row) -> Result<u64, SheetError> {
        debug!(
            event_name = "datastore.sheets.append_started",
            spreadsheet_id = %self.config.spreadsheet_id,
            range = %self.config.range,
            cells = fields.len(),
            "appending row"
        );
        let inserted =
            self.append(fields).await.map_err(|error| SheetError::RemoteWrite(error.to_string()))?;
        info!(
            event_name = "datastore.sheets.append_completed",
            spreadsheet_id = %self.config.spreadsheet_id,
            updated_rows = inserted,
            "row appended"
        );
        Ok(inserted)
    }

    async fn read_last_n(&self, n: usize) -> Result<Vec<Row>, SheetError> {
        debug!(
            event_name = "datastore.sheets.read_started",
            spreadsheet_id = %self.config.spreadsheet_id,
            range = %self.config.range,
            requested = n,
            "reading range"
        );
        let rows =
            self.read_range().await.map_err(|error| SheetError::RemoteRead(error.to_string()))?;
        info!(
            event_name = "datastore.sheets.read_completed",
            spreadsheet_id = %self.config.spreadsheet_id,
            total_rows = rows.len(),
            "range read"
        );
        Ok(last_n(rows, n))
    }
}

async fn checked(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleErrorBody>(&body)
        .map(|payload| payload.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_owned());
    Err(RequestError::Status { status: status.as_u16(), message })
}

#[derive(Deserialize)]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: u64,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    message: String,
}
