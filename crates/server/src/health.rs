use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use databot_core::SheetsConfig;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    sheets: SheetsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

/// Where `/store` writes. Reported from config only; the sheet is not called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpreadsheetTarget {
    pub spreadsheet_id: String,
    pub range: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub spreadsheet: SpreadsheetTarget,
    pub checked_at: String,
}

pub fn router(sheets: SheetsConfig) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { sheets })
}

pub async fn spawn(bind_address: &str, port: u16, sheets: SheetsConfig) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(sheets)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "databot-server runtime initialized".to_string(),
        },
        spreadsheet: SpreadsheetTarget {
            spreadsheet_id: state.sheets.spreadsheet_id,
            range: state.sheets.range,
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use databot_core::SheetsConfig;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    fn sheets() -> SheetsConfig {
        SheetsConfig {
            spreadsheet_id: "1AbCdEfGh".to_string(),
            credentials_path: PathBuf::from("credentials/service-account.json"),
            range: "Sheet1!A:C".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
        }
    }

    #[tokio::test]
    async fn health_reports_spreadsheet_target_without_calling_it() {
        let (status, Json(payload)) = health(State(HealthState { sheets: sheets() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.spreadsheet.spreadsheet_id, "1AbCdEfGh");
        assert_eq!(payload.spreadsheet.range, "Sheet1!A:C");
    }

    #[tokio::test]
    async fn health_route_serves_json() {
        let response = router(sheets())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["spreadsheet"]["spreadsheet_id"], "1AbCdEfGh");
        assert!(json["checked_at"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = router(sheets())
            .oneshot(Request::builder().uri("/store").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
