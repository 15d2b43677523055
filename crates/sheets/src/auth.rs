use std::path::{Path, PathBuf};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not read service account key `{path}`: {source}")]
    ReadKey { path: PathBuf, source: std::io::Error },
    #[error("invalid service account key `{path}`: {source}")]
    ParseKey { path: PathBuf, source: serde_json::Error },
    #[error("could not sign token assertion: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token exchange failed: {0}")]
    Exchange(#[source] reqwest::Error),
    #[error("token exchange rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// The fields of a Google service account key file that the token flow uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    pub async fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AuthError::ReadKey { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| AuthError::ParseKey { path: path.to_path_buf(), source })
    }

    fn assertion(&self, scope: &str) -> Result<String, AuthError> {
        let issued_at = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(AuthError::Sign)?;
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(AuthError::Sign)
    }

    /// Exchanges a signed assertion for a short-lived bearer token.
    pub async fn access_token(&self, http: &Client, scope: &str) -> Result<String, AuthError> {
        let assertion = self.assertion(scope)?;
        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(AuthError::Exchange)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorBody>(&body)
                .map(|error| match error.error_description {
                    Some(description) => format!("{}: {description}", error.error),
                    None => error.error,
                })
                .unwrap_or(body);
            return Err(AuthError::Rejected { status: status.as_u16(), detail });
        }

        let token = response.json::<TokenResponse>().await.map_err(AuthError::Exchange)?;
        Ok(token.access_token)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    error_description: Option<String>,
}
