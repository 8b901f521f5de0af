use crate::credentials::Credentials;
use crate::error::UpstreamError;
use serde::Deserialize;
use tracing::debug;

/// OAuth2 client for an installed-app identity with a standing refresh token.
///
/// Each call to [`OAuth2Client::access_token`] performs a fresh
/// refresh-token exchange; nothing is cached.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    http: reqwest::Client,
    token_url: String,
    credentials: Credentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl OAuth2Client {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials,
        }
    }

    /// Exchange the refresh token for a short-lived access token.
    pub async fn access_token(&self) -> Result<TokenResponse, UpstreamError> {
        debug!(
            client_id = %self.credentials.client_id,
            redirect_uri = %self.credentials.redirect_uri,
            token_url = %self.token_url,
            "Refreshing access token"
        );

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: token_error_message(status, &body),
            });
        }

        let token: TokenResponse = serde_json::from_slice(&body)?;
        debug!(expires_in = ?token.expires_in, token_type = ?token.token_type, "Access token obtained");
        Ok(token)
    }
}

/// `error_description`, then `error`, then the raw status and body.
fn token_error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<TokenErrorResponse>(body)
        && let Some(message) = parsed.error_description.or(parsed.error)
    {
        return message;
    }

    format!("{status}: {}", String::from_utf8_lossy(body))
}
