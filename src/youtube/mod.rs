//! YouTube Data API v3 client, scoped to the one call the relay needs:
//! `videos.insert` with a media body streamed from disk.

pub mod oauth;

pub use oauth::{OAuth2Client, TokenResponse};

use crate::credentials::Credentials;
use crate::error::UpstreamError;
use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

pub const DEFAULT_TITLE: &str = "Uploaded from app";
pub const PRIVACY_STATUS: &str = "public";

/// Resource parts written by `videos.insert`.
const INSERT_PARTS: &str = "snippet,status";

/// Request body of `videos.insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResource {
    pub snippet: Snippet,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: String,
}

impl VideoResource {
    /// Build the metadata from the form values. Absent or empty values fall
    /// back to the defaults.
    pub fn from_form(title: Option<String>, description: Option<String>) -> Self {
        Self {
            snippet: Snippet {
                title: title
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                description: description.unwrap_or_default(),
            },
            status: Status {
                privacy_status: PRIVACY_STATUS.to_string(),
            },
        }
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone)]
pub struct InsertedVideo {
    pub id: Option<String>,
    /// The full response payload.
    pub data: JsonValue,
}

/// An authenticated handle on the YouTube API, built per request.
///
/// Holds the OAuth application identity and the refresh token; an access
/// token is fetched transparently inside [`YouTubeClient::insert_video`].
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    upload_url: String,
    auth: OAuth2Client,
}

impl YouTubeClient {
    pub fn new(
        http: reqwest::Client,
        token_url: &str,
        upload_url: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            auth: OAuth2Client::new(http.clone(), token_url, credentials),
            http,
            upload_url: upload_url.into(),
        }
    }

    /// Upload the file at `media_path` as a new video.
    ///
    /// The body is sent as `multipart/related` and streamed from disk, with
    /// no length ceiling and no timeout.
    pub async fn insert_video(
        &self,
        resource: &VideoResource,
        media_path: &Path,
        media_type: &str,
    ) -> Result<InsertedVideo, UpstreamError> {
        let token = self.auth.access_token().await?;

        let file = tokio::fs::File::open(media_path).await?;
        let boundary = uuid::Uuid::new_v4().simple().to_string();
        let (head, tail) = related_frame(&boundary, resource, media_type)?;

        let body = stream::once(async move { Ok::<Bytes, std::io::Error>(head) })
            .chain(ReaderStream::new(file))
            .chain(stream::once(async move { Ok(tail) }));

        debug!(upload_url = %self.upload_url, %media_type, "Starting videos.insert");

        let response = self
            .http
            .post(&self.upload_url)
            .query(&[("part", INSERT_PARTS), ("uploadType", "multipart")])
            .bearer_auth(&token.access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: api_error_message(status, &body),
            });
        }

        let data: JsonValue = serde_json::from_slice(&body)?;
        let id = data.get("id").and_then(JsonValue::as_str).map(str::to_string);
        info!(video_id = ?id, "Video inserted");

        Ok(InsertedVideo { id, data })
    }
}

/// Opening and closing delimiters around the media bytes.
fn related_frame(
    boundary: &str,
    resource: &VideoResource,
    media_type: &str,
) -> Result<(Bytes, Bytes), serde_json::Error> {
    let metadata = serde_json::to_string(resource)?;
    let head = format!(
        "--{boundary}\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {metadata}\r\n\
         --{boundary}\r\n\
         Content-Type: {media_type}\r\n\r\n"
    );
    let tail = format!("\r\n--{boundary}--\r\n");
    Ok((Bytes::from(head), Bytes::from(tail)))
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Google error envelope `error.message`, else the raw status and body.
fn api_error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(body)
        && let Some(message) = envelope.error.message
    {
        return message;
    }

    format!("{status}: {}", String::from_utf8_lossy(body))
}
