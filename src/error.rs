use crate::api::UploadResponse;
use crate::credentials::MissingCredentials;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures talking to the OAuth token endpoint or the YouTube API.
///
/// `Display` is the message reported back to the relay's caller, so it
/// carries the upstream wording verbatim.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status, with the message extracted from the body.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

/// Everything that can end an upload request early.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No video file uploaded")]
    NoFile,

    #[error("Unexpected field")]
    UnexpectedFile,

    #[error("{0}")]
    MalformedForm(String),

    /// The incoming file could not be written to the uploads directory.
    #[error("{0}")]
    Staging(#[from] std::io::Error),

    #[error("Missing YouTube OAuth environment variables")]
    MissingCredentials(MissingCredentials),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl From<MissingCredentials> for RelayError {
    fn from(missing: MissingCredentials) -> Self {
        Self::MissingCredentials(missing)
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoFile | Self::UnexpectedFile | Self::MalformedForm(_) => StatusCode::BAD_REQUEST,
            Self::Staging(_) | Self::MissingCredentials(_) | Self::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(UploadResponse::failed(self.to_string()))).into_response()
    }
}
