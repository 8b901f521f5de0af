use crate::AppState;
use crate::credentials::Credentials;
use crate::error::RelayError;
use crate::staging::{self, StagedVideo};
use crate::youtube::{InsertedVideo, VideoResource};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

pub const HEALTH_MESSAGE: &str = "YouTube uploader is running";

/// Body of every `/uploadToYouTube` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn uploaded(video: InsertedVideo) -> Self {
        Self {
            success: true,
            video_id: video.id,
            data: Some(video.data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            video_id: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

pub async fn health() -> &'static str {
    HEALTH_MESSAGE
}

/// `POST /uploadToYouTube`
///
/// A body that is not multipart at all is treated like a form without a file.
#[axum::debug_handler]
pub async fn upload_to_youtube(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let form = match multipart {
        Ok(multipart) => match staging::ingest(multipart, state.uploads_dir()).await {
            Ok(form) => form,
            Err(error) => return error.into_response(),
        },
        Err(rejection) => {
            debug!(%rejection, "Request is not a multipart form");
            return RelayError::NoFile.into_response();
        }
    };

    let Some(video) = form.video else {
        return RelayError::NoFile.into_response();
    };

    let credentials = match Credentials::load(state.env.as_ref()) {
        Ok(credentials) => credentials,
        Err(missing) => {
            error!(missing = ?missing.missing, "YouTube OAuth credentials are not configured");
            video.remove().await;
            return RelayError::from(missing).into_response();
        }
    };

    let resource = VideoResource::from_form(form.title, form.description);
    let result = forward(&state, credentials, &resource, &video).await;
    video.remove().await;

    match result {
        Ok(inserted) => (StatusCode::OK, Json(UploadResponse::uploaded(inserted))).into_response(),
        Err(error) => {
            error!(%error, "Upload error");
            error.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    credentials: Credentials,
    resource: &VideoResource,
    video: &StagedVideo,
) -> Result<InsertedVideo, RelayError> {
    info!(
        title = %resource.snippet.title,
        size = video.size(),
        file_name = ?video.file_name(),
        "Forwarding video to YouTube"
    );

    let youtube = state.youtube(credentials);
    let inserted = youtube
        .insert_video(resource, video.path(), &video.content_type())
        .await?;
    Ok(inserted)
}
