//! Multipart ingest: stages the incoming video on local disk.
//!
//! Every staged file is owned by a [`StagedVideo`] guard. Callers remove it
//! explicitly with [`StagedVideo::remove`] on each exit path; the guard's
//! `Drop` only covers a handler future that was cancelled before it got
//! there (e.g. the client went away mid-request).

use crate::error::RelayError;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, warn};

pub const VIDEO_FIELD: &str = "video";
pub const TITLE_FIELD: &str = "title";
pub const DESCRIPTION_FIELD: &str = "description";

/// A received video waiting in the uploads directory.
#[derive(Debug)]
pub struct StagedVideo {
    path: PathBuf,
    size: u64,
    content_type: Option<String>,
    file_name: Option<String>,
    removed: bool,
}

impl StagedVideo {
    fn new(path: PathBuf, content_type: Option<String>, file_name: Option<String>) -> Self {
        Self {
            path,
            size: 0,
            content_type,
            file_name,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Declared content type, falling back to a guess from the client's
    /// filename.
    pub fn content_type(&self) -> String {
        if let Some(content_type) = self.content_type.as_deref()
            && !content_type.is_empty()
        {
            return content_type.to_string();
        }

        self.file_name
            .as_deref()
            .map(|name| mime_guess::from_path(name).first_or_octet_stream())
            .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
            .to_string()
    }

    /// Delete the staged file. Failures are logged and swallowed.
    pub async fn remove(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged video"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to remove staged video")
            }
        }
        self.removed = true;
    }
}

impl Drop for StagedVideo {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed abandoned staged video"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to remove abandoned staged video")
            }
        }
    }
}

/// Parsed upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub video: Option<StagedVideo>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Read the whole multipart body, staging the `video` part under
/// `uploads_dir` with a unique name.
///
/// On error nothing is left behind on disk.
pub async fn ingest(mut multipart: Multipart, uploads_dir: &Path) -> Result<UploadForm, RelayError> {
    let mut form = UploadForm::default();

    if let Err(error) = read_fields(&mut multipart, uploads_dir, &mut form).await {
        if let Some(video) = form.video.take() {
            video.remove().await;
        }
        return Err(error);
    }

    Ok(form)
}

async fn read_fields(
    multipart: &mut Multipart,
    uploads_dir: &Path,
    form: &mut UploadForm,
) -> Result<(), RelayError> {
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        // Only a part carrying a filename counts as a file upload.
        let is_file = field.file_name().is_some();
        match name.as_deref() {
            Some(VIDEO_FIELD) if is_file && form.video.is_none() => {
                form.video = Some(stage(field, uploads_dir).await?);
            }
            // Exactly one file is accepted, and only under `video`.
            name if is_file => {
                debug!(?name, "Rejecting unexpected file part");
                return Err(RelayError::UnexpectedFile);
            }
            Some(TITLE_FIELD) => form.title = Some(field.text().await.map_err(malformed)?),
            Some(DESCRIPTION_FIELD) => {
                form.description = Some(field.text().await.map_err(malformed)?)
            }
            name => debug!(?name, "Ignoring form field"),
        }
    }

    Ok(())
}

async fn stage(mut field: Field<'_>, uploads_dir: &Path) -> Result<StagedVideo, RelayError> {
    let path = uploads_dir.join(uuid::Uuid::new_v4().simple().to_string());
    let mut video = StagedVideo::new(
        path,
        field.content_type().map(str::to_string),
        field.file_name().map(str::to_string),
    );

    let result = async {
        let mut file = tokio::fs::File::create(video.path()).await?;
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            file.write_all(&chunk).await?;
            video.size += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<(), RelayError>(())
    }
    .await;

    match result {
        Ok(()) => {
            debug!(
                path = %video.path().display(),
                size = video.size(),
                file_name = ?video.file_name(),
                "Staged uploaded video"
            );
            Ok(video)
        }
        Err(error) => {
            video.remove().await;
            Err(error)
        }
    }
}

fn malformed(error: MultipartError) -> RelayError {
    RelayError::MalformedForm(error.body_text())
}
