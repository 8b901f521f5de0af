use crate::Config;
use crate::credentials::{Credentials, EnvSource};
use crate::youtube::YouTubeClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Read-only state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub env: Arc<dyn EnvSource>,

    pub uploads_dir: PathBuf,
    pub token_url: String,
    pub upload_url: String,
}

impl AppState {
    pub async fn new(config: &Config, env: Arc<dyn EnvSource>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.uploads_dir).await?;
        info!(uploads_dir = %config.uploads_dir.display(), "Uploads directory ready");

        // No overall timeout: uploads may be arbitrarily large.
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            env,
            uploads_dir: config.uploads_dir.clone(),
            token_url: config.token_url.clone(),
            upload_url: config.upload_url.clone(),
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        self.uploads_dir.as_path()
    }

    /// Per-request YouTube capability for the given credentials.
    pub fn youtube(&self, credentials: Credentials) -> YouTubeClient {
        YouTubeClient::new(
            self.http.clone(),
            &self.token_url,
            self.upload_url.clone(),
            credentials,
        )
    }
}
