use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Process configuration, loaded from CLI args and an optional config file.
///
/// OAuth credentials are deliberately absent: they are looked up from the
/// environment on every request (see [`crate::credentials`]).
///
/// Example configuration file content
/// # YouTube relay configuration
///
/// port = 3000
/// uploads_dir = "uploads"
///
/// # Endpoint overrides (useful against a local mock)
/// token_url = "https://oauth2.googleapis.com/token"
/// upload_url = "https://www.googleapis.com/upload/youtube/v3/videos"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory where incoming videos are staged before forwarding
    #[arg(short, long, default_value = "uploads")]
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// OAuth2 token endpoint used for the refresh-token exchange
    #[arg(long, default_value = DEFAULT_TOKEN_URL)]
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// YouTube media upload endpoint for videos.insert
    #[arg(long, default_value = DEFAULT_UPLOAD_URL)]
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            uploads_dir: default_uploads_dir(),
            token_url: default_token_url(),
            upload_url: default_upload_url(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // A CLI value still at its default yields to the file value
        if self.port == default_port() {
            self.port = file_config.port;
        }
        if self.uploads_dir == default_uploads_dir() {
            self.uploads_dir = file_config.uploads_dir;
        }
        if self.token_url == default_token_url() {
            self.token_url = file_config.token_url;
        }
        if self.upload_url == default_upload_url() {
            self.upload_url = file_config.upload_url;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("Port must be greater than zero"));
        }

        if self.uploads_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Uploads directory cannot be empty"));
        }

        for (name, url) in [("token_url", &self.token_url), ("upload_url", &self.upload_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "{name} must start with http:// or https://, got {url:?}"
                ));
            }
        }

        Ok(())
    }
}

fn default_port() -> u16 {
    3000
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}
