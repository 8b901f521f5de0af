//! OAuth credentials for the YouTube Data API, looked up per request.

use std::collections::HashMap;
use std::fmt;

pub const CLIENT_ID_VAR: &str = "YT_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "YT_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "YT_REDIRECT_URI";
pub const REFRESH_TOKEN_VAR: &str = "YT_REFRESH_TOKEN";

/// Out-of-band redirect sentinel used when `YT_REDIRECT_URI` is not set.
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Read-only source of configuration variables.
///
/// The relay reads credentials through this trait instead of touching the
/// process environment directly so handlers can be driven with injected
/// values.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Returned when any required credential is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCredentials {
    pub missing: Vec<&'static str>,
}

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
}

impl Credentials {
    /// Look up all four values. Empty strings count as missing.
    pub fn load(env: &dyn EnvSource) -> Result<Self, MissingCredentials> {
        let lookup = |key: &str| env.var(key).filter(|value| !value.is_empty());

        let client_id = lookup(CLIENT_ID_VAR);
        let client_secret = lookup(CLIENT_SECRET_VAR);
        let refresh_token = lookup(REFRESH_TOKEN_VAR);
        let redirect_uri =
            lookup(REDIRECT_URI_VAR).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(Self {
                client_id,
                client_secret,
                redirect_uri,
                refresh_token,
            }),
            (client_id, client_secret, refresh_token) => {
                let missing = [
                    (CLIENT_ID_VAR, client_id.is_none()),
                    (CLIENT_SECRET_VAR, client_secret.is_none()),
                    (REFRESH_TOKEN_VAR, refresh_token.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(MissingCredentials { missing })
            }
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
