#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Barrier, Mutex, oneshot};
use tokio::task::JoinHandle;
use youtube_relay::credentials::{CLIENT_ID_VAR, CLIENT_SECRET_VAR, REFRESH_TOKEN_VAR};
use youtube_relay::{AppState, Config};

pub const MOCK_ACCESS_TOKEN: &str = "ya29.mock-access-token";
pub const MOCK_VIDEO_ID: &str = "abc123";

/// One `videos.insert` call as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub metadata: JsonValue,
    pub media_type: String,
    pub media: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    token_error: Option<(StatusCode, JsonValue)>,
    upload_error: Option<(StatusCode, JsonValue)>,
    upload_barrier: Option<Arc<Barrier>>,
    token_requests: Vec<HashMap<String, String>>,
    uploads: Vec<RecordedUpload>,
}

/// In-process stand-in for the Google token endpoint and the YouTube
/// upload endpoint.
pub struct MockGoogle {
    handle: JoinHandle<()>,
    port: u16,
    state: Arc<Mutex<MockState>>,
}

impl MockGoogle {
    pub async fn start() -> Self {
        let port = portpicker::pick_unused_port().expect("No available port for mock");
        let state = Arc::new(Mutex::new(MockState::default()));

        let app = Router::new()
            .route("/token", post(token))
            .route("/upload/youtube/v3/videos", post(insert_video))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind mock Google API");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockGoogle {
            handle,
            port,
            state,
        }
    }

    pub fn token_url(&self) -> String {
        format!("http://127.0.0.1:{}/token", self.port)
    }

    pub fn upload_url(&self) -> String {
        format!("http://127.0.0.1:{}/upload/youtube/v3/videos", self.port)
    }

    pub async fn fail_token(&self, status: StatusCode, body: JsonValue) {
        self.state.lock().await.token_error = Some((status, body));
    }

    pub async fn fail_upload(&self, status: StatusCode, body: JsonValue) {
        self.state.lock().await.upload_error = Some((status, body));
    }

    /// Hold every upload until `parties` uploads are in flight.
    pub async fn rendezvous_uploads(&self, parties: usize) {
        self.state.lock().await.upload_barrier = Some(Arc::new(Barrier::new(parties)));
    }

    pub async fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().await.token_requests.clone()
    }

    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.lock().await.uploads.clone()
    }
}

impl Drop for MockGoogle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn token(
    State(state): State<Arc<Mutex<MockState>>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().await;
    state.token_requests.push(form);

    if let Some((status, body)) = state.token_error.clone() {
        return (status, Json(body)).into_response();
    }

    Json(json!({
        "access_token": MOCK_ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer",
        "scope": "https://www.googleapis.com/auth/youtube.upload",
    }))
    .into_response()
}

async fn insert_video(
    State(state): State<Arc<Mutex<MockState>>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(boundary) = content_type.strip_prefix("multipart/related; boundary=") else {
        return (StatusCode::BAD_REQUEST, "expected multipart/related").into_response();
    };
    let Some((metadata, media_type, media)) = parse_related(&body, boundary) else {
        return (StatusCode::BAD_REQUEST, "malformed multipart/related body").into_response();
    };

    let upload = RecordedUpload {
        query,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        metadata: metadata.clone(),
        media_type,
        media,
    };

    let (barrier, error) = {
        let mut state = state.lock().await;
        state.uploads.push(upload);
        (state.upload_barrier.clone(), state.upload_error.clone())
    };

    if let Some(barrier) = barrier {
        let _ = tokio::time::timeout(Duration::from_secs(5), barrier.wait()).await;
    }

    if let Some((status, body)) = error {
        return (status, Json(body)).into_response();
    }

    Json(json!({
        "kind": "youtube#video",
        "etag": "mock-etag",
        "id": MOCK_VIDEO_ID,
        "snippet": metadata["snippet"],
        "status": {
            "uploadStatus": "uploaded",
            "privacyStatus": metadata["status"]["privacyStatus"],
        },
    }))
    .into_response()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Split a two-part `multipart/related` body into (metadata, media type, media).
fn parse_related(body: &[u8], boundary: &str) -> Option<(JsonValue, String, Vec<u8>)> {
    let opening = format!("--{boundary}\r\n");
    let separator = format!("\r\n--{boundary}\r\n");
    let closing = format!("\r\n--{boundary}--\r\n");

    let rest = body.strip_prefix(opening.as_bytes())?;
    let json_start = find(rest, b"\r\n\r\n")? + 4;
    let json_end = find(rest, separator.as_bytes())?;
    let metadata = serde_json::from_slice(&rest[json_start..json_end]).ok()?;

    let rest = &rest[json_end + separator.len()..];
    let headers_end = find(rest, b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&rest[..headers_end]).ok()?;
    let media_type = headers
        .strip_prefix("Content-Type: ")
        .unwrap_or(headers)
        .to_string();

    let rest = &rest[headers_end + 4..];
    let media = rest.strip_suffix(closing.as_bytes())?.to_vec();

    Some((metadata, media_type, media))
}

pub fn full_env() -> HashMap<String, String> {
    [
        (CLIENT_ID_VAR, "mock-client-id"),
        (CLIENT_SECRET_VAR, "mock-client-secret"),
        (REFRESH_TOKEN_VAR, "1//mock-refresh-token"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A relay instance bound to a random local port.
pub struct TestServer {
    handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
    port: u16,
    workspace: PathBuf,
    uploads_dir: PathBuf,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start(env: HashMap<String, String>, google: &MockGoogle) -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let port = portpicker::pick_unused_port().expect("No available port");
        let workspace = PathBuf::from(format!("/tmp/youtube-relay-test-{}", uuid::Uuid::new_v4()));
        let uploads_dir = workspace.join("uploads");

        let config = Config {
            port,
            uploads_dir: uploads_dir.clone(),
            token_url: google.token_url(),
            upload_url: google.upload_url(),
            ..Default::default()
        };
        config.validate().expect("Invalid test config");

        let state = AppState::new(&config, Arc::new(env))
            .await
            .expect("Failed to create app state");
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind relay");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            youtube_relay::serve(listener, state, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        TestServer {
            handle,
            shutdown: Some(tx),
            port,
            workspace,
            uploads_dir,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Names of everything currently staged.
    pub fn staged_files(&self) -> Vec<String> {
        std::fs::read_dir(&self.uploads_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn upload(&self, form: reqwest::multipart::Form) -> (StatusCode, JsonValue) {
        let response = self
            .client
            .post(self.url("/uploadToYouTube"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed");
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        let body = response.json().await.expect("Response is not JSON");
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
        let _ = std::fs::remove_dir_all(&self.workspace);
    }
}

pub fn video_part(bytes: &[u8], file_name: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name(file_name.to_string())
        .mime_str("video/mp4")
        .unwrap()
}
