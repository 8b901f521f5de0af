pub mod middleware;
pub mod routes;

pub use middleware::log_request_errors;
pub use routes::{HEALTH_MESSAGE, UploadResponse, health, upload_to_youtube};
