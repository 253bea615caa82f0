use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{FileServerError, LookupError};
use crate::lookup::{self, FileListing};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub files: usize,
}

/// Response for the file listing
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileListing>,
}

const HOME_PAGE: &str = r#"<html>
  <head><title>Uploads Host</title></head>
  <body style="font-family: Arial, sans-serif; text-align:center; padding:40px;">
    <h1>Uploads Host</h1>
    <p>A read-only host for files placed under <code>&lt;root&gt;/&lt;user_id&gt;/&lt;file_name&gt;</code>.</p>
    <p>Uploading and managing files happens outside this service.</p>
    <p>
      <a href="/files">/files</a> lists hosted files,
      <code>/file/&lt;identifier&gt;</code> downloads one.
    </p>
    <p>Environment variables:<br>UPLOADS_DIR (default: uploads), BASE_URL, PORT (default: 5000)</p>
  </body>
</html>
"#;

// ============================================================================
// Conditional request helpers
// ============================================================================

/// Cache validators for a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Validators {
    /// Weak validators derived from size and modification time.
    pub fn new(len: u64, modified: Option<SystemTime>) -> Self {
        let modified_secs = modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        let etag = match modified_secs {
            Some(secs) => format!("W/\"{:x}-{:x}\"", len, secs),
            None => format!("W/\"{:x}\"", len),
        };

        Self {
            etag,
            last_modified: modified.map(DateTime::<Utc>::from),
        }
    }

    pub fn last_modified_header(&self) -> Option<String> {
        self.last_modified
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }

    /// Whether the request's cached copy is still current.
    ///
    /// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
    /// when it is absent.
    pub fn is_not_modified(&self, headers: &HeaderMap) -> bool {
        if let Some(value) = headers.get(header::IF_NONE_MATCH) {
            let Ok(value) = value.to_str() else {
                return false;
            };
            let ours = strip_weak(&self.etag);
            return value
                .split(',')
                .map(str::trim)
                .any(|tag| tag == "*" || strip_weak(tag) == ours);
        }

        let Some(last_modified) = self.last_modified else {
            return false;
        };

        headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .is_some_and(|since| last_modified.timestamp() <= since.timestamp())
    }

    fn headers(&self) -> Vec<(header::HeaderName, String)> {
        let mut headers = vec![(header::ETAG, self.etag.clone())];
        if let Some(last_modified) = self.last_modified_header() {
            headers.push((header::LAST_MODIFIED, last_modified));
        }
        headers
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Informational landing page
pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        files: state.snapshot().len(),
    })
}

/// GET /files - List every indexed file
pub async fn list_files(State(state): State<AppState>) -> Json<FileListResponse> {
    let snapshot = state.snapshot();
    Json(FileListResponse {
        files: lookup::list_all(&snapshot, &state.links),
    })
}

/// GET /file/:identifier - Stream an indexed file
///
/// Uses streaming to handle large files efficiently without loading them entirely into memory.
pub async fn get_file(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response, FileServerError> {
    let snapshot = state.snapshot();
    let entry = lookup::get(&snapshot, &identifier).await?;
    let path = entry.absolute_path.clone();
    let file_name = entry.file_name.clone();
    drop(snapshot);

    let metadata = fs::metadata(&path).await.map_err(missing_or_io)?;
    let validators = Validators::new(metadata.len(), metadata.modified().ok());

    if validators.is_not_modified(&request_headers) {
        debug!("Not modified: {}", path.display());
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        insert_headers(&mut response, validators.headers());
        return Ok(response);
    }

    debug!("Streaming file: {}", path.display());

    // Open file for streaming
    let file = fs::File::open(&path).await.map_err(missing_or_io)?;

    // Create a stream from the file
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    // Sanitize filename for Content-Disposition header
    let safe_filename = file_name.replace('"', "'");

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", safe_filename),
            ),
        ],
        body,
    )
        .into_response();
    insert_headers(&mut response, validators.headers());

    Ok(response)
}

/// The file can vanish between lookup and open.
fn missing_or_io(err: std::io::Error) -> FileServerError {
    if err.kind() == std::io::ErrorKind::NotFound {
        LookupError::MissingOnDisk.into()
    } else {
        FileServerError::Io(err)
    }
}

fn insert_headers(response: &mut Response, headers: Vec<(header::HeaderName, String)>) {
    for (name, value) in headers {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(name, value);
        }
    }
}
